//! Socket logging example
//!
//! Runs a log server and a client in one process. The client streams its
//! events over TCP; the server replays them through its own repository,
//! where its own levels decide what gets printed.
//!
//! Run with: cargo run --example socket_logging

use rust_logger_hierarchy::net::SocketNode;
use rust_logger_hierarchy::prelude::*;
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Rust Logger Hierarchy - Socket Logging Example ===\n");

    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|e| LoggerError::io_operation("binding", "127.0.0.1:0", e))?;
    let port = listener
        .local_addr()
        .map_err(|e| LoggerError::io_operation("querying address", "listener", e))?
        .port();

    // Server side: prints everything except chatty debug output
    let server_repo = Repository::new();
    BasicConfigurator.configure(&server_repo)?;
    server_repo
        .get_logger("client.cache")
        .set_level(Some(LogLevel::Info));

    let server = {
        let repo = server_repo.clone();
        thread::spawn(move || match listener.accept() {
            Ok((stream, peer)) => {
                println!("   server: connection from {}", peer);
                SocketNode::new(stream, repo).run()
            }
            Err(e) => {
                eprintln!("   server: accept failed: {}", e);
                0
            }
        })
    };

    // Client side
    let client_repo = Repository::new();
    let appender = SocketAppender::new(
        SocketConfig::new("127.0.0.1", port)
            .with_application("socket-demo")
            .with_reconnection_delay(Duration::from_secs(1)),
    );
    let stats = appender.handle();
    client_repo
        .root_logger()
        .add_sink(SinkBuilder::new("remote", appender).build()?);

    println!("1. Client logging:");
    let cache = client_repo.get_logger("client.cache");
    let api = client_repo.get_logger("client.api");
    cache.debug("Cache miss for key user:42 (dropped by server)");
    cache.info("Cache warmed");
    api.warn("Rate limit at 80%");
    api.error("Upstream timed out");

    client_repo.shutdown();
    let replayed = server.join().unwrap_or(0);

    println!("\n2. Summary:");
    println!("   client sent:     {}", stats.events_sent());
    println!("   client dropped:  {}", stats.events_dropped());
    println!("   server replayed: {}", replayed);

    server_repo.shutdown();
    println!("\n=== Example completed successfully! ===");

    Ok(())
}
