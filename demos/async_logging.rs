//! Async logging example
//!
//! Demonstrates an asynchronous sink: many threads hand events to a bounded
//! queue and a dispatcher thread writes them to console and file.
//!
//! Run with: cargo run --example async_logging

use rust_logger_hierarchy::appenders::AsyncAppender;
use rust_logger_hierarchy::prelude::*;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Rust Logger Hierarchy - Async Logging Example ===\n");

    let repo = Repository::new();

    // The nested sinks are driven by the dispatcher thread
    let async_appender = AsyncAppender::new()
        .with_capacity(64)
        .with_sink(SinkBuilder::new("console", ConsoleAppender::new()).build()?)
        .with_sink(SinkBuilder::new("file", FileAppender::new("async_test.log")).build()?);
    let handle = async_appender.handle();
    repo.root_logger()
        .add_sink(SinkBuilder::new("async", async_appender).build()?);

    println!("1. Logging through the queue:");
    let logger = repo.get_logger("demo.async");
    for i in 0..100 {
        logger.info(format!("Message #{}", i));
    }
    println!("   Logged 100 messages asynchronously");

    println!("\n2. Multi-threaded logging:");
    let mut handles = vec![];
    for thread_id in 0..5 {
        let logger = repo.get_logger(&format!("demo.worker{}", thread_id));
        handles.push(thread::spawn(move || {
            for i in 0..20 {
                logger.info(format!("Thread {} - Message {}", thread_id, i));
                thread::sleep(Duration::from_millis(10));
            }
        }));
    }
    for handle in handles {
        handle.join().expect("worker thread panicked");
    }
    println!("   5 threads logged 20 messages each");

    println!("\n3. Shrinking the queue at runtime:");
    let discarded = handle.resize(8)?;
    println!("   Capacity now {}, {} queued events discarded", handle.capacity(), discarded);

    // Close drains everything still queued
    repo.shutdown();

    let metrics = handle.metrics();
    println!("\nDispatch metrics:");
    println!("   enqueued:        {}", metrics.enqueued());
    println!("   delivered:       {}", metrics.delivered());
    println!("   producer blocks: {}", metrics.producer_blocks());
    println!("   loss rate:       {:.2}%", metrics.loss_rate());

    println!("\n=== Example completed successfully! ===");
    println!("Check 'async_test.log' for file output");

    Ok(())
}
