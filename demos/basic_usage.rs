//! Basic logger usage example
//!
//! Demonstrates the logger hierarchy: level inheritance, additivity and
//! diagnostic context, all written to the console.
//!
//! Run with: cargo run --example basic_usage

use rust_logger_hierarchy::prelude::*;
use rust_logger_hierarchy::{info, warn};

fn main() -> Result<()> {
    println!("=== Rust Logger Hierarchy - Basic Usage Example ===\n");

    let repo = Repository::new();
    BasicConfigurator.configure(&repo)?;

    // Loggers may be created in any order
    let handler = repo.get_logger("app.http.handler");
    let app = repo.get_logger("app");

    println!("1. Logging at different levels (root level is DEBUG):");
    handler.trace("This is a trace message (hidden)");
    handler.debug("This is a debug message");
    handler.info("This is an info message");
    handler.warn("This is a warning message");
    handler.error("This is an error message");
    handler.fatal("This is a fatal message");

    println!("\n2. Level inherited from an ancestor:");
    app.set_level(Some(LogLevel::Warn));
    println!("   'app' set to WARN, 'app.http.handler' has no level of its own:");
    handler.info("Info message (hidden)");
    warn!(handler, "Slow request: {} ms", 1200);

    println!("\n3. Additivity:");
    let audit = repo.get_logger("audit");
    audit.add_sink(
        SinkBuilder::new(
            "audit-console",
            ConsoleAppender::new().with_layout(TextLayout::new().with_thread(false)),
        )
        .build()?,
    );
    audit.info("Printed twice: by 'audit' and by root");
    audit.set_additive(false);
    audit.info("Printed once: root no longer sees 'audit'");

    println!("\n4. Diagnostic context:");
    {
        let _request = Ndc::scope("req-7f3a");
        let _user = Mdc::scope("user", "alice");
        info!(audit, "Password changed");
    }

    repo.shutdown();
    println!("\n=== Example completed successfully! ===");

    Ok(())
}
