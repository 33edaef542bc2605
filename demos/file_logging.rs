//! File logging example
//!
//! Demonstrates plain and rolling file sinks configured from JSON, with a
//! JSON layout for the machine-readable log.
//!
//! Run with: cargo run --example file_logging

use rust_logger_hierarchy::core::{JsonConfigurator, JsonLayout, RepositoryConfig, SinkRegistry};
use rust_logger_hierarchy::prelude::*;

fn main() -> Result<()> {
    println!("=== Rust Logger Hierarchy - File Logging Example ===\n");

    let mut registry = SinkRegistry::new();
    registry.register(SinkBuilder::new("console", ConsoleAppender::new()).build()?);
    registry.register(
        SinkBuilder::new(
            "application",
            FileAppender::new("application.log").with_append(false),
        )
        .build()?,
    );
    registry.register(
        SinkBuilder::new(
            "events",
            RollingFileAppender::new(
                "events.jsonl",
                RotationPolicy::new()
                    .with_strategy(RotationStrategy::size(4 * 1024))
                    .with_max_backups(3)
                    .with_compression(true),
            )
            .with_layout(JsonLayout::new()),
        )
        .threshold(LogLevel::Warn)
        .build()?,
    );

    let config = RepositoryConfig::from_json_str(
        r#"{
            "root": { "level": "info", "sinks": ["console", "application"] },
            "loggers": {
                "app.db": { "level": "debug", "sinks": ["events"] }
            }
        }"#,
    )?;

    let repo = Repository::new();
    JsonConfigurator::new(config, registry).configure(&repo)?;

    let app = repo.get_logger("app");
    let db = repo.get_logger("app.db");

    println!("1. Logging to console and file:");
    app.info("Application started");
    app.debug("Loading configuration (hidden, root is INFO)");
    db.debug("Connecting to database");
    db.info("Database connection established");
    db.warn("Using default pool size");
    app.error("Failed to load optional plugin");

    println!("\n2. Filling the rolling file past its size limit:");
    for i in 1..=200 {
        db.warn(format!("Slow query {} of 200", i));
    }

    repo.shutdown();

    println!("\n=== Example completed successfully! ===");
    println!("Check 'application.log' and 'events.jsonl*' for the full log output");

    Ok(())
}
