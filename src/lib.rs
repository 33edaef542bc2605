//! # Rust Logger Hierarchy
//!
//! A hierarchical structured-logging runtime. Applications obtain named
//! loggers from a [`Repository`](core::Repository); loggers form a tree by
//! dotted name and inherit their level and sinks from their ancestors.
//!
//! ## Features
//!
//! - **Order-independent hierarchy**: `"a.b.c"` may be created before `"a"`;
//!   parent links heal once the ancestor appears
//! - **Sink pipeline**: per-sink threshold and accept/deny/neutral filter
//!   chain, errors reported through a pluggable error handler and never
//!   returned to the logging call site
//! - **Async dispatch**: bounded queue with producer backpressure and a
//!   dedicated dispatcher thread
//! - **Remote sinks**: newline-delimited JSON over TCP with a background
//!   reconnector, plus the receiving [`SocketNode`](net::SocketNode)
//!
//! ```
//! use rust_logger_hierarchy::prelude::*;
//!
//! let repo = Repository::new();
//! let memory = MemoryAppender::new();
//! let events = memory.events_handle();
//! repo.root_logger()
//!     .add_sink(SinkBuilder::new("memory", memory).build().unwrap());
//!
//! let db = repo.get_logger("app.db");
//! repo.get_logger("app").set_level(Some(LogLevel::Warn));
//!
//! db.info("not shown");
//! rust_logger_hierarchy::warn!(db, "pool at {}%", 95);
//!
//! assert_eq!(events.messages(), vec!["pool at 95%"]);
//! repo.shutdown();
//! ```

pub mod appenders;
pub mod core;
pub mod macros;
pub mod net;

pub mod prelude {
    pub use crate::appenders::{
        AsyncAppender, ConsoleAppender, FileAppender, MemoryAppender, RollingFileAppender,
        RotationPolicy, RotationStrategy, SocketAppender, SocketConfig,
    };
    pub use crate::core::{
        Appender, BasicConfigurator, Configurator, FieldValue, Filter, FilterDecision, Layout,
        LogContext, LogEvent, LogLevel, Logger, LoggerError, Mdc, Ndc, Repository, Result, Sink,
        SinkBuilder, SinkRef, TextLayout,
    };
}

pub use appenders::{ConsoleAppender, FileAppender};
pub use core::{
    Appender, LogContext, LogEvent, LogLevel, Logger, LoggerError, Repository, Result, Sink,
    SinkBuilder, SinkRef,
};
