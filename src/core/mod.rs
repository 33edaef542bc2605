//! Dispatch core: levels, events, sinks, the logger hierarchy and the
//! repository that owns it

pub mod appender;
pub mod bounded_queue;
pub mod configurator;
pub mod diagnostics;
pub mod error;
pub mod error_handler;
pub mod fan_out;
pub mod filter;
pub mod hierarchy;
pub mod layout;
pub mod log_context;
pub mod log_event;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod repository;
pub mod sampling;
pub mod sink;

pub use appender::{Appender, ThreadGate};
pub use bounded_queue::{BlockingQueue, BoundedQueue, PutOutcome};
pub use configurator::{
    BasicConfigurator, Configurator, JsonConfigurator, LoggerConfig, RepositoryConfig,
    SinkRegistry,
};
pub use error::{LoggerError, Result};
pub use error_handler::{
    CountingErrorHandler, ErrorHandler, FallbackErrorHandler, OnlyOnceErrorHandler,
};
pub use fan_out::FanOut;
pub use filter::{
    DenyAllFilter, Filter, FilterChain, FilterDecision, LevelMatchFilter, LevelRangeFilter,
    LoggerNameFilter, MdcMatchFilter, NdcMatchFilter, StringMatchFilter,
};
pub use hierarchy::{Hierarchy, HierarchyListener, NameTableEntry};
pub use layout::{JsonLayout, Layout, LogfmtLayout, TextLayout, TimestampFormat};
pub use log_context::{FieldValue, LogContext, Mdc, MdcGuard, Ndc, NdcGuard};
pub use log_event::{ErrorInfo, LogEvent};
pub use log_level::LogLevel;
pub use logger::{Logger, DEFAULT_ROOT_LEVEL, ROOT_LOGGER_NAME};
pub use metrics::DispatchMetrics;
pub use repository::Repository;
pub use sampling::{SamplerMetrics, SamplingConfig, SamplingFilter};
pub use sink::{Sink, SinkBuilder, SinkRef, SinkState};
