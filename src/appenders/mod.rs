//! Write primitives to wrap in a [`Sink`](crate::core::Sink)

pub mod async_appender;
pub mod console;
pub mod file;
pub mod memory;
pub mod network;
pub mod rotating_file;

pub use async_appender::{AsyncAppender, AsyncHandle, DispatchState, DEFAULT_QUEUE_CAPACITY};
pub use console::{ConsoleAppender, ConsoleTarget};
pub use file::FileAppender;
pub use memory::{MemoryAppender, MemoryEvents};
pub use network::{SocketAppender, SocketConfig, SocketHandle};
pub use rotating_file::{RollingFileAppender, RolloverPolicy, RotationPolicy, RotationStrategy};

pub use crate::core::Appender;
