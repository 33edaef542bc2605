//! Error types for the logging runtime

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Delivery attempted on a closed sink
    #[error("Attempted to append to closed sink named [{name}]")]
    SinkClosed { name: String },

    /// Delivery attempted on a sink whose activation failed or never ran
    #[error("Sink [{name}] is not active")]
    SinkInactive { name: String },

    /// Remote endpoint has no live connection
    #[error("Not connected to remote endpoint {address}, event dropped")]
    NotConnected { address: String },

    /// The calling thread may not enter the sink
    #[error("Sink [{name}] refuses calls from thread {thread}")]
    ThreadRefused { name: String, thread: String },

    /// A write primitive panicked while handling an event
    #[error("Appender of sink [{name}] panicked: {message}")]
    AppenderPanicked { name: String, message: String },

    /// The bounded queue has started closing and refuses new events
    #[error("Dispatch queue is closed")]
    QueueClosed,

    /// File appender error with path
    #[error("File appender error for '{path}': {message}")]
    FileAppenderError { path: String, message: String },

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotationError { path: String, message: String },

    /// Writer error (generic)
    #[error("Writer error: {0}")]
    WriterError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn sink_closed(name: impl Into<String>) -> Self {
        LoggerError::SinkClosed { name: name.into() }
    }

    pub fn sink_inactive(name: impl Into<String>) -> Self {
        LoggerError::SinkInactive { name: name.into() }
    }

    pub fn not_connected(address: impl Into<String>) -> Self {
        LoggerError::NotConnected {
            address: address.into(),
        }
    }

    pub fn thread_refused(name: impl Into<String>) -> Self {
        let current = std::thread::current();
        LoggerError::ThreadRefused {
            name: name.into(),
            thread: current
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{:?}", current.id())),
        }
    }

    pub fn appender_panicked(name: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::AppenderPanicked {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a file appender error
    pub fn file_appender(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileAppenderError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotationError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a writer error (generic)
    pub fn writer<S: Into<String>>(msg: S) -> Self {
        LoggerError::WriterError(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }

    /// Whether this error comes from configuration rather than delivery
    pub fn is_configuration(&self) -> bool {
        matches!(self, LoggerError::InvalidConfiguration { .. })
    }
}
