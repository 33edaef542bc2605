//! Reconnecting socket appender
//!
//! Sends each event to a remote process as one line of compact JSON over a
//! persistent TCP connection. Remote delivery is best effort: while the
//! connection is down events are dropped and reported, never queued, and the
//! caller is never blocked waiting for the remote side to come back.
//!
//! When a write fails the connection is discarded and a single background
//! reconnector thread starts. It sleeps for the reconnection delay, tries to
//! connect, and on success installs the new connection and exits. A delay of
//! zero disables reconnection.

use crate::core::diagnostics;
use crate::core::{Appender, LogEvent, LoggerError, Result};
use crate::net::EventWriter;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::io::BufWriter;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 4560;
pub const DEFAULT_RECONNECTION_DELAY: Duration = Duration::from_secs(30);

/// Connection settings for a [`SocketAppender`]
///
/// ```
/// use rust_logger_hierarchy::appenders::SocketConfig;
/// use std::time::Duration;
///
/// let config = SocketConfig::new("logs.internal", 4560)
///     .with_reconnection_delay(Duration::from_secs(5))
///     .with_application("billing");
/// assert_eq!(config.address().as_deref(), Some("logs.internal:4560"));
/// ```
#[derive(Debug, Clone)]
pub struct SocketConfig {
    pub remote_host: Option<String>,
    pub port: u16,
    /// Pause between reconnection attempts; zero disables reconnection
    pub reconnection_delay: Duration,
    pub connect_timeout: Duration,
    pub write_timeout: Option<Duration>,
    /// Sent as the `application` property of every event
    pub application: Option<String>,
    /// Keep file, line and module path on sent events
    pub location_info: bool,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            remote_host: None,
            port: DEFAULT_PORT,
            reconnection_delay: DEFAULT_RECONNECTION_DELAY,
            connect_timeout: Duration::from_secs(5),
            write_timeout: Some(Duration::from_secs(5)),
            application: None,
            location_info: false,
        }
    }
}

impl SocketConfig {
    pub fn new(remote_host: impl Into<String>, port: u16) -> Self {
        Self {
            remote_host: Some(remote_host.into()),
            port,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_reconnection_delay(mut self, delay: Duration) -> Self {
        self.reconnection_delay = delay;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_application(mut self, application: impl Into<String>) -> Self {
        self.application = Some(application.into());
        self
    }

    #[must_use]
    pub fn with_location_info(mut self, location_info: bool) -> Self {
        self.location_info = location_info;
        self
    }

    /// `host:port`, if a host is set
    pub fn address(&self) -> Option<String> {
        self.remote_host
            .as_ref()
            .map(|host| format!("{}:{}", host, self.port))
    }

    fn connect(&self) -> std::io::Result<TcpStream> {
        let address = self.address().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "no remote host")
        })?;
        let mut last_error = None;
        for addr in address.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_write_timeout(self.write_timeout)?;
                    // Low latency matters more than packet count here
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "address resolved to nothing")
        }))
    }
}

type Connection = EventWriter<BufWriter<TcpStream>>;

struct Reconnector {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

struct Shared {
    config: SocketConfig,
    connection: Mutex<Option<Connection>>,
    reconnector: Mutex<Option<Reconnector>>,
    closed: AtomicBool,
    events_sent: AtomicU64,
    events_dropped: AtomicU64,
    reconnectors_started: AtomicU64,
    connect_attempts: AtomicU64,
}

impl Shared {
    fn address(&self) -> String {
        self.config.address().unwrap_or_default()
    }

    fn connect(&self) -> std::io::Result<Connection> {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
        self.config
            .connect()
            .map(|stream| EventWriter::new(BufWriter::new(stream)))
    }

    /// Install `connection` unless the appender closed meanwhile.
    fn install(&self, connection: Connection) -> bool {
        let mut slot = self.connection.lock();
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        *slot = Some(connection);
        true
    }

    fn is_reconnecting(&self) -> bool {
        self.reconnector
            .lock()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Start the reconnector unless one is already running.
    fn start_reconnector(self: &Arc<Self>) {
        let delay = self.config.reconnection_delay;
        if delay.is_zero() || self.closed.load(Ordering::Acquire) {
            return;
        }

        let mut slot = self.reconnector.lock();
        if slot.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return;
        }

        let (stop, stopped) = bounded::<()>(1);
        let shared = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("socket-reconnector-{}", self.address()))
            .spawn(move || loop {
                match stopped.recv_timeout(delay) {
                    Err(RecvTimeoutError::Timeout) => {}
                    _ => return,
                }
                diagnostics::debug(format_args!(
                    "Attempting connection to {}",
                    shared.address()
                ));
                match shared.connect() {
                    Ok(connection) => {
                        if shared.install(connection) {
                            diagnostics::debug(format_args!(
                                "Connection to {} established",
                                shared.address()
                            ));
                        }
                        return;
                    }
                    Err(e) => diagnostics::debug(format_args!(
                        "Could not connect to {}: {}, retrying in {:?}",
                        shared.address(),
                        e,
                        delay
                    )),
                }
            });

        match spawned {
            Ok(handle) => {
                self.reconnectors_started.fetch_add(1, Ordering::Relaxed);
                *slot = Some(Reconnector { stop, handle });
            }
            Err(e) => diagnostics::error(format_args!(
                "Could not start reconnector for {}: {}",
                self.address(),
                e
            )),
        }
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let reconnector = self.reconnector.lock().take();
        if let Some(reconnector) = reconnector {
            let _ = reconnector.stop.try_send(());
            let _ = reconnector.handle.join();
        }
        if let Some(mut connection) = self.connection.lock().take() {
            let _ = connection.flush();
        }
    }
}

/// Appender that streams events to a remote [`SocketNode`](crate::net::SocketNode)
///
/// ```no_run
/// use rust_logger_hierarchy::appenders::{SocketAppender, SocketConfig};
/// use rust_logger_hierarchy::core::{Repository, SinkBuilder};
///
/// let appender = SocketAppender::new(SocketConfig::new("127.0.0.1", 4560));
/// let stats = appender.handle();
///
/// let repo = Repository::new();
/// repo.root_logger()
///     .add_sink(SinkBuilder::new("remote", appender).build().unwrap());
/// repo.get_logger("app").info("sent if connected");
/// println!("sent={} dropped={}", stats.events_sent(), stats.events_dropped());
/// ```
pub struct SocketAppender {
    shared: Arc<Shared>,
    hostname: String,
}

impl SocketAppender {
    pub fn new(config: SocketConfig) -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string());
        Self {
            shared: Arc::new(Shared {
                config,
                connection: Mutex::new(None),
                reconnector: Mutex::new(None),
                closed: AtomicBool::new(false),
                events_sent: AtomicU64::new(0),
                events_dropped: AtomicU64::new(0),
                reconnectors_started: AtomicU64::new(0),
                connect_attempts: AtomicU64::new(0),
            }),
            hostname,
        }
    }

    pub fn config(&self) -> &SocketConfig {
        &self.shared.config
    }

    pub fn handle(&self) -> SocketHandle {
        SocketHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn wire_event(&self, event: &LogEvent) -> LogEvent {
        let mut event = event.clone();
        event.set_property("hostname", self.hostname.as_str());
        if let Some(application) = &self.shared.config.application {
            event.set_property("application", application.as_str());
        }
        if !self.shared.config.location_info {
            event.file = None;
            event.line = None;
            event.module_path = None;
        }
        event
    }

    fn drop_event(&self) -> LoggerError {
        self.shared.events_dropped.fetch_add(1, Ordering::Relaxed);
        LoggerError::not_connected(self.shared.address())
    }
}

impl Appender for SocketAppender {
    fn append(&mut self, event: &LogEvent) -> Result<()> {
        let wire = self.wire_event(event);
        let mut slot = self.shared.connection.lock();
        let Some(connection) = slot.as_mut() else {
            return Err(self.drop_event());
        };

        match connection.write_event(&wire) {
            Ok(()) => {
                self.shared.events_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(LoggerError::IoError(e)) => {
                *slot = None;
                drop(slot);
                self.shared.events_dropped.fetch_add(1, Ordering::Relaxed);
                self.shared.start_reconnector();
                Err(LoggerError::io_operation(
                    "sending event",
                    format!("connection to {} lost", self.shared.address()),
                    e,
                ))
            }
            Err(other) => {
                self.shared.events_dropped.fetch_add(1, Ordering::Relaxed);
                Err(other)
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(connection) = self.shared.connection.lock().as_mut() {
            connection.flush()?;
        }
        Ok(())
    }

    /// A missing host is a configuration error. An unreachable host is not:
    /// the sink activates, drops events and keeps trying to connect.
    fn activate(&mut self) -> Result<()> {
        if self.shared.config.remote_host.is_none() {
            return Err(LoggerError::config("SocketAppender", "no remote host set"));
        }
        match self.shared.connect() {
            Ok(connection) => {
                self.shared.install(connection);
            }
            Err(e) => {
                diagnostics::error(format_args!(
                    "Could not connect to remote log server at {}: {}",
                    self.shared.address(),
                    e
                ));
                self.shared.start_reconnector();
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.shared.shutdown();
        Ok(())
    }
}

impl Drop for SocketAppender {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}

/// Counters and connection state of a [`SocketAppender`]
#[derive(Clone)]
pub struct SocketHandle {
    shared: Arc<Shared>,
}

impl SocketHandle {
    pub fn events_sent(&self) -> u64 {
        self.shared.events_sent.load(Ordering::Relaxed)
    }

    /// Events lost because no connection was available or it broke
    pub fn events_dropped(&self) -> u64 {
        self.shared.events_dropped.load(Ordering::Relaxed)
    }

    pub fn reconnectors_started(&self) -> u64 {
        self.shared.reconnectors_started.load(Ordering::Relaxed)
    }

    pub fn connect_attempts(&self) -> u64 {
        self.shared.connect_attempts.load(Ordering::Relaxed)
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connection.lock().is_some()
    }

    pub fn is_reconnecting(&self) -> bool {
        self.shared.is_reconnecting()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for SocketHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketHandle")
            .field("address", &self.shared.address())
            .field("connected", &self.is_connected())
            .field("reconnecting", &self.is_reconnecting())
            .field("sent", &self.events_sent())
            .field("dropped", &self.events_dropped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CountingErrorHandler, LogLevel, SinkBuilder};
    use crate::net::EventReader;
    use std::io::BufReader;
    use std::net::TcpListener;
    use std::time::Instant;

    fn free_port() -> u16 {
        TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        condition()
    }

    fn event(message: &str) -> LogEvent {
        LogEvent::new("net.test", LogLevel::Info, message).with_location("a.rs", 1, "a")
    }

    #[test]
    fn test_missing_host_is_configuration_error() {
        let result = SinkBuilder::new("remote", SocketAppender::new(SocketConfig::default())).build();
        assert!(result.unwrap_err().is_configuration());
    }

    #[test]
    fn test_sends_framed_events_with_host_properties() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let appender =
            SocketAppender::new(SocketConfig::new("127.0.0.1", port).with_application("billing"));
        let handle = appender.handle();
        let sink = SinkBuilder::new("remote", appender).build().unwrap();
        let (stream, _) = listener.accept().unwrap();
        assert!(handle.is_connected());

        assert!(sink.deliver(&event("one")));
        assert!(sink.deliver(&event("two")));
        sink.close();

        let received: Vec<LogEvent> = EventReader::new(BufReader::new(stream))
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].message, "one");
        assert_eq!(received[1].property("application"), Some("billing"));
        assert!(received[1].property("hostname").is_some());
        assert_eq!(received[0].file, None);
        assert_eq!(handle.events_sent(), 2);
    }

    #[test]
    fn test_no_connection_drops_and_reports() {
        let counter = Arc::new(CountingErrorHandler::new());
        let config = SocketConfig::new("127.0.0.1", free_port())
            .with_reconnection_delay(Duration::ZERO)
            .with_connect_timeout(Duration::from_millis(200));
        let appender = SocketAppender::new(config);
        let handle = appender.handle();
        let sink = SinkBuilder::new("remote", appender)
            .error_handler(counter.clone())
            .build()
            .unwrap();

        for i in 0..3 {
            assert!(!sink.deliver(&event(&format!("lost {}", i))));
        }
        assert_eq!(handle.events_dropped(), 3);
        assert_eq!(counter.count(), 3);
        assert_eq!(handle.reconnectors_started(), 0);
        assert!(!handle.is_reconnecting());
    }

    #[test]
    fn test_single_reconnector_until_connected() {
        let port = free_port();
        let config = SocketConfig::new("127.0.0.1", port)
            .with_reconnection_delay(Duration::from_millis(30))
            .with_connect_timeout(Duration::from_millis(200));
        let appender = SocketAppender::new(config);
        let handle = appender.handle();
        let sink = SinkBuilder::new("remote", appender).build().unwrap();

        for i in 0..20 {
            sink.deliver(&event(&format!("during outage {}", i)));
        }
        assert_eq!(handle.reconnectors_started(), 1);
        assert!(handle.events_dropped() >= 20);

        let listener = TcpListener::bind(("127.0.0.1", port)).unwrap();
        assert!(wait_until(Duration::from_secs(5), || handle.is_connected()));
        let (stream, _) = listener.accept().unwrap();
        assert!(wait_until(Duration::from_secs(1), || !handle.is_reconnecting()));

        assert!(sink.deliver(&event("after reconnect")));
        sink.close();
        assert_eq!(handle.reconnectors_started(), 1);

        let received: Vec<LogEvent> = EventReader::new(BufReader::new(stream))
            .filter_map(|r| r.ok())
            .collect();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].message, "after reconnect");
    }

    #[test]
    fn test_close_stops_reconnector() {
        let config = SocketConfig::new("127.0.0.1", free_port())
            .with_reconnection_delay(Duration::from_secs(30))
            .with_connect_timeout(Duration::from_millis(200));
        let appender = SocketAppender::new(config);
        let handle = appender.handle();
        let sink = SinkBuilder::new("remote", appender).build().unwrap();
        assert!(handle.is_reconnecting());

        let started = Instant::now();
        sink.close();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!handle.is_reconnecting());
        assert!(handle.is_closed());
    }
}
