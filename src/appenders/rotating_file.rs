//! Rolling file appender
//!
//! A [`FileAppender`] whose target is rolled over when a [`RolloverPolicy`]
//! says so. The policy is asked after every write with the current file size
//! and the time the file was opened; rolling renames `app.log` to `app.log.1`
//! (shifting older backups up by one and deleting the one past the limit),
//! optionally gzips it, and opens a fresh `app.log`.

use super::file::FileAppender;
use crate::core::diagnostics;
use crate::core::{Appender, Layout, LogEvent, LoggerError, Result};
use chrono::{DateTime, Local, Timelike};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Decides when a file-backed sink rolls over to a new file
pub trait RolloverPolicy: Send + Sync {
    /// Called after each write.
    fn should_roll(&self, file_size: u64, opened_at: SystemTime, now: SystemTime) -> bool;

    /// Backups kept after rolling; older ones are deleted.
    fn max_backups(&self) -> usize {
        5
    }

    fn compress(&self) -> bool {
        false
    }
}

/// When to roll over
///
/// ```
/// use rust_logger_hierarchy::appenders::RotationStrategy;
/// use std::time::Duration;
///
/// let size = RotationStrategy::size(100 * 1024 * 1024);
/// let daily = RotationStrategy::daily(0);
/// let hybrid = RotationStrategy::hybrid(50 * 1024 * 1024, Duration::from_secs(24 * 3600));
/// # let _ = (size, daily, hybrid);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RotationStrategy {
    /// Roll when the file reaches this size in bytes
    Size { max_bytes: u64 },

    /// Roll once the file has been open this long
    Time { interval: Duration },

    /// Roll on the first write of a new day at or after `hour` (0-23)
    Daily { hour: u8 },

    Hourly,

    /// Size or time, whichever comes first
    Hybrid { max_bytes: u64, interval: Duration },

    /// Never roll (external rotation)
    Never,
}

impl Default for RotationStrategy {
    fn default() -> Self {
        RotationStrategy::Size {
            max_bytes: 10 * 1024 * 1024, // 10 MB
        }
    }
}

impl RotationStrategy {
    #[must_use]
    pub fn size(max_bytes: u64) -> Self {
        RotationStrategy::Size { max_bytes }
    }

    #[must_use]
    pub fn time(interval: Duration) -> Self {
        RotationStrategy::Time { interval }
    }

    /// # Panics
    ///
    /// Panics if hour is greater than 23
    #[must_use]
    pub fn daily(hour: u8) -> Self {
        assert!(hour <= 23, "Hour must be between 0 and 23");
        RotationStrategy::Daily { hour }
    }

    #[must_use]
    pub fn hourly() -> Self {
        RotationStrategy::Hourly
    }

    #[must_use]
    pub fn hybrid(max_bytes: u64, interval: Duration) -> Self {
        RotationStrategy::Hybrid { max_bytes, interval }
    }

    #[must_use]
    pub fn never() -> Self {
        RotationStrategy::Never
    }
}

/// Built-in [`RolloverPolicy`]: a [`RotationStrategy`] plus backup count and
/// compression
///
/// ```
/// use rust_logger_hierarchy::appenders::{RotationPolicy, RotationStrategy};
///
/// let policy = RotationPolicy::new()
///     .with_strategy(RotationStrategy::Daily { hour: 2 })
///     .with_max_backups(30)
///     .with_compression(true);
/// assert_eq!(policy.max_file_size(), None);
/// ```
#[derive(Debug, Clone)]
pub struct RotationPolicy {
    pub strategy: RotationStrategy,
    pub max_backup_files: usize,
    pub compress: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            strategy: RotationStrategy::default(),
            max_backup_files: 5,
            compress: false,
        }
    }
}

impl RotationPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_strategy(mut self, strategy: RotationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Shorthand for `with_strategy(RotationStrategy::Size { max_bytes: size })`
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_size(mut self, size: u64) -> Self {
        self.strategy = RotationStrategy::Size { max_bytes: size };
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backup_files = count;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    /// Size limit, if the strategy has one
    #[must_use]
    pub fn max_file_size(&self) -> Option<u64> {
        match &self.strategy {
            RotationStrategy::Size { max_bytes } => Some(*max_bytes),
            RotationStrategy::Hybrid { max_bytes, .. } => Some(*max_bytes),
            _ => None,
        }
    }
}

fn elapsed_since(opened_at: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(opened_at).unwrap_or(Duration::ZERO)
}

impl RolloverPolicy for RotationPolicy {
    fn should_roll(&self, file_size: u64, opened_at: SystemTime, now: SystemTime) -> bool {
        match &self.strategy {
            RotationStrategy::Never => false,
            RotationStrategy::Size { max_bytes } => file_size >= *max_bytes,
            RotationStrategy::Time { interval } => elapsed_since(opened_at, now) >= *interval,
            RotationStrategy::Daily { hour } => {
                let now: DateTime<Local> = now.into();
                let opened: DateTime<Local> = opened_at.into();
                now.date_naive() != opened.date_naive() && now.hour() >= u32::from(*hour)
            }
            RotationStrategy::Hourly => {
                elapsed_since(opened_at, now) >= Duration::from_secs(3600)
            }
            RotationStrategy::Hybrid { max_bytes, interval } => {
                file_size >= *max_bytes || elapsed_since(opened_at, now) >= *interval
            }
        }
    }

    fn max_backups(&self) -> usize {
        self.max_backup_files
    }

    fn compress(&self) -> bool {
        self.compress
    }
}

const MAX_DELETION_FAILURES: usize = 5;

/// File appender that rolls its target over
///
/// ```no_run
/// use rust_logger_hierarchy::appenders::{RollingFileAppender, RotationPolicy, RotationStrategy};
/// use rust_logger_hierarchy::core::SinkBuilder;
/// use std::time::Duration;
///
/// let policy = RotationPolicy::new()
///     .with_strategy(RotationStrategy::time(Duration::from_secs(3600)))
///     .with_max_backups(24);
/// let sink = SinkBuilder::new("rolling", RollingFileAppender::new("/var/log/app.log", policy))
///     .build()
///     .unwrap();
/// ```
pub struct RollingFileAppender {
    file: FileAppender,
    base_path: PathBuf,
    policy: Box<dyn RolloverPolicy>,
    opened_at: SystemTime,
    rollovers: u64,
    /// Consecutive failures to delete the oldest backup
    deletion_failure_count: usize,
}

impl RollingFileAppender {
    pub fn new<P: RolloverPolicy + 'static>(path: impl Into<PathBuf>, policy: P) -> Self {
        let base_path = path.into();
        Self {
            file: FileAppender::new(&base_path),
            base_path,
            policy: Box::new(policy),
            opened_at: SystemTime::now(),
            rollovers: 0,
            deletion_failure_count: 0,
        }
    }

    #[must_use]
    pub fn with_layout<L: Layout + 'static>(mut self, layout: L) -> Self {
        self.file = self.file.with_layout(layout);
        self
    }

    #[must_use]
    pub fn with_immediate_flush(mut self, immediate_flush: bool) -> Self {
        self.file = self.file.with_immediate_flush(immediate_flush);
        self
    }

    pub fn path(&self) -> &Path {
        &self.base_path
    }

    pub fn current_size(&self) -> u64 {
        self.file.bytes_written()
    }

    /// Completed rollovers since activation
    pub fn rollovers(&self) -> u64 {
        self.rollovers
    }

    pub fn layout(&self) -> &dyn Layout {
        self.file.layout()
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut path = self.base_path.clone();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("app.log")
            .to_string();
        path.set_file_name(format!("{}.{}", filename, index));
        path
    }

    fn compressed(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".gz");
        PathBuf::from(name)
    }

    fn remove_oldest(&mut self, max_backups: usize) -> Result<()> {
        let oldest = self.backup_path(max_backups);
        let mut deletion_failed = false;
        for candidate in [Self::compressed(&oldest), oldest] {
            if candidate.exists() {
                if let Err(e) = fs::remove_file(&candidate) {
                    deletion_failed = true;
                    diagnostics::warn(format_args!(
                        "Failed to remove oldest backup {}: {} (failure #{}/{})",
                        candidate.display(),
                        e,
                        self.deletion_failure_count + 1,
                        MAX_DELETION_FAILURES
                    ));
                }
            }
        }

        if !deletion_failed {
            self.deletion_failure_count = 0;
            return Ok(());
        }
        self.deletion_failure_count += 1;
        if self.deletion_failure_count >= MAX_DELETION_FAILURES {
            return Err(LoggerError::file_rotation(
                self.base_path.display().to_string(),
                format!(
                    "failed to delete old backups {} consecutive times",
                    self.deletion_failure_count
                ),
            ));
        }
        Ok(())
    }

    fn shift_backups(&self, max_backups: usize) -> Result<()> {
        for i in (1..max_backups).rev() {
            let from = self.backup_path(i);
            let to = self.backup_path(i + 1);
            let (from, to) = if Self::compressed(&from).exists() {
                (Self::compressed(&from), Self::compressed(&to))
            } else if from.exists() {
                (from, to)
            } else {
                continue;
            };
            if fs::rename(&from, &to).is_err() {
                // Some platforms refuse to rename over an existing file
                let _ = fs::remove_file(&to);
                fs::rename(&from, &to).map_err(|e| {
                    LoggerError::file_rotation(
                        from.display().to_string(),
                        format!("failed to shift backup: {}", e),
                    )
                })?;
            }
        }
        Ok(())
    }

    /// Close the current file, shift backups and open a fresh file.
    fn roll_over(&mut self) -> Result<()> {
        self.file.close_file().map_err(|e| {
            LoggerError::file_rotation(
                self.base_path.display().to_string(),
                format!("failed to close before rollover: {}", e),
            )
        })?;

        let max_backups = self.policy.max_backups();
        if max_backups == 0 {
            if self.base_path.exists() {
                fs::remove_file(&self.base_path)?;
            }
        } else {
            self.remove_oldest(max_backups)?;
            self.shift_backups(max_backups)?;

            let first = self.backup_path(1);
            if self.base_path.exists() {
                fs::rename(&self.base_path, &first).map_err(|e| {
                    LoggerError::file_rotation(
                        self.base_path.display().to_string(),
                        format!("failed to rename current file: {}", e),
                    )
                })?;
                if self.policy.compress() {
                    compress_file(&first, &Self::compressed(&first))?;
                }
            }
        }

        self.file.open(true)?;
        self.opened_at = SystemTime::now();
        self.rollovers += 1;
        Ok(())
    }
}

/// Gzip `path` into `gz_path`, removing the original only once the
/// compressed copy is complete.
fn compress_file(path: &Path, gz_path: &Path) -> Result<()> {
    use std::io::{BufReader, BufWriter};

    let mut temp = gz_path.as_os_str().to_os_string();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    let input = fs::File::open(path).map_err(|e| {
        LoggerError::io_operation("compressing log file", path.display().to_string(), e)
    })?;
    let mut reader = BufReader::with_capacity(64 * 1024, input);

    let output = fs::File::create(&temp).map_err(|e| {
        LoggerError::io_operation("compressing log file", temp.display().to_string(), e)
    })?;
    let mut encoder = flate2::write::GzEncoder::new(
        BufWriter::with_capacity(64 * 1024, output),
        flate2::Compression::default(),
    );

    let streamed = std::io::copy(&mut reader, &mut encoder)
        .and_then(|_| encoder.finish())
        .and_then(|mut writer| std::io::Write::flush(&mut writer));
    if let Err(e) = streamed {
        let _ = fs::remove_file(&temp);
        return Err(LoggerError::io_operation(
            "compressing log file",
            path.display().to_string(),
            e,
        ));
    }

    if let Err(e) = fs::rename(&temp, gz_path) {
        let _ = fs::remove_file(&temp);
        return Err(LoggerError::io_operation(
            "compressing log file",
            gz_path.display().to_string(),
            e,
        ));
    }

    if let Err(e) = fs::remove_file(path) {
        diagnostics::warn(format_args!(
            "Compressed {} but could not remove the original: {}",
            path.display(),
            e
        ));
    }
    Ok(())
}

impl Appender for RollingFileAppender {
    fn append(&mut self, event: &LogEvent) -> Result<()> {
        self.file.append(event)?;

        if !self
            .policy
            .should_roll(self.file.bytes_written(), self.opened_at, SystemTime::now())
        {
            return Ok(());
        }

        if let Err(e) = self.roll_over() {
            // Keep writing to whatever file we can get rather than losing events
            diagnostics::warn(format_args!(
                "Rollover of {} failed: {}. Continuing with current file.",
                self.base_path.display(),
                e
            ));
            if !self.file.is_open() {
                self.file.open(false)?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush()
    }

    fn activate(&mut self) -> Result<()> {
        self.file.open(false)?;
        self.opened_at = fs::metadata(&self.base_path)
            .and_then(|m| m.modified())
            .unwrap_or_else(|_| SystemTime::now());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.file.close_file()
    }
}
