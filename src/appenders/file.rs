//! File appender implementation

use crate::core::{Appender, Layout, LogEvent, LoggerError, Result, TextLayout};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes rendered events to a single file
///
/// The file is opened on activation, not on construction, so a sink built
/// with [`build_inactive`](crate::core::SinkBuilder::build_inactive) touches
/// nothing on disk. The layout header is written after opening and the footer
/// before closing.
///
/// ```no_run
/// use rust_logger_hierarchy::appenders::FileAppender;
/// use rust_logger_hierarchy::core::{JsonLayout, SinkBuilder};
///
/// let sink = SinkBuilder::new(
///     "file",
///     FileAppender::new("/var/log/app.log")
///         .with_append(false)
///         .with_layout(JsonLayout::new()),
/// )
/// .build()
/// .unwrap();
/// ```
pub struct FileAppender {
    path: Option<PathBuf>,
    append: bool,
    buffered: bool,
    immediate_flush: bool,
    layout: Box<dyn Layout>,
    writer: Option<BufWriter<File>>,
    bytes_written: u64,
}

impl FileAppender {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let mut appender = Self::unconfigured();
        appender.path = Some(path.into());
        appender
    }

    /// An appender without a path. Activating it is a configuration error.
    pub fn unconfigured() -> Self {
        Self {
            path: None,
            append: true,
            buffered: true,
            immediate_flush: false,
            layout: Box::new(TextLayout::new()),
            writer: None,
            bytes_written: 0,
        }
    }

    /// Append to an existing file (default) or truncate it on activation.
    #[must_use]
    pub fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    #[must_use]
    pub fn with_buffered(mut self, buffered: bool) -> Self {
        self.buffered = buffered;
        self
    }

    /// Flush after every event.
    #[must_use]
    pub fn with_immediate_flush(mut self, immediate_flush: bool) -> Self {
        self.immediate_flush = immediate_flush;
        self
    }

    #[must_use]
    pub fn with_layout<L: Layout + 'static>(mut self, layout: L) -> Self {
        self.layout = Box::new(layout);
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Bytes written since the file was last opened, header included
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub(crate) fn layout(&self) -> &dyn Layout {
        self.layout.as_ref()
    }

    /// Open the target, starting from `truncate` regardless of the append
    /// setting when requested.
    pub(crate) fn open(&mut self, truncate: bool) -> Result<()> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| LoggerError::config("FileAppender", "no file path set"))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "creating log directory",
                    parent.display().to_string(),
                    e,
                )
            })?;
        }

        let mut options = OpenOptions::new();
        options.create(true);
        if self.append && !truncate {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let file = options.open(&path).map_err(|e| {
            LoggerError::file_appender(path.display().to_string(), format!("cannot open: {}", e))
        })?;

        self.bytes_written = file.metadata().map(|m| m.len()).unwrap_or(0);
        let capacity = if self.buffered { 8 * 1024 } else { 0 };
        self.writer = Some(BufWriter::with_capacity(capacity, file));

        if let Some(header) = self.layout.header() {
            self.write_raw(header.as_bytes())?;
        }
        Ok(())
    }

    /// Write the footer, flush and drop the handle.
    pub(crate) fn close_file(&mut self) -> Result<()> {
        if self.writer.is_none() {
            return Ok(());
        }
        if let Some(footer) = self.layout.footer() {
            self.write_raw(footer.as_bytes())?;
        }
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }

    pub(crate) fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::writer("File writer not initialized"))?;
        writer.write_all(bytes)?;
        self.bytes_written += bytes.len() as u64;
        if self.immediate_flush {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Appender for FileAppender {
    fn append(&mut self, event: &LogEvent) -> Result<()> {
        let mut line = self.layout.format(event);
        line.push('\n');
        self.write_raw(line.as_bytes())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }

    fn activate(&mut self) -> Result<()> {
        self.open(false)
    }

    fn close(&mut self) -> Result<()> {
        self.close_file()
    }
}

impl Drop for FileAppender {
    fn drop(&mut self) {
        // Ensure all buffered data is flushed to disk
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{JsonLayout, LogLevel};
    use tempfile::tempdir;

    #[test]
    fn test_new_keeps_defaults_and_path() {
        let appender = FileAppender::new("logs/app.log");
        assert_eq!(appender.path(), Some(Path::new("logs/app.log")));
        assert!(appender.append);
        assert!(appender.buffered);
        assert!(!appender.immediate_flush);
        assert!(!appender.is_open());
        assert_eq!(appender.bytes_written(), 0);
    }

    #[test]
    fn test_missing_path_is_configuration_error() {
        let mut appender = FileAppender::unconfigured();
        let err = appender.activate().unwrap_err();
        assert!(err.is_configuration());
        assert!(!appender.is_open());
    }

    #[test]
    fn test_header_and_footer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("app.log");
        let mut appender = FileAppender::new(&path).with_layout(
            TextLayout::new()
                .with_header("--- start ---\n")
                .with_footer("--- end ---\n"),
        );
        appender.activate().unwrap();
        appender
            .append(&LogEvent::new("file", LogLevel::Info, "body"))
            .unwrap();
        appender.close().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("--- start ---"));
        assert!(content.contains("body"));
        assert!(content.ends_with("--- end ---\n"));
    }

    #[test]
    fn test_truncate_mode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "old content\n").unwrap();

        let mut appender = FileAppender::new(&path)
            .with_append(false)
            .with_layout(JsonLayout::new());
        appender.activate().unwrap();
        appender
            .append(&LogEvent::new("file", LogLevel::Warn, "fresh"))
            .unwrap();
        appender.close().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("old content"));
        assert!(content.contains("fresh"));
    }

    #[test]
    fn test_append_mode_keeps_content_and_counts_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "kept\n").unwrap();

        let mut appender = FileAppender::new(&path).with_immediate_flush(true);
        appender.activate().unwrap();
        assert_eq!(appender.bytes_written(), 5);
        appender
            .append(&LogEvent::new("file", LogLevel::Info, "more"))
            .unwrap();
        assert!(appender.bytes_written() > 5);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("kept\n"));
        assert!(content.contains("more"));
    }

    #[test]
    fn test_append_before_activation_fails() {
        let dir = tempdir().unwrap();
        let mut appender = FileAppender::new(dir.path().join("x.log"));
        assert!(appender
            .append(&LogEvent::new("file", LogLevel::Info, "early"))
            .is_err());
    }
}
