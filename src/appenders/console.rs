//! Console appender implementation

use crate::core::{Appender, Layout, LogEvent, LogLevel, Result, TextLayout};
#[cfg(feature = "console")]
use colored::Colorize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleTarget {
    /// Error and Fatal to stderr, everything else to stdout
    #[default]
    Split,
    Stdout,
    Stderr,
}

pub struct ConsoleAppender {
    use_colors: bool,
    target: ConsoleTarget,
    immediate_flush: bool,
    layout: Box<dyn Layout>,
}

impl ConsoleAppender {
    pub fn new() -> Self {
        Self {
            use_colors: cfg!(feature = "console"),
            target: ConsoleTarget::default(),
            immediate_flush: true,
            layout: Box::new(TextLayout::new()),
        }
    }

    /// Colour the level name; ignored without the `console` feature.
    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: ConsoleTarget) -> Self {
        self.target = target;
        self
    }

    #[must_use]
    pub fn with_layout<L: Layout + 'static>(mut self, layout: L) -> Self {
        self.layout = Box::new(layout);
        self
    }

    #[must_use]
    pub fn with_immediate_flush(mut self, immediate_flush: bool) -> Self {
        self.immediate_flush = immediate_flush;
        self
    }

    fn uses_stderr(&self, level: LogLevel) -> bool {
        match self.target {
            ConsoleTarget::Stdout => false,
            ConsoleTarget::Stderr => true,
            ConsoleTarget::Split => matches!(level, LogLevel::Error | LogLevel::Fatal),
        }
    }

    #[cfg(feature = "console")]
    fn colorize(&self, level: LogLevel, line: String) -> String {
        if !self.use_colors {
            return line;
        }
        let plain = format!("[{:5}]", level.to_str());
        let painted = format!("[{}]", format!("{:5}", level.to_str()).color(level.color_code()));
        line.replacen(&plain, &painted, 1)
    }

    #[cfg(not(feature = "console"))]
    fn colorize(&self, _level: LogLevel, line: String) -> String {
        line
    }
}

impl Default for ConsoleAppender {
    fn default() -> Self {
        Self::new()
    }
}

impl Appender for ConsoleAppender {
    fn append(&mut self, event: &LogEvent) -> Result<()> {
        let line = self.colorize(event.level, self.layout.format(event));
        if self.uses_stderr(event.level) {
            let mut err = std::io::stderr().lock();
            writeln!(err, "{}", line)?;
            if self.immediate_flush {
                err.flush()?;
            }
        } else {
            let mut out = std::io::stdout().lock();
            writeln!(out, "{}", line)?;
            if self.immediate_flush {
                out.flush()?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::JsonLayout;

    #[test]
    fn test_target_routing() {
        let split = ConsoleAppender::new();
        assert!(split.uses_stderr(LogLevel::Error));
        assert!(!split.uses_stderr(LogLevel::Warn));

        let out = ConsoleAppender::new().with_target(ConsoleTarget::Stdout);
        assert!(!out.uses_stderr(LogLevel::Fatal));
    }

    #[test]
    fn test_append_does_not_fail() {
        let mut appender = ConsoleAppender::new()
            .with_colors(false)
            .with_layout(JsonLayout::new());
        appender
            .append(&LogEvent::new("console", LogLevel::Info, "hello"))
            .unwrap();
        appender.flush().unwrap();
    }

    #[test]
    fn test_uncoloured_line_is_unchanged() {
        let appender = ConsoleAppender::new().with_colors(false);
        let line = "[ts] [INFO ] x - y".to_string();
        assert_eq!(appender.colorize(LogLevel::Info, line.clone()), line);
    }
}
