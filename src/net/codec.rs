//! Newline-delimited JSON framing

use crate::core::{LogEvent, Result};
use std::io::{BufRead, Write};

/// Serialize one event as a single `\n`-terminated line.
pub fn encode_event(event: &LogEvent) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(event)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Writes framed events to any byte sink
#[derive(Debug)]
pub struct EventWriter<W: Write> {
    inner: W,
}

impl<W: Write> EventWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Encode, write and flush one event.
    ///
    /// Encoding problems come back as `JsonError`, transport problems as
    /// `IoError`, so callers can tell a bad event from a broken stream.
    pub fn write_event(&mut self, event: &LogEvent) -> Result<()> {
        let bytes = encode_event(event)?;
        self.inner.write_all(&bytes)?;
        self.inner.flush()?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Iterator over framed events read from a byte stream
///
/// Blank lines are skipped. A line that does not decode yields an `Err` and
/// reading continues with the next line; an I/O error ends the iteration
/// after being yielded once.
#[derive(Debug)]
pub struct EventReader<R: BufRead> {
    inner: R,
    line: String,
    failed: bool,
}

impl<R: BufRead> EventReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: String::new(),
            failed: false,
        }
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<LogEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            self.line.clear();
            match self.inner.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => {
                    let trimmed = self.line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    return Some(serde_json::from_str(trimmed).map_err(Into::into));
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}
