//! Explicit logging context handed to the application
//!
//! A `Repository` owns one [`Hierarchy`]. Handles are cheap to clone and share
//! the same tree. The repository is shut down by [`Repository::shutdown`], or
//! when the last handle is dropped.
//!
//! ```
//! use rust_logger_hierarchy::appenders::MemoryAppender;
//! use rust_logger_hierarchy::core::{LogLevel, Repository, SinkBuilder};
//!
//! let repo = Repository::new();
//! let memory = MemoryAppender::new();
//! let events = memory.events_handle();
//! repo.root_logger().add_sink(SinkBuilder::new("memory", memory).build().unwrap());
//!
//! let logger = repo.get_logger("app.db");
//! logger.set_level(Some(LogLevel::Info));
//! logger.debug("suppressed");
//! logger.info("connected");
//!
//! assert_eq!(events.messages(), vec!["connected".to_string()]);
//! repo.shutdown();
//! ```

use super::diagnostics;
use super::hierarchy::{Hierarchy, HierarchyListener};
use super::log_level::LogLevel;
use super::logger::Logger;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct RepositoryInner {
    hierarchy: Hierarchy,
    shut_down: AtomicBool,
}

impl RepositoryInner {
    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        diagnostics::debug(format_args!("Shutting down logger repository"));
        self.hierarchy.shutdown();
    }
}

impl Drop for RepositoryInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Clone)]
pub struct Repository {
    inner: Arc<RepositoryInner>,
}

impl Repository {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RepositoryInner {
                hierarchy: Hierarchy::new(),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.inner.hierarchy
    }

    pub fn get_logger(&self, name: &str) -> Arc<Logger> {
        self.inner.hierarchy.get_logger(name)
    }

    pub fn root_logger(&self) -> Arc<Logger> {
        self.inner.hierarchy.root_logger()
    }

    pub fn exists(&self, name: &str) -> Option<Arc<Logger>> {
        self.inner.hierarchy.exists(name)
    }

    pub fn current_loggers(&self) -> Vec<Arc<Logger>> {
        self.inner.hierarchy.current_loggers()
    }

    pub fn threshold(&self) -> LogLevel {
        self.inner.hierarchy.threshold()
    }

    pub fn set_threshold(&self, level: LogLevel) {
        self.inner.hierarchy.set_threshold(level);
    }

    pub fn is_disabled(&self, level: LogLevel) -> bool {
        self.inner.hierarchy.is_disabled(level)
    }

    pub fn add_listener(&self, listener: Arc<dyn HierarchyListener>) {
        self.inner.hierarchy.add_listener(listener);
    }

    pub fn reset_configuration(&self) {
        self.inner.hierarchy.reset_configuration();
    }

    /// Close every sink in the tree. Later calls are no-ops.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("hierarchy", &self.inner.hierarchy)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appenders::MemoryAppender;
    use crate::core::sink::SinkBuilder;

    #[test]
    fn test_clones_share_the_tree() {
        let repo = Repository::new();
        let other = repo.clone();
        let a = repo.get_logger("shared");
        let b = other.exists("shared").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_shutdown_closes_sinks_once() {
        let repo = Repository::new();
        let sink = SinkBuilder::new("m", MemoryAppender::new()).build().unwrap();
        repo.get_logger("x").add_sink(sink.clone());
        repo.root_logger().add_sink(sink.clone());

        repo.shutdown();
        repo.shutdown();
        assert!(repo.is_shut_down());
        assert!(sink.is_closed());
        assert!(repo.get_logger("x").sinks().is_empty());
    }

    #[test]
    fn test_dropping_last_handle_shuts_down() {
        let sink = SinkBuilder::new("m", MemoryAppender::new()).build().unwrap();
        {
            let repo = Repository::new();
            let clone = repo.clone();
            clone.root_logger().add_sink(sink.clone());
            drop(repo);
            assert!(!sink.is_closed());
        }
        assert!(sink.is_closed());
    }
}
