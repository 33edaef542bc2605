//! Named node of the logger hierarchy
//!
//! A `Logger` carries an optional level (unset means "inherit"), an additivity
//! flag and the sinks attached directly to it. Its parent link is non-owning:
//! the [`Hierarchy`](super::hierarchy::Hierarchy) owns every node, so a logger
//! that outlives its hierarchy simply stops seeing ancestors.

use super::diagnostics;
use super::fan_out::FanOut;
use super::hierarchy::HierarchyCore;
use super::log_context::LogContext;
use super::log_event::LogEvent;
use super::log_level::LogLevel;
use super::sink::SinkRef;
use parking_lot::RwLock;
use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Name reported by the root logger
pub const ROOT_LOGGER_NAME: &str = "root";

/// Level the root logger starts with and returns to on reset
pub const DEFAULT_ROOT_LEVEL: LogLevel = LogLevel::Debug;

pub struct Logger {
    name: String,
    is_root: bool,
    level: RwLock<Option<LogLevel>>,
    additive: AtomicBool,
    sinks: FanOut,
    parent: RwLock<Weak<Logger>>,
    core: Arc<HierarchyCore>,
}

impl Logger {
    pub(crate) fn new(name: impl Into<String>, core: Arc<HierarchyCore>) -> Self {
        Self {
            name: name.into(),
            is_root: false,
            level: RwLock::new(None),
            additive: AtomicBool::new(true),
            sinks: FanOut::new(),
            parent: RwLock::new(Weak::new()),
            core,
        }
    }

    pub(crate) fn new_root(core: Arc<HierarchyCore>) -> Self {
        Self {
            is_root: true,
            level: RwLock::new(Some(DEFAULT_ROOT_LEVEL)),
            ..Self::new(ROOT_LOGGER_NAME, core)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Nearest existing ancestor, `None` for the root.
    pub fn parent(&self) -> Option<Arc<Logger>> {
        self.parent.read().upgrade()
    }

    pub(crate) fn set_parent(&self, parent: &Arc<Logger>) {
        *self.parent.write() = Arc::downgrade(parent);
    }

    /// Explicitly assigned level, `None` when inherited.
    pub fn level(&self) -> Option<LogLevel> {
        *self.level.read()
    }

    /// Assign or clear this node's level.
    ///
    /// The root always keeps a level; clearing it is refused with a warning.
    pub fn set_level(&self, level: Option<LogLevel>) {
        if self.is_root && level.is_none() {
            diagnostics::warn(format_args!(
                "The root logger must keep a level, ignoring attempt to clear it"
            ));
            return;
        }
        *self.level.write() = level;
        self.core.notify(|l| l.level_changed(self, level));
    }

    /// Level of the nearest node, self included, that has one.
    pub fn effective_level(&self) -> LogLevel {
        if let Some(level) = self.level() {
            return level;
        }
        let mut current = self.parent();
        while let Some(node) = current {
            if let Some(level) = node.level() {
                return level;
            }
            current = node.parent();
        }
        DEFAULT_ROOT_LEVEL
    }

    pub fn additive(&self) -> bool {
        self.additive.load(Ordering::Acquire)
    }

    pub fn set_additive(&self, additive: bool) {
        self.additive.store(additive, Ordering::Release);
    }

    pub fn add_sink(&self, sink: SinkRef) {
        if self.sinks.add(sink.clone()) {
            self.core.notify(|l| l.sink_added(self, &sink));
        }
    }

    /// Detach `sink` without closing it.
    pub fn remove_sink(&self, sink: &SinkRef) -> Option<SinkRef> {
        let removed = self.sinks.remove(sink)?;
        self.core.notify(|l| l.sink_removed(self, &removed));
        Some(removed)
    }

    /// Detach the first sink called `name` without closing it.
    pub fn remove_sink_by_name(&self, name: &str) -> Option<SinkRef> {
        let removed = self.sinks.remove_by_name(name)?;
        self.core.notify(|l| l.sink_removed(self, &removed));
        Some(removed)
    }

    /// Detach every sink without closing any.
    pub fn remove_all_sinks(&self) -> Vec<SinkRef> {
        self.sinks.remove_all()
    }

    pub fn sink(&self, name: &str) -> Option<SinkRef> {
        self.sinks.get(name)
    }

    /// Sinks attached directly to this node
    pub fn sinks(&self) -> Arc<Vec<SinkRef>> {
        self.sinks.snapshot()
    }

    pub fn has_sink(&self, sink: &SinkRef) -> bool {
        self.sinks.contains(sink)
    }

    /// Clear level and additivity, detach sinks. Used by repository reset.
    pub(crate) fn reset(&self) -> Vec<SinkRef> {
        if self.is_root {
            *self.level.write() = Some(DEFAULT_ROOT_LEVEL);
        } else {
            *self.level.write() = None;
        }
        self.set_additive(true);
        self.sinks.remove_all()
    }

    /// Whether an event at `level` would pass the repository threshold and
    /// this node's effective level.
    #[inline]
    pub fn is_enabled_for(&self, level: LogLevel) -> bool {
        !self.core.is_disabled(level) && level.is_at_least(self.effective_level())
    }

    /// Deliver `event` to this node's sinks and, while additive, to every
    /// ancestor's sinks. Returns the number of sinks tried.
    pub fn call_sinks(&self, event: &LogEvent) -> usize {
        let mut tried = self.sinks.deliver_all(event);
        if self.additive() {
            let mut current = self.parent();
            while let Some(node) = current {
                tried += node.sinks.deliver_all(event);
                if !node.additive() {
                    break;
                }
                current = node.parent();
            }
        }
        if tried == 0 {
            self.core.warn_no_sinks(&self.name);
        }
        tried
    }

    /// Dispatch `event` without checking levels.
    ///
    /// The calling thread's NDC and MDC are captured first.
    pub fn forced_log(&self, mut event: LogEvent) -> usize {
        event.capture_thread_context();
        self.call_sinks(&event)
    }

    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        if self.is_enabled_for(level) {
            self.forced_log(LogEvent::new(self.name.as_str(), level, message));
        }
    }

    pub fn log_with_error(
        &self,
        level: LogLevel,
        message: impl AsRef<str>,
        error: &(dyn StdError + 'static),
    ) {
        if self.is_enabled_for(level) {
            self.forced_log(LogEvent::new(self.name.as_str(), level, message).with_error(error));
        }
    }

    pub fn log_with_context(&self, level: LogLevel, message: impl AsRef<str>, context: LogContext) {
        if self.is_enabled_for(level) {
            self.forced_log(LogEvent::new(self.name.as_str(), level, message).with_context(context));
        }
    }

    #[inline]
    pub fn trace(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Trace, message);
    }

    #[inline]
    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message);
    }

    #[inline]
    pub fn fatal(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Fatal, message);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level())
            .field("additive", &self.additive())
            .field("parent", &self.parent().map(|p| p.name.clone()))
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appenders::MemoryAppender;
    use crate::core::hierarchy::Hierarchy;
    use crate::core::log_context::Ndc;
    use crate::core::sink::SinkBuilder;

    fn memory_sink(name: &str) -> (SinkRef, crate::appenders::MemoryEvents) {
        let memory = MemoryAppender::new();
        let events = memory.events_handle();
        (SinkBuilder::new(name, memory).build().unwrap(), events)
    }

    #[test]
    fn test_effective_level_walks_up() {
        let hierarchy = Hierarchy::new();
        let child = hierarchy.get_logger("a.b.c");
        assert_eq!(child.level(), None);
        assert_eq!(child.effective_level(), DEFAULT_ROOT_LEVEL);

        hierarchy.get_logger("a").set_level(Some(LogLevel::Error));
        assert_eq!(child.effective_level(), LogLevel::Error);
        assert!(child.is_enabled_for(LogLevel::Fatal));
        assert!(!child.is_enabled_for(LogLevel::Warn));
    }

    #[test]
    fn test_root_refuses_cleared_level() {
        let hierarchy = Hierarchy::new();
        let root = hierarchy.root_logger();
        root.set_level(None);
        assert_eq!(root.level(), Some(DEFAULT_ROOT_LEVEL));
        root.set_level(Some(LogLevel::Warn));
        assert_eq!(root.level(), Some(LogLevel::Warn));
    }

    #[test]
    fn test_additivity_cutoff() {
        let hierarchy = Hierarchy::new();
        let (root_sink, root_events) = memory_sink("root");
        let (mid_sink, mid_events) = memory_sink("mid");
        let (leaf_sink, leaf_events) = memory_sink("leaf");

        hierarchy.root_logger().add_sink(root_sink);
        let mid = hierarchy.get_logger("svc");
        mid.add_sink(mid_sink);
        mid.set_additive(false);
        let leaf = hierarchy.get_logger("svc.http");
        leaf.add_sink(leaf_sink);

        leaf.info("request served");
        assert_eq!(leaf_events.len(), 1);
        assert_eq!(mid_events.len(), 1);
        assert_eq!(root_events.len(), 0);
    }

    #[test]
    fn test_non_additive_leaf_uses_only_own_sinks() {
        let hierarchy = Hierarchy::new();
        let (root_sink, root_events) = memory_sink("root");
        hierarchy.root_logger().add_sink(root_sink);

        let leaf = hierarchy.get_logger("quiet");
        leaf.set_additive(false);
        assert_eq!(leaf.forced_log(LogEvent::new("quiet", LogLevel::Info, "x")), 0);
        assert!(root_events.is_empty());
    }

    #[test]
    fn test_log_captures_ndc() {
        let hierarchy = Hierarchy::new();
        let (sink, events) = memory_sink("mem");
        let logger = hierarchy.get_logger("ctx");
        logger.add_sink(sink);

        let _scope = Ndc::scope("req-42");
        logger.warn("slow query");
        let captured = events.events();
        assert_eq!(captured[0].ndc.as_deref(), Some("req-42"));
        assert_eq!(captured[0].logger_name, "ctx");
    }

    #[test]
    fn test_sink_membership() {
        let hierarchy = Hierarchy::new();
        let logger = hierarchy.get_logger("m");
        let (sink, _) = memory_sink("s");
        logger.add_sink(sink.clone());
        logger.add_sink(sink.clone());
        assert_eq!(logger.sinks().len(), 1);
        assert!(logger.has_sink(&sink));
        assert!(logger.sink("s").is_some());

        let removed = logger.remove_sink_by_name("s").unwrap();
        assert!(!removed.is_closed());
        assert!(logger.sinks().is_empty());
    }
}
