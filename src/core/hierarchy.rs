//! Dotted-name logger tree with order-independent linking
//!
//! Loggers may be created in any order. Creating `a.b.c` before `a.b` leaves
//! a provisional entry under `a.b` (and `a`) that remembers `a.b.c` as a
//! waiting descendant; when `a.b` is finally created, the waiting descendants
//! whose current parent is not already inside `a.b` are re-parented to it.
//! Every parent link therefore points at the nearest existing ancestor,
//! whatever the creation order was.
//!
//! The name table is guarded by one mutex; create and relink happen under
//! it, so a lookup never sees a half-finished placeholder swap.

use super::diagnostics;
use super::log_level::LogLevel;
use super::logger::Logger;
use super::sink::SinkRef;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Separator between name segments
pub const SEPARATOR: char = '.';

/// True when `name` equals `ancestor` or lies below it segment-wise.
///
/// `app.db` is below `app`; `application` is not. An empty `ancestor`
/// contains every name.
pub fn is_descendant_or_self(name: &str, ancestor: &str) -> bool {
    if ancestor.is_empty() {
        return true;
    }
    match name.strip_prefix(ancestor) {
        Some("") => true,
        Some(rest) => rest.starts_with(SEPARATOR),
        None => false,
    }
}

/// Observer of structural and configuration changes
pub trait HierarchyListener: Send + Sync {
    fn sink_added(&self, _logger: &Logger, _sink: &SinkRef) {}
    fn sink_removed(&self, _logger: &Logger, _sink: &SinkRef) {}
    fn level_changed(&self, _logger: &Logger, _level: Option<LogLevel>) {}
    fn configuration_reset(&self) {}
    fn shutdown(&self) {}
}

/// State shared between a hierarchy and its loggers
pub(crate) struct HierarchyCore {
    threshold: AtomicU8,
    no_sinks_warned: AtomicBool,
    listeners: RwLock<Vec<Arc<dyn HierarchyListener>>>,
}

impl HierarchyCore {
    fn new() -> Self {
        Self {
            threshold: AtomicU8::new(LogLevel::Trace.as_u8()),
            no_sinks_warned: AtomicBool::new(false),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn threshold(&self) -> LogLevel {
        LogLevel::from_u8(self.threshold.load(Ordering::Relaxed))
    }

    pub(crate) fn is_disabled(&self, level: LogLevel) -> bool {
        !level.is_at_least(self.threshold())
    }

    pub(crate) fn warn_no_sinks(&self, logger_name: &str) {
        if !self.no_sinks_warned.swap(true, Ordering::AcqRel) {
            diagnostics::warn(format_args!(
                "No sinks could be found for logger ({}). Please configure the repository.",
                logger_name
            ));
        }
    }

    pub(crate) fn notify(&self, f: impl Fn(&dyn HierarchyListener)) {
        let listeners = self.listeners.read().clone();
        for listener in &listeners {
            f(listener.as_ref());
        }
    }
}

/// Entry of the name table
pub enum NameTableEntry {
    Node(Arc<Logger>),
    /// Stand-in for a name referenced only as a prefix so far, holding the
    /// descendants waiting to be re-parented once it exists
    Provisional(Vec<Arc<Logger>>),
}

pub struct Hierarchy {
    core: Arc<HierarchyCore>,
    root: Arc<Logger>,
    table: Mutex<HashMap<String, NameTableEntry>>,
}

impl Hierarchy {
    pub fn new() -> Self {
        let core = Arc::new(HierarchyCore::new());
        let root = Arc::new(Logger::new_root(Arc::clone(&core)));
        Self {
            core,
            root,
            table: Mutex::new(HashMap::new()),
        }
    }

    pub fn root_logger(&self) -> Arc<Logger> {
        Arc::clone(&self.root)
    }

    /// Return the logger called `name`, creating and linking it on first use.
    ///
    /// The empty name denotes the root logger.
    pub fn get_logger(&self, name: &str) -> Arc<Logger> {
        if name.is_empty() {
            return self.root_logger();
        }

        let mut table = self.table.lock();
        let waiting = match table.get(name) {
            Some(NameTableEntry::Node(logger)) => return Arc::clone(logger),
            Some(NameTableEntry::Provisional(_)) => true,
            None => false,
        };

        let logger = Arc::new(Logger::new(name, Arc::clone(&self.core)));
        let previous = table.insert(name.to_string(), NameTableEntry::Node(Arc::clone(&logger)));
        self.update_parents(&mut table, &logger);
        if waiting {
            if let Some(NameTableEntry::Provisional(children)) = previous {
                Self::update_children(children, &logger);
            }
        }
        logger
    }

    /// Link `logger` to its nearest existing ancestor, leaving provisional
    /// entries behind for every missing prefix on the way.
    fn update_parents(&self, table: &mut HashMap<String, NameTableEntry>, logger: &Arc<Logger>) {
        let name = logger.name();
        let mut end = name.len();
        while let Some(dot) = name[..end].rfind(SEPARATOR) {
            end = dot;
            let prefix = &name[..dot];
            if prefix.is_empty() {
                continue;
            }
            match table.get_mut(prefix) {
                Some(NameTableEntry::Node(parent)) => {
                    logger.set_parent(parent);
                    return;
                }
                Some(NameTableEntry::Provisional(waiting)) => waiting.push(Arc::clone(logger)),
                None => {
                    table.insert(
                        prefix.to_string(),
                        NameTableEntry::Provisional(vec![Arc::clone(logger)]),
                    );
                }
            }
        }
        logger.set_parent(&self.root);
    }

    /// Re-parent waiting descendants unless they already hang below `logger`.
    fn update_children(children: Vec<Arc<Logger>>, logger: &Arc<Logger>) {
        for child in children {
            let already_closer = child
                .parent()
                .is_some_and(|p| !p.is_root() && is_descendant_or_self(p.name(), logger.name()));
            if !already_closer {
                child.set_parent(logger);
            }
        }
    }

    /// The logger called `name` if it has been created; placeholders do not
    /// count. The empty name denotes the root, as in
    /// [`get_logger`](Self::get_logger).
    pub fn exists(&self, name: &str) -> Option<Arc<Logger>> {
        if name.is_empty() {
            return Some(self.root_logger());
        }
        match self.table.lock().get(name) {
            Some(NameTableEntry::Node(logger)) => Some(Arc::clone(logger)),
            _ => None,
        }
    }

    /// Every created logger except the root, sorted by name
    pub fn current_loggers(&self) -> Vec<Arc<Logger>> {
        let mut loggers: Vec<Arc<Logger>> = self
            .table
            .lock()
            .values()
            .filter_map(|entry| match entry {
                NameTableEntry::Node(logger) => Some(Arc::clone(logger)),
                NameTableEntry::Provisional(_) => None,
            })
            .collect();
        loggers.sort_by(|a, b| a.name().cmp(b.name()));
        loggers
    }

    fn all_loggers(&self) -> Vec<Arc<Logger>> {
        let mut loggers = vec![self.root_logger()];
        loggers.extend(self.current_loggers());
        loggers
    }

    pub fn threshold(&self) -> LogLevel {
        self.core.threshold()
    }

    /// Reject events below `level` before any logger is consulted.
    pub fn set_threshold(&self, level: LogLevel) {
        self.core.threshold.store(level.as_u8(), Ordering::Relaxed);
    }

    pub fn is_disabled(&self, level: LogLevel) -> bool {
        self.core.is_disabled(level)
    }

    pub fn add_listener(&self, listener: Arc<dyn HierarchyListener>) {
        self.core.listeners.write().push(listener);
    }

    /// Containers drain into and close their nested sinks, so they go first.
    fn close_containers(loggers: &[Arc<Logger>]) {
        for logger in loggers {
            for sink in logger.sinks().iter().filter(|s| s.is_container()) {
                sink.close();
            }
        }
    }

    /// Restore the default configuration.
    ///
    /// The root goes back to its default level, other loggers to an inherited
    /// level with additivity on, and every attached sink is closed and
    /// detached. Logger objects stay in the table.
    pub fn reset_configuration(&self) {
        let loggers = self.all_loggers();
        Self::close_containers(&loggers);
        for logger in &loggers {
            for sink in logger.reset() {
                sink.close();
            }
        }
        self.set_threshold(LogLevel::Trace);
        self.core.no_sinks_warned.store(false, Ordering::Release);
        self.core.notify(|l| l.configuration_reset());
    }

    /// Close and detach every sink. Levels and additivity are left alone.
    pub fn shutdown(&self) {
        let loggers = self.all_loggers();
        Self::close_containers(&loggers);
        for logger in &loggers {
            for sink in logger.remove_all_sinks() {
                sink.close();
            }
        }
        self.core.notify(|l| l.shutdown());
    }
}

impl Default for Hierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Hierarchy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hierarchy")
            .field("threshold", &self.threshold())
            .field("loggers", &self.table.lock().len())
            .finish()
    }
}
