//! Context attached to events
//!
//! This module provides:
//! - `LogContext`: Per-event structured fields
//! - `Ndc`: Per-thread nested diagnostic context (a stack of strings)
//! - `Mdc`: Per-thread mapped diagnostic context (a string map)
//! - `NdcGuard` / `MdcGuard`: RAII guards for scoped context
//!
//! NDC and MDC are bound to the thread that logs. Events snapshot them on the
//! submitting thread, so an asynchronous sink still sees the caller's context.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Value type for structured logging fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Null => write!(f, "null"),
        }
    }
}

impl FieldValue {
    /// Convert to serde_json::Value for JSON serialization
    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            FieldValue::String(s) => serde_json::Value::String(s.clone()),
            FieldValue::Int(i) => serde_json::Value::Number((*i).into()),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Null => serde_json::Value::Null,
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i as i64)
    }
}

impl From<u32> for FieldValue {
    fn from(i: u32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// Structured key-value fields carried by a single event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogContext {
    fields: HashMap<String, FieldValue>,
}

impl LogContext {
    pub fn new() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    /// Add a field to the context
    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn add_field<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.insert(key.into(), value.into());
    }

    pub fn fields(&self) -> &HashMap<String, FieldValue> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Format fields as key=value pairs, sorted by key
    pub fn format_fields(&self) -> String {
        let mut pairs: Vec<_> = self.fields.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        pairs
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_fields())
    }
}

thread_local! {
    static NDC_STACK: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    static MDC_MAP: RefCell<BTreeMap<String, String>> = const { RefCell::new(BTreeMap::new()) };
}

/// Nested diagnostic context of the current thread
///
/// ```
/// use rust_logger_hierarchy::core::Ndc;
///
/// Ndc::push("request-17");
/// {
///     let _inner = Ndc::scope("db");
///     assert_eq!(Ndc::get().as_deref(), Some("request-17 db"));
/// }
/// assert_eq!(Ndc::pop().as_deref(), Some("request-17"));
/// ```
pub struct Ndc;

impl Ndc {
    pub fn push(message: impl Into<String>) {
        NDC_STACK.with(|stack| stack.borrow_mut().push(message.into()));
    }

    pub fn pop() -> Option<String> {
        NDC_STACK.with(|stack| stack.borrow_mut().pop())
    }

    pub fn peek() -> Option<String> {
        NDC_STACK.with(|stack| stack.borrow().last().cloned())
    }

    pub fn depth() -> usize {
        NDC_STACK.with(|stack| stack.borrow().len())
    }

    pub fn clear() {
        NDC_STACK.with(|stack| stack.borrow_mut().clear());
    }

    /// Truncate the stack to at most `max_depth` entries.
    pub fn set_max_depth(max_depth: usize) {
        NDC_STACK.with(|stack| stack.borrow_mut().truncate(max_depth));
    }

    /// The whole stack joined by single spaces, `None` when empty.
    pub fn get() -> Option<String> {
        NDC_STACK.with(|stack| {
            let stack = stack.borrow();
            if stack.is_empty() {
                None
            } else {
                Some(stack.join(" "))
            }
        })
    }

    /// Push `message` and pop it again when the guard drops.
    #[must_use = "the entry is popped as soon as the guard is dropped"]
    pub fn scope(message: impl Into<String>) -> NdcGuard {
        Self::push(message);
        NdcGuard { depth: Self::depth() }
    }
}

/// Pops the NDC back below its entry when dropped
pub struct NdcGuard {
    depth: usize,
}

impl Drop for NdcGuard {
    fn drop(&mut self) {
        Ndc::set_max_depth(self.depth.saturating_sub(1));
    }
}

/// Mapped diagnostic context of the current thread
pub struct Mdc;

impl Mdc {
    pub fn put(key: impl Into<String>, value: impl Into<String>) {
        MDC_MAP.with(|map| {
            map.borrow_mut().insert(key.into(), value.into());
        });
    }

    pub fn get(key: &str) -> Option<String> {
        MDC_MAP.with(|map| map.borrow().get(key).cloned())
    }

    pub fn remove(key: &str) -> Option<String> {
        MDC_MAP.with(|map| map.borrow_mut().remove(key))
    }

    pub fn clear() {
        MDC_MAP.with(|map| map.borrow_mut().clear());
    }

    /// Copy of the current map, `None` when empty.
    pub fn snapshot() -> Option<BTreeMap<String, String>> {
        MDC_MAP.with(|map| {
            let map = map.borrow();
            if map.is_empty() {
                None
            } else {
                Some(map.clone())
            }
        })
    }

    /// Put `key` and remove it again when the guard drops.
    #[must_use = "the key is removed as soon as the guard is dropped"]
    pub fn scope(key: impl Into<String>, value: impl Into<String>) -> MdcGuard {
        let key = key.into();
        Self::put(key.clone(), value);
        MdcGuard { key }
    }
}

/// Removes its key from the MDC when dropped
pub struct MdcGuard {
    key: String,
}

impl Drop for MdcGuard {
    fn drop(&mut self) {
        Mdc::remove(&self.key);
    }
}
