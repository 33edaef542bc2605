//! Per-sink filter chain
//!
//! Filters are evaluated in insertion order. The first `Deny` drops the event,
//! the first `Accept` lets it through without consulting later filters, and
//! `Neutral` defers to the next filter. An exhausted chain accepts.

use super::log_event::LogEvent;
use super::log_level::LogLevel;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Deny,
    Neutral,
    Accept,
}

pub trait Filter: Send + Sync {
    fn decide(&self, event: &LogEvent) -> FilterDecision;
}

impl<F> Filter for F
where
    F: Fn(&LogEvent) -> FilterDecision + Send + Sync,
{
    fn decide(&self, event: &LogEvent) -> FilterDecision {
        self(event)
    }
}

/// Ordered list of filters owned by one sink
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: Arc<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Walk the chain; never returns `Neutral`.
    pub fn decide(&self, event: &LogEvent) -> FilterDecision {
        for filter in &self.filters {
            match filter.decide(event) {
                FilterDecision::Neutral => continue,
                decision => return decision,
            }
        }
        FilterDecision::Accept
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("len", &self.filters.len())
            .finish()
    }
}

fn on_match(accept_on_match: bool) -> FilterDecision {
    if accept_on_match {
        FilterDecision::Accept
    } else {
        FilterDecision::Deny
    }
}

/// Matches one exact level
#[derive(Debug, Clone)]
pub struct LevelMatchFilter {
    pub level: LogLevel,
    pub accept_on_match: bool,
}

impl LevelMatchFilter {
    pub fn new(level: LogLevel, accept_on_match: bool) -> Self {
        Self {
            level,
            accept_on_match,
        }
    }
}

impl Filter for LevelMatchFilter {
    fn decide(&self, event: &LogEvent) -> FilterDecision {
        if event.level == self.level {
            on_match(self.accept_on_match)
        } else {
            FilterDecision::Neutral
        }
    }
}

/// Denies events outside `[min, max]`
///
/// Inside the range the filter accepts when `accept_on_match` is set and stays
/// neutral otherwise, so later filters still get a say.
#[derive(Debug, Clone)]
pub struct LevelRangeFilter {
    pub min: Option<LogLevel>,
    pub max: Option<LogLevel>,
    pub accept_on_match: bool,
}

impl LevelRangeFilter {
    pub fn new(min: Option<LogLevel>, max: Option<LogLevel>) -> Self {
        Self {
            min,
            max,
            accept_on_match: false,
        }
    }

    #[must_use]
    pub fn accept_on_match(mut self, accept: bool) -> Self {
        self.accept_on_match = accept;
        self
    }
}

impl Filter for LevelRangeFilter {
    fn decide(&self, event: &LogEvent) -> FilterDecision {
        if self.min.is_some_and(|min| event.level < min) {
            return FilterDecision::Deny;
        }
        if self.max.is_some_and(|max| event.level > max) {
            return FilterDecision::Deny;
        }
        if self.accept_on_match {
            FilterDecision::Accept
        } else {
            FilterDecision::Neutral
        }
    }
}

/// Matches when the rendered message contains `needle`
#[derive(Debug, Clone)]
pub struct StringMatchFilter {
    pub needle: String,
    pub accept_on_match: bool,
}

impl StringMatchFilter {
    pub fn new(needle: impl Into<String>, accept_on_match: bool) -> Self {
        Self {
            needle: needle.into(),
            accept_on_match,
        }
    }
}

impl Filter for StringMatchFilter {
    fn decide(&self, event: &LogEvent) -> FilterDecision {
        if !self.needle.is_empty() && event.message.contains(&self.needle) {
            on_match(self.accept_on_match)
        } else {
            FilterDecision::Neutral
        }
    }
}

/// Matches when the event's MDC snapshot maps `key` to `value`
#[derive(Debug, Clone)]
pub struct MdcMatchFilter {
    pub key: String,
    pub value: String,
    pub accept_on_match: bool,
}

impl MdcMatchFilter {
    pub fn new(key: impl Into<String>, value: impl Into<String>, accept_on_match: bool) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            accept_on_match,
        }
    }
}

impl Filter for MdcMatchFilter {
    fn decide(&self, event: &LogEvent) -> FilterDecision {
        match event.mdc_value(&self.key) {
            Some(v) if v == self.value => on_match(self.accept_on_match),
            _ => FilterDecision::Neutral,
        }
    }
}

/// Matches when the event's NDC equals `value`
#[derive(Debug, Clone)]
pub struct NdcMatchFilter {
    pub value: String,
    pub accept_on_match: bool,
}

impl NdcMatchFilter {
    pub fn new(value: impl Into<String>, accept_on_match: bool) -> Self {
        Self {
            value: value.into(),
            accept_on_match,
        }
    }
}

impl Filter for NdcMatchFilter {
    fn decide(&self, event: &LogEvent) -> FilterDecision {
        match event.ndc.as_deref() {
            Some(ndc) if ndc == self.value => on_match(self.accept_on_match),
            _ => FilterDecision::Neutral,
        }
    }
}

/// Matches events whose logger is `prefix` or one of its descendants
#[derive(Debug, Clone)]
pub struct LoggerNameFilter {
    pub prefix: String,
    pub accept_on_match: bool,
}

impl LoggerNameFilter {
    pub fn new(prefix: impl Into<String>, accept_on_match: bool) -> Self {
        Self {
            prefix: prefix.into(),
            accept_on_match,
        }
    }
}

impl Filter for LoggerNameFilter {
    fn decide(&self, event: &LogEvent) -> FilterDecision {
        if crate::core::hierarchy::is_descendant_or_self(&event.logger_name, &self.prefix) {
            on_match(self.accept_on_match)
        } else {
            FilterDecision::Neutral
        }
    }
}

/// Drops everything; placed last to turn a chain into an allow-list.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAllFilter;

impl Filter for DenyAllFilter {
    fn decide(&self, _event: &LogEvent) -> FilterDecision {
        FilterDecision::Deny
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(level: LogLevel, message: &str) -> LogEvent {
        LogEvent::new("app.db", level, message)
    }

    #[test]
    fn test_empty_chain_accepts() {
        let chain = FilterChain::new();
        assert_eq!(chain.decide(&event(LogLevel::Trace, "x")), FilterDecision::Accept);
    }

    #[test]
    fn test_first_non_neutral_wins() {
        let mut chain = FilterChain::new();
        chain.push(Arc::new(StringMatchFilter::new("secret", false)));
        chain.push(Arc::new(LevelMatchFilter::new(LogLevel::Info, true)));
        chain.push(Arc::new(DenyAllFilter));

        assert_eq!(chain.decide(&event(LogLevel::Info, "hello")), FilterDecision::Accept);
        assert_eq!(chain.decide(&event(LogLevel::Info, "secret")), FilterDecision::Deny);
        assert_eq!(chain.decide(&event(LogLevel::Warn, "hello")), FilterDecision::Deny);
    }

    #[test]
    fn test_level_range_filter() {
        let filter = LevelRangeFilter::new(Some(LogLevel::Debug), Some(LogLevel::Warn));
        assert_eq!(filter.decide(&event(LogLevel::Trace, "")), FilterDecision::Deny);
        assert_eq!(filter.decide(&event(LogLevel::Info, "")), FilterDecision::Neutral);
        assert_eq!(filter.decide(&event(LogLevel::Error, "")), FilterDecision::Deny);

        let accepting = filter.accept_on_match(true);
        assert_eq!(accepting.decide(&event(LogLevel::Warn, "")), FilterDecision::Accept);
    }

    #[test]
    fn test_mdc_and_ndc_filters() {
        let mut e = event(LogLevel::Info, "m");
        e.mdc = Some([("user".to_string(), "bob".to_string())].into_iter().collect());
        e.ndc = Some("job-1".to_string());

        assert_eq!(MdcMatchFilter::new("user", "bob", false).decide(&e), FilterDecision::Deny);
        assert_eq!(MdcMatchFilter::new("user", "eve", false).decide(&e), FilterDecision::Neutral);
        assert_eq!(NdcMatchFilter::new("job-1", true).decide(&e), FilterDecision::Accept);
    }

    #[test]
    fn test_logger_name_filter_respects_segments() {
        let filter = LoggerNameFilter::new("app", true);
        assert_eq!(filter.decide(&event(LogLevel::Info, "")), FilterDecision::Accept);

        let other = LogEvent::new("application", LogLevel::Info, "");
        assert_eq!(filter.decide(&other), FilterDecision::Neutral);
    }

    #[test]
    fn test_closure_filter() {
        let mut chain = FilterChain::new();
        chain.push(Arc::new(|e: &LogEvent| {
            if e.message.len() > 5 {
                FilterDecision::Deny
            } else {
                FilterDecision::Neutral
            }
        }));
        assert_eq!(chain.decide(&event(LogLevel::Info, "short")), FilterDecision::Accept);
        assert_eq!(chain.decide(&event(LogLevel::Info, "much longer")), FilterDecision::Deny);
    }
}
