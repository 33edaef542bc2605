//! Probabilistic sampling filter for high-volume loggers
//!
//! `SamplingFilter` denies a random share of events and is neutral for the
//! rest, so it composes with the other filters of a sink's chain. Levels in
//! `always_sample` are never denied. Per-logger rates apply to a logger name
//! and all its descendants; the longest configured prefix wins.
//!
//! ```
//! use rust_logger_hierarchy::core::{LogLevel, SamplingConfig, SamplingFilter};
//!
//! let filter = SamplingFilter::new(
//!     SamplingConfig::new(0.1)
//!         .with_logger_rate("app.db", 0.01)
//!         .with_always_sample(vec![LogLevel::Warn, LogLevel::Error, LogLevel::Fatal]),
//! );
//! assert_eq!(filter.config().rate, 0.1);
//! ```

use super::filter::{Filter, FilterDecision};
use super::hierarchy::is_descendant_or_self;
use super::log_event::LogEvent;
use super::log_level::LogLevel;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Length of one adaptive-rate measurement window
const RATE_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SamplingConfig {
    /// Share of events kept, between 0.0 and 1.0
    pub rate: f64,

    /// Levels never denied
    pub always_sample: Vec<LogLevel>,

    /// Rates for logger subtrees, keyed by logger name
    pub logger_rates: HashMap<String, f64>,

    /// Scale `rate` down when throughput exceeds `adaptive_threshold`
    pub adaptive: bool,

    /// Events per second above which adaptive sampling kicks in
    pub adaptive_threshold: usize,

    /// Floor for the adaptive rate
    pub adaptive_min_rate: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            rate: 1.0,
            always_sample: vec![LogLevel::Error, LogLevel::Fatal],
            logger_rates: HashMap::new(),
            adaptive: false,
            adaptive_threshold: 10000,
            adaptive_min_rate: 0.01,
        }
    }
}

impl SamplingConfig {
    pub fn new(rate: f64) -> Self {
        Self {
            rate: rate.clamp(0.0, 1.0),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_always_sample(mut self, levels: Vec<LogLevel>) -> Self {
        self.always_sample = levels;
        self
    }

    #[must_use]
    pub fn with_logger_rate(mut self, logger: impl Into<String>, rate: f64) -> Self {
        self.logger_rates.insert(logger.into(), rate.clamp(0.0, 1.0));
        self
    }

    #[must_use]
    pub fn with_adaptive(mut self, threshold: usize, min_rate: f64) -> Self {
        self.adaptive = true;
        self.adaptive_threshold = threshold;
        self.adaptive_min_rate = min_rate.clamp(0.0, 1.0);
        self
    }
}

/// Kept/denied counters of one sampling filter
#[derive(Debug, Default)]
pub struct SamplerMetrics {
    sampled_count: AtomicU64,
    dropped_count: AtomicU64,
}

impl SamplerMetrics {
    pub const fn new() -> Self {
        Self {
            sampled_count: AtomicU64::new(0),
            dropped_count: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn sampled_count(&self) -> u64 {
        self.sampled_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn total_count(&self) -> u64 {
        self.sampled_count() + self.dropped_count()
    }

    #[inline]
    fn record(&self, sampled: bool) {
        if sampled {
            self.sampled_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.dropped_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Observed share of kept events, 1.0 before the first event.
    pub fn effective_sample_rate(&self) -> f64 {
        let total = self.total_count();
        if total == 0 {
            1.0
        } else {
            self.sampled_count() as f64 / total as f64
        }
    }

    pub fn reset(&self) {
        self.sampled_count.store(0, Ordering::Relaxed);
        self.dropped_count.store(0, Ordering::Relaxed);
    }
}

/// Events-per-second estimate over tumbling windows
#[derive(Debug)]
struct RateTracker {
    window: Mutex<(Instant, u64)>,
    last_rate: AtomicU64,
}

impl RateTracker {
    fn new() -> Self {
        Self {
            window: Mutex::new((Instant::now(), 0)),
            last_rate: AtomicU64::new(0f64.to_bits()),
        }
    }

    fn record_and_get_rate(&self) -> f64 {
        let mut window = self.window.lock();
        window.1 += 1;
        let elapsed = window.0.elapsed();
        if elapsed.is_zero() {
            return self.current_rate();
        }
        let rate = window.1 as f64 / elapsed.as_secs_f64();
        self.last_rate.store(rate.to_bits(), Ordering::Relaxed);
        if elapsed >= RATE_WINDOW {
            *window = (Instant::now(), 0);
        }
        rate
    }

    fn current_rate(&self) -> f64 {
        f64::from_bits(self.last_rate.load(Ordering::Relaxed))
    }
}

pub struct SamplingFilter {
    config: SamplingConfig,
    metrics: SamplerMetrics,
    rate_tracker: RateTracker,
}

impl SamplingFilter {
    pub fn new(config: SamplingConfig) -> Self {
        Self {
            config,
            metrics: SamplerMetrics::new(),
            rate_tracker: RateTracker::new(),
        }
    }

    /// Whether an event at `level` from `logger_name` is kept.
    pub fn should_sample(&self, level: LogLevel, logger_name: &str) -> bool {
        if self.config.always_sample.contains(&level) {
            self.metrics.record(true);
            return true;
        }

        let rate = self.effective_rate(logger_name);
        let sampled = if rate >= 1.0 {
            true
        } else if rate <= 0.0 {
            false
        } else {
            rand::thread_rng().gen::<f64>() < rate
        };
        self.metrics.record(sampled);
        sampled
    }

    fn logger_rate(&self, logger_name: &str) -> Option<f64> {
        self.config
            .logger_rates
            .iter()
            .filter(|(prefix, _)| is_descendant_or_self(logger_name, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, rate)| *rate)
    }

    fn effective_rate(&self, logger_name: &str) -> f64 {
        if let Some(rate) = self.logger_rate(logger_name) {
            return rate;
        }

        if self.config.adaptive {
            let current = self.rate_tracker.record_and_get_rate();
            let threshold = self.config.adaptive_threshold as f64;
            if current > threshold {
                return (self.config.rate * threshold / current).max(self.config.adaptive_min_rate);
            }
        }

        self.config.rate
    }

    pub fn metrics(&self) -> &SamplerMetrics {
        &self.metrics
    }

    /// Last measured events per second (adaptive mode only)
    pub fn current_message_rate(&self) -> f64 {
        self.rate_tracker.current_rate()
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }
}

impl Filter for SamplingFilter {
    fn decide(&self, event: &LogEvent) -> FilterDecision {
        if self.should_sample(event.level, &event.logger_name) {
            FilterDecision::Neutral
        } else {
            FilterDecision::Deny
        }
    }
}

impl std::fmt::Debug for SamplingFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplingFilter")
            .field("config", &self.config)
            .field("metrics", &self.metrics)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_clamps_rates() {
        assert_eq!(SamplingConfig::new(1.5).rate, 1.0);
        assert_eq!(SamplingConfig::new(-0.5).rate, 0.0);

        let config = SamplingConfig::new(0.3).with_logger_rate("db", 7.0);
        assert_eq!(config.logger_rates.get("db"), Some(&1.0));
    }

    #[test]
    fn test_always_sample_levels_pass_at_zero_rate() {
        let filter = SamplingFilter::new(SamplingConfig::new(0.0));

        assert!(filter.should_sample(LogLevel::Error, "app"));
        assert!(filter.should_sample(LogLevel::Fatal, "app"));
        for _ in 0..10 {
            assert!(!filter.should_sample(LogLevel::Info, "app"));
        }
        assert_eq!(filter.metrics().sampled_count(), 2);
        assert_eq!(filter.metrics().dropped_count(), 10);
    }

    #[test]
    fn test_filter_decisions() {
        let filter = SamplingFilter::new(SamplingConfig::new(0.0));
        let info = LogEvent::new("app", LogLevel::Info, "dropped");
        let error = LogEvent::new("app", LogLevel::Error, "kept");

        assert_eq!(filter.decide(&info), FilterDecision::Deny);
        assert_eq!(filter.decide(&error), FilterDecision::Neutral);
    }

    #[test]
    fn test_longest_logger_prefix_wins() {
        let config = SamplingConfig::new(1.0)
            .with_logger_rate("app", 0.0)
            .with_logger_rate("app.audit", 1.0);
        let filter = SamplingFilter::new(config);

        for _ in 0..10 {
            assert!(!filter.should_sample(LogLevel::Info, "app.web"));
            assert!(filter.should_sample(LogLevel::Info, "app.audit.login"));
            assert!(filter.should_sample(LogLevel::Info, "application"));
        }
    }

    #[test]
    fn test_statistical_rate() {
        let filter = SamplingFilter::new(SamplingConfig::new(0.5));
        let total = 10000;
        let sampled = (0..total)
            .filter(|_| filter.should_sample(LogLevel::Info, "load"))
            .count();

        let rate = sampled as f64 / total as f64;
        assert!((0.45..=0.55).contains(&rate), "rate was {}", rate);
        assert_eq!(filter.metrics().total_count(), total as u64);
    }

    #[test]
    fn test_adaptive_rate_tracking() {
        let filter = SamplingFilter::new(SamplingConfig::new(1.0).with_adaptive(1, 0.0));
        for _ in 0..100 {
            filter.should_sample(LogLevel::Debug, "hot");
        }
        assert!(filter.current_message_rate() >= 0.0);
        assert_eq!(filter.metrics().total_count(), 100);
    }
}
