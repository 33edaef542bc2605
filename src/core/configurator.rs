//! Wiring a repository from outside
//!
//! A [`Configurator`] receives a fully built repository and attaches levels,
//! additivity and sinks to it. Two come with the crate:
//!
//! - [`BasicConfigurator`]: one console sink on the root logger
//! - [`JsonConfigurator`]: logger settings read from JSON, sinks looked up by
//!   name in a [`SinkRegistry`] of already built sinks
//!
//! ```
//! use rust_logger_hierarchy::appenders::MemoryAppender;
//! use rust_logger_hierarchy::core::{
//!     Configurator, JsonConfigurator, LogLevel, Repository, RepositoryConfig, SinkBuilder,
//!     SinkRegistry,
//! };
//!
//! let config = RepositoryConfig::from_json_str(r#"{
//!     "threshold": "debug",
//!     "root": { "level": "warn", "sinks": ["memory"] },
//!     "loggers": { "app.db": { "level": "trace", "additive": true } }
//! }"#).unwrap();
//!
//! let mut registry = SinkRegistry::new();
//! registry.register(SinkBuilder::new("memory", MemoryAppender::new()).build().unwrap());
//!
//! let repo = Repository::new();
//! JsonConfigurator::new(config, registry).configure(&repo).unwrap();
//! assert_eq!(repo.get_logger("app.db").level(), Some(LogLevel::Trace));
//! assert_eq!(repo.threshold(), LogLevel::Debug);
//! ```

use super::error::{LoggerError, Result};
use super::layout::TextLayout;
use super::log_level::LogLevel;
use super::logger::Logger;
use super::repository::Repository;
use super::sink::{SinkBuilder, SinkRef};
use crate::appenders::ConsoleAppender;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

pub trait Configurator {
    fn configure(&self, repository: &Repository) -> Result<()>;
}

/// Root logger at its default level writing to stdout
#[derive(Debug, Default)]
pub struct BasicConfigurator;

impl Configurator for BasicConfigurator {
    fn configure(&self, repository: &Repository) -> Result<()> {
        let sink = SinkBuilder::new(
            "console",
            ConsoleAppender::new().with_layout(TextLayout::new()),
        )
        .build()?;
        repository.root_logger().add_sink(sink);
        Ok(())
    }
}

/// Named sinks available to a configuration
#[derive(Debug, Default)]
pub struct SinkRegistry {
    sinks: HashMap<String, SinkRef>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the sink's own name, replacing a previous entry.
    pub fn register(&mut self, sink: SinkRef) -> Option<SinkRef> {
        self.sinks.insert(sink.name().to_string(), sink)
    }

    pub fn get(&self, name: &str) -> Option<&SinkRef> {
        self.sinks.get(name)
    }

    pub fn sinks(&self) -> impl Iterator<Item = &SinkRef> {
        self.sinks.values()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggerConfig {
    /// Level name; `"inherit"` or absent leaves the level unset
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub additive: Option<bool>,
    #[serde(default)]
    pub sinks: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Reset the repository before applying
    #[serde(default)]
    pub reset: bool,
    #[serde(default)]
    pub threshold: Option<String>,
    #[serde(default)]
    pub root: Option<LoggerConfig>,
    #[serde(default)]
    pub loggers: BTreeMap<String, LoggerConfig>,
}

fn parse_level(component: &str, value: &str) -> Result<Option<LogLevel>> {
    if value.eq_ignore_ascii_case("inherit") || value.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    value
        .parse::<LogLevel>()
        .map(Some)
        .map_err(|e| LoggerError::config(component, e))
}

impl RepositoryConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            LoggerError::io_operation("reading configuration", path.display().to_string(), e)
        })?;
        Self::from_json_str(&text)
    }

    /// Check every level and sink reference without touching a repository.
    pub fn validate(&self, registry: &SinkRegistry) -> Result<()> {
        if let Some(threshold) = &self.threshold {
            parse_level("threshold", threshold)?;
        }
        let entries = self
            .root
            .iter()
            .map(|c| ("root", c))
            .chain(self.loggers.iter().map(|(name, c)| (name.as_str(), c)));
        for (name, config) in entries {
            if let Some(level) = &config.level {
                parse_level(name, level)?;
            }
            for sink in &config.sinks {
                match registry.get(sink) {
                    None => {
                        return Err(LoggerError::config(
                            name,
                            format!("unknown sink [{}]", sink),
                        ))
                    }
                    Some(registered) if registered.is_closed() => {
                        return Err(LoggerError::config(
                            name,
                            format!("sink [{}] is already closed", sink),
                        ))
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }

    fn apply_logger(logger: &Logger, config: &LoggerConfig, registry: &SinkRegistry) -> Result<()> {
        if let Some(level) = &config.level {
            logger.set_level(parse_level(logger.name(), level)?);
        }
        if let Some(additive) = config.additive {
            logger.set_additive(additive);
        }
        for name in &config.sinks {
            let sink = registry
                .get(name)
                .ok_or_else(|| LoggerError::config(logger.name(), format!("unknown sink [{}]", name)))?;
            logger.add_sink(sink.clone());
        }
        Ok(())
    }

    fn detach_registered(repository: &Repository, registry: &SinkRegistry) {
        let mut loggers = vec![repository.root_logger()];
        loggers.extend(repository.current_loggers());
        for logger in &loggers {
            for sink in registry.sinks() {
                logger.remove_sink(sink);
            }
        }
    }

    /// Validate, then wire the repository. Nothing is changed when
    /// validation fails.
    ///
    /// With `reset` set, sinks from `registry` are detached before the reset
    /// and survive it open, so the same registry can be applied again.
    pub fn apply(&self, repository: &Repository, registry: &SinkRegistry) -> Result<()> {
        self.validate(registry)?;
        if self.reset {
            // Registered sinks outlive a reload; only the rest are closed
            Self::detach_registered(repository, registry);
            repository.reset_configuration();
        }
        if let Some(threshold) = &self.threshold {
            if let Some(level) = parse_level("threshold", threshold)? {
                repository.set_threshold(level);
            }
        }
        if let Some(root) = &self.root {
            Self::apply_logger(&repository.root_logger(), root, registry)?;
        }
        for (name, config) in &self.loggers {
            Self::apply_logger(&repository.get_logger(name), config, registry)?;
        }
        Ok(())
    }
}

/// Applies a [`RepositoryConfig`] with a fixed sink registry
#[derive(Debug)]
pub struct JsonConfigurator {
    config: RepositoryConfig,
    registry: SinkRegistry,
}

impl JsonConfigurator {
    pub fn new(config: RepositoryConfig, registry: SinkRegistry) -> Self {
        Self { config, registry }
    }
}

impl Configurator for JsonConfigurator {
    fn configure(&self, repository: &Repository) -> Result<()> {
        self.config.apply(repository, &self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appenders::MemoryAppender;
    use std::io::Write;

    fn registry_with(name: &str) -> SinkRegistry {
        let mut registry = SinkRegistry::new();
        registry.register(SinkBuilder::new(name, MemoryAppender::new()).build().unwrap());
        registry
    }

    #[test]
    fn test_basic_configurator_attaches_console() {
        let repo = Repository::new();
        BasicConfigurator.configure(&repo).unwrap();
        assert!(repo.root_logger().sink("console").is_some());
    }

    #[test]
    fn test_unknown_sink_is_configuration_error() {
        let config = RepositoryConfig::from_json_str(
            r#"{ "loggers": { "a": { "level": "info", "sinks": ["missing"] } } }"#,
        )
        .unwrap();
        let repo = Repository::new();
        let err = config.apply(&repo, &SinkRegistry::new()).unwrap_err();
        assert!(err.is_configuration());
        assert!(repo.exists("a").is_none());
    }

    #[test]
    fn test_bad_level_is_rejected() {
        let config =
            RepositoryConfig::from_json_str(r#"{ "root": { "level": "loud" } }"#).unwrap();
        assert!(config.validate(&SinkRegistry::new()).is_err());
    }

    #[test]
    fn test_inherit_and_additivity() {
        let config = RepositoryConfig::from_json_str(
            r#"{ "loggers": { "svc": { "level": "inherit", "additive": false, "sinks": ["m"] } } }"#,
        )
        .unwrap();
        let repo = Repository::new();
        repo.get_logger("svc").set_level(Some(LogLevel::Error));
        config.apply(&repo, &registry_with("m")).unwrap();

        let svc = repo.get_logger("svc");
        assert_eq!(svc.level(), None);
        assert!(!svc.additive());
        assert!(svc.sink("m").is_some());
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "reset": true, "threshold": "warn" }}"#).unwrap();
        let config = RepositoryConfig::from_path(file.path()).unwrap();
        assert!(config.reset);

        let repo = Repository::new();
        config.apply(&repo, &SinkRegistry::new()).unwrap();
        assert_eq!(repo.threshold(), LogLevel::Warn);
    }

    #[test]
    fn test_reload_keeps_registered_sinks_open() {
        let memory = MemoryAppender::new();
        let events = memory.events_handle();
        let mut registry = SinkRegistry::new();
        registry.register(SinkBuilder::new("memory", memory).build().unwrap());
        let (other, other_events) = {
            let memory = MemoryAppender::new();
            let events = memory.events_handle();
            (SinkBuilder::new("other", memory).build().unwrap(), events)
        };

        let config =
            RepositoryConfig::from_json_str(r#"{ "reset": true, "root": { "sinks": ["memory"] } }"#)
                .unwrap();
        let repo = Repository::new();
        config.apply(&repo, &registry).unwrap();
        repo.get_logger("svc").add_sink(other.clone());
        repo.get_logger("svc").info("before reload");

        config.apply(&repo, &registry).unwrap();
        repo.get_logger("svc").info("after reload");

        let attached = repo.root_logger().sink("memory").unwrap();
        assert!(!attached.is_closed());
        assert_eq!(events.messages(), vec!["before reload", "after reload"]);
        assert_eq!(events.close_count(), 0);
        assert!(other.is_closed());
        assert_eq!(other_events.messages(), vec!["before reload"]);
    }

    #[test]
    fn test_closed_registered_sink_is_rejected() {
        let registry = registry_with("m");
        registry.get("m").unwrap().close();
        let config =
            RepositoryConfig::from_json_str(r#"{ "root": { "sinks": ["m"] } }"#).unwrap();
        let err = config.validate(&registry).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(RepositoryConfig::from_json_str(r#"{ "appenders": [] }"#).is_err());
    }
}
