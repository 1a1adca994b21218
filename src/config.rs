//! Configuration types.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Component name stamped on lifecycle events.
    pub component: String,
    /// Path of the libSQL job store.
    pub db_path: PathBuf,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Buffer size of the lifecycle event channel.
    pub event_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            component: "AnalyticsWorker".to_string(),
            db_path: PathBuf::from("./data/analytics-worker.db"),
            log_filter: "info".to_string(),
            event_capacity: 256,
        }
    }
}

impl WorkerConfig {
    /// Build a config from `ANALYTICS_WORKER_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let event_capacity = match lookup("ANALYTICS_WORKER_EVENT_CAPACITY") {
            Some(raw) => parse_capacity(&raw)?,
            None => defaults.event_capacity,
        };

        Ok(Self {
            component: lookup("ANALYTICS_WORKER_COMPONENT").unwrap_or(defaults.component),
            db_path: lookup("ANALYTICS_WORKER_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            log_filter: lookup("ANALYTICS_WORKER_LOG").unwrap_or(defaults.log_filter),
            event_capacity,
        })
    }
}

fn parse_capacity(raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            key: "ANALYTICS_WORKER_EVENT_CAPACITY".into(),
            message: "must be greater than zero".into(),
        }),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::InvalidValue {
            key: "ANALYTICS_WORKER_EVENT_CAPACITY".into(),
            message: e.to_string(),
        }),
    }
}
