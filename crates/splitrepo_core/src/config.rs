//! Repository runtime configuration.
//!
//! # Responsibility
//! - Deserialize the `repository` config document (JSON, kebab-case keys).
//! - Validate values before any data source or worker pool is started.
//!
//! # Invariants
//! - `spliterator-size` is strictly positive for every enabled data source.
//! - `worker-size` validation is owned by the spliterator environment so a
//!   bad value fails at setup, before tasks can be scheduled.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SPLITERATOR_SIZE: i64 = 1000;
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 30;
pub const PROVIDER_SQLITE: &str = "sqlite";

/// Top-level repository configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RepositoryConfig {
    #[serde(default)]
    pub data_sources: BTreeMap<String, DataSourceConfig>,
    #[serde(default)]
    pub query_spliterator: SpliteratorConfig,
    #[serde(default)]
    pub default_data_source: Option<String>,
}

impl RepositoryConfig {
    /// Parses a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))
    }
}

/// Settings for one named data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DataSourceConfig {
    /// Store provider. Empty disables the data source.
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Log query text and arguments for every store call.
    #[serde(default)]
    pub show_sql: bool,
    /// Log duration of every store call.
    #[serde(default)]
    pub show_time: bool,
    /// Maximum collection size bound into one query before splitting.
    #[serde(default = "default_spliterator_size")]
    pub spliterator_size: i64,
}

impl DataSourceConfig {
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            provider: PROVIDER_SQLITE.to_string(),
            path: Some(path.into()),
            show_sql: false,
            show_time: false,
            spliterator_size: DEFAULT_SPLITERATOR_SIZE,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.provider.trim().is_empty()
    }

    /// Validated split size for this data source.
    pub fn max_collection_size(&self, name: &str) -> Result<NonZeroUsize, ConfigError> {
        usize::try_from(self.spliterator_size)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| ConfigError::InvalidSpliteratorSize {
                data_source: name.to_string(),
                value: self.spliterator_size,
            })
    }
}

/// Settings for the query spliterator worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SpliteratorConfig {
    /// Requested worker count; must be positive.
    pub worker_size: i64,
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl SpliteratorConfig {
    pub fn with_worker_size(worker_size: i64) -> Self {
        Self {
            worker_size,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for SpliteratorConfig {
    fn default() -> Self {
        let hardware = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        Self::with_worker_size(i64::try_from(hardware).unwrap_or(1))
    }
}

fn default_spliterator_size() -> i64 {
    DEFAULT_SPLITERATOR_SIZE
}

fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_MS
}

#[cfg(test)]
mod tests {
    use super::{RepositoryConfig, DEFAULT_SHUTDOWN_TIMEOUT_MS, DEFAULT_SPLITERATOR_SIZE};
    use crate::error::ConfigError;

    #[test]
    fn parses_kebab_case_document_with_defaults() {
        let config = RepositoryConfig::from_json_str(
            r#"{
                "data-sources": {
                    "main": { "provider": "sqlite", "path": "/tmp/main.db", "show-sql": true },
                    "legacy": { "provider": "" }
                },
                "query-spliterator": { "worker-size": 4 },
                "default-data-source": "main"
            }"#,
        )
        .expect("config should parse");

        let main = &config.data_sources["main"];
        assert!(main.show_sql);
        assert!(!main.show_time);
        assert_eq!(main.spliterator_size, DEFAULT_SPLITERATOR_SIZE);
        assert!(!config.data_sources["legacy"].is_enabled());
        assert_eq!(config.query_spliterator.worker_size, 4);
        assert_eq!(
            config.query_spliterator.shutdown_timeout_ms,
            DEFAULT_SHUTDOWN_TIMEOUT_MS
        );
        assert_eq!(config.default_data_source.as_deref(), Some("main"));
    }

    #[test]
    fn rejects_non_positive_spliterator_size() {
        let config = RepositoryConfig::from_json_str(
            r#"{ "data-sources": { "main": { "provider": "sqlite", "spliterator-size": 0 } } }"#,
        )
        .expect("config should parse");
        let err = config.data_sources["main"]
            .max_collection_size("main")
            .expect_err("zero must be rejected");
        assert_eq!(
            err,
            ConfigError::InvalidSpliteratorSize {
                data_source: "main".to_string(),
                value: 0
            }
        );
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let err = RepositoryConfig::from_json_str("{ not json").expect_err("must fail");
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
