//! Error taxonomy shared by the repository layer and the query spliterator.
//!
//! # Responsibility
//! - Give every failure a typed variant callers can match on.
//! - Keep store failures unchanged when they cross the fan-in step.
//!
//! # Invariants
//! - A failed partition surfaces exactly as a non-partitioned call would.
//! - Configuration problems are reported before any task is scheduled.

use crate::db::DbError;
use crate::model::record::RecordValidationError;
use crate::repo::registry::DataSourceRegistryError;
use crate::spliterator::env::MAX_WORKER_SIZE;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Invalid configuration detected at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidWorkerSize(i64),
    InvalidSpliteratorSize { data_source: String, value: i64 },
    UnsupportedProvider { data_source: String, provider: String },
    MissingPath(String),
    Parse(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidWorkerSize(value) => {
                write!(
                    f,
                    "worker-size must be between 1 and {MAX_WORKER_SIZE}, got {value}"
                )
            }
            Self::InvalidSpliteratorSize { data_source, value } => write!(
                f,
                "spliterator-size of data source `{data_source}` must be larger than zero, got {value}"
            ),
            Self::UnsupportedProvider {
                data_source,
                provider,
            } => write!(
                f,
                "data source `{data_source}` uses unsupported provider `{provider}`"
            ),
            Self::MissingPath(data_source) => {
                write!(f, "data source `{data_source}` has no path")
            }
            Self::Parse(message) => write!(f, "invalid repository config: {message}"),
        }
    }
}

impl Error for ConfigError {}

/// Repository and spliterator error.
#[derive(Debug)]
pub enum RepoError {
    Config(ConfigError),
    Db(DbError),
    Validation(RecordValidationError),
    Registry(DataSourceRegistryError),
    NotInitialized,
    PoolUnavailable(String),
    InvalidRequest(String),
    InvalidData(String),
    DataSourceNotFound(String),
    TaskPanicked { partition: usize, message: String },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Registry(err) => write!(f, "{err}"),
            Self::NotInitialized => write!(f, "query spliterator environment not initialized"),
            Self::PoolUnavailable(message) => write!(f, "worker pool unavailable: {message}"),
            Self::InvalidRequest(message) => write!(f, "invalid request: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::DataSourceNotFound(name) => write!(f, "data source not found: {name}"),
            Self::TaskPanicked { partition, message } => {
                write!(f, "partition {partition} panicked: {message}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Registry(err) => Some(err),
            Self::NotInitialized
            | Self::PoolUnavailable(_)
            | Self::InvalidRequest(_)
            | Self::InvalidData(_)
            | Self::DataSourceNotFound(_)
            | Self::TaskPanicked { .. } => None,
        }
    }
}

impl From<ConfigError> for RepoError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<RecordValidationError> for RepoError {
    fn from(value: RecordValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DataSourceRegistryError> for RepoError {
    fn from(value: DataSourceRegistryError) -> Self {
        match value {
            DataSourceRegistryError::NotFound(name) => Self::DataSourceNotFound(name),
            other => Self::Registry(other),
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, RepoError};
    use crate::repo::registry::DataSourceRegistryError;
    use std::error::Error;

    #[test]
    fn config_error_is_exposed_as_source() {
        let err = RepoError::from(ConfigError::InvalidWorkerSize(0));
        assert!(err.to_string().contains("worker-size"));
        assert!(err.source().is_some());
    }

    #[test]
    fn task_panic_names_partition() {
        let err = RepoError::TaskPanicked {
            partition: 2,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "partition 2 panicked: boom");
    }

    #[test]
    fn registry_lookup_failure_maps_to_data_source_not_found() {
        let err = RepoError::from(DataSourceRegistryError::NotFound("main".to_string()));
        assert!(matches!(err, RepoError::DataSourceNotFound(name) if name == "main"));
    }
}
