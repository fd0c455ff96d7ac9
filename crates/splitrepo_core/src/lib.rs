//! Repository layer with a bounded parallel query spliterator.
//! Large collection-bound reads and deletes are split into partitions, run on
//! a shared worker pool and merged back deterministically.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod runtime;
pub mod spliterator;

pub use config::{DataSourceConfig, RepositoryConfig, SpliteratorConfig};
pub use error::{ConfigError, RepoError, RepoResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::record::{NewRecord, Record, RecordId, RecordValidationError};
pub use repo::datasource::SqliteDataSource;
pub use repo::record_repo::{RecordRepository, SqliteRecordRepository};
pub use repo::registry::{DataSourceRegistry, DataSourceRegistryError};
pub use runtime::RepositoryRuntime;
pub use spliterator::{
    ArgValue, Arguments, EnvStatus, ExecContext, FindMany, QuerySpliterator, SpliteratorEnv,
    UpdateMany,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
