//! Repository runtime: data sources plus the shared spliterator environment.
//!
//! # Responsibility
//! - Open and register every enabled data source from configuration.
//! - Start the spliterator environment and close it on shutdown.
//! - Hand out record repositories bound to both.
//!
//! # Invariants
//! - No repository is handed out before every data source is migrated and
//!   the environment is running.
//! - Disabled data sources (empty provider) are skipped, never opened.

use crate::config::RepositoryConfig;
use crate::error::{RepoError, RepoResult};
use crate::repo::datasource::SqliteDataSource;
use crate::repo::record_repo::SqliteRecordRepository;
use crate::repo::registry::DataSourceRegistry;
use crate::spliterator::env::SpliteratorEnv;
use log::{error, info};
use std::time::Instant;

/// Started repository layer owned by the hosting application.
pub struct RepositoryRuntime {
    env: SpliteratorEnv,
    registry: DataSourceRegistry,
}

impl RepositoryRuntime {
    /// Opens data sources and sets up the worker pool.
    ///
    /// # Errors
    /// - `Config` for invalid data source or `query-spliterator` settings.
    /// - `Registry` / `DataSourceNotFound` for bad names or an unknown
    ///   `default-data-source`.
    /// - `Db` when a database cannot be opened or migrated.
    pub fn start(config: &RepositoryConfig) -> RepoResult<Self> {
        let started_at = Instant::now();
        info!(
            "event=runtime_start module=runtime status=start data_sources={}",
            config.data_sources.len()
        );

        match Self::build(config) {
            Ok(runtime) => {
                info!(
                    "event=runtime_start module=runtime status=ok data_sources={} duration_ms={}",
                    runtime.registry.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(runtime)
            }
            Err(err) => {
                error!(
                    "event=runtime_start module=runtime status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn build(config: &RepositoryConfig) -> RepoResult<Self> {
        let mut registry = DataSourceRegistry::new();
        for (name, data_source) in &config.data_sources {
            if !data_source.is_enabled() {
                info!(
                    "event=datasource_open module=repo status=skipped reason=empty_provider data_source={name}"
                );
                continue;
            }
            registry.register(SqliteDataSource::open(name, data_source)?)?;
        }
        if let Some(name) = &config.default_data_source {
            registry.select_default(name)?;
        }

        let env = SpliteratorEnv::started(&config.query_spliterator)?;
        Ok(Self { env, registry })
    }

    pub fn env(&self) -> &SpliteratorEnv {
        &self.env
    }

    pub fn registry(&self) -> &DataSourceRegistry {
        &self.registry
    }

    /// Record repository over the named data source.
    pub fn repository(&self, name: &str) -> RepoResult<SqliteRecordRepository<'_>> {
        let data_source = self.registry.require(name)?;
        Ok(SqliteRecordRepository::new(data_source, &self.env))
    }

    /// Record repository over the default data source.
    pub fn default_repository(&self) -> RepoResult<SqliteRecordRepository<'_>> {
        let data_source = self
            .registry
            .default_source()
            .ok_or_else(|| RepoError::DataSourceNotFound("<default>".to_string()))?;
        Ok(SqliteRecordRepository::new(data_source, &self.env))
    }

    /// Closes the spliterator environment. Data sources hold no open handles.
    pub fn shutdown(&self) {
        self.env.close();
        info!("event=runtime_shutdown module=runtime status=ok");
    }
}
