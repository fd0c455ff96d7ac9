//! SQLite-backed data source.
//!
//! # Responsibility
//! - Validate one `data-sources.<name>` entry and migrate its database.
//! - Run named-parameter reads and writes, one connection per call.
//! - Emit `show-sql` / `show-time` diagnostics for every store call.
//!
//! # Invariants
//! - Connections are never shared between calls, so partition tasks running
//!   on different workers never contend for one handle.
//! - Writes commit inside an immediate transaction or not at all.

use crate::config::{DataSourceConfig, PROVIDER_SQLITE};
use crate::db::bind::expand_named;
use crate::db::{connect, open_db};
use crate::error::{ConfigError, RepoError, RepoResult};
use crate::spliterator::context::ExecContext;
use crate::spliterator::value::Arguments;
use log::{info, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// One named SQLite database.
#[derive(Debug)]
pub struct SqliteDataSource {
    name: String,
    path: PathBuf,
    show_sql: bool,
    show_time: bool,
    max_collection_size: NonZeroUsize,
}

impl SqliteDataSource {
    /// Validates `config` and brings the database schema up to date.
    ///
    /// # Errors
    /// - `ConfigError::UnsupportedProvider` for any provider other than
    ///   `sqlite`.
    /// - `ConfigError::MissingPath` / `InvalidSpliteratorSize` for incomplete
    ///   entries.
    /// - `Db` when the file cannot be opened or migrated.
    pub fn open(name: &str, config: &DataSourceConfig) -> RepoResult<Self> {
        let provider = config.provider.trim();
        if provider != PROVIDER_SQLITE {
            return Err(ConfigError::UnsupportedProvider {
                data_source: name.to_string(),
                provider: provider.to_string(),
            }
            .into());
        }
        let path = config
            .path
            .clone()
            .ok_or_else(|| ConfigError::MissingPath(name.to_string()))?;
        let max_collection_size = config.max_collection_size(name)?;

        open_db(&path)?;
        info!(
            "event=datasource_open module=repo status=ok data_source={name} provider={provider} spliterator_size={max_collection_size}"
        );

        Ok(Self {
            name: name.to_string(),
            path,
            show_sql: config.show_sql,
            show_time: config.show_time,
            max_collection_size,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Largest collection bound into one statement before splitting.
    pub fn max_collection_size(&self) -> NonZeroUsize {
        self.max_collection_size
    }

    /// Runs a read and maps every row.
    pub fn query<R, F>(
        &self,
        ctx: &ExecContext,
        sql: &str,
        arguments: &Arguments,
        mut map_row: F,
    ) -> RepoResult<Vec<R>>
    where
        F: FnMut(&Row<'_>) -> RepoResult<R>,
    {
        self.call(ctx, "query", sql, arguments, |conn, sql, values| {
            let mut stmt = conn.prepare(sql)?;
            let mut rows = stmt.query(params_from_iter(values))?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(map_row(row)?);
            }
            Ok(records)
        })
    }

    /// Runs one write statement and returns the affected row count.
    pub fn execute(&self, ctx: &ExecContext, sql: &str, arguments: &Arguments) -> RepoResult<usize> {
        self.call(ctx, "execute", sql, arguments, |conn, sql, values| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let affected = tx.execute(sql, params_from_iter(values))?;
            tx.commit()?;
            Ok(affected)
        })
    }

    /// Runs `op` inside one immediate transaction; commits when it succeeds.
    pub fn transaction<T, F>(&self, ctx: &ExecContext, op: F) -> RepoResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> RepoResult<T>,
    {
        let started_at = Instant::now();
        let result = connect(&self.path)
            .map_err(RepoError::from)
            .and_then(|mut conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let value = op(&tx)?;
                tx.commit()?;
                Ok(value)
            });
        self.log_outcome(ctx, "transaction", started_at, &result);
        result
    }

    fn call<T, F>(
        &self,
        ctx: &ExecContext,
        operation: &'static str,
        sql: &str,
        arguments: &Arguments,
        run: F,
    ) -> RepoResult<T>
    where
        F: FnOnce(&mut Connection, &str, Vec<Value>) -> RepoResult<T>,
    {
        let (expanded, values) = expand_named(sql, arguments)?;
        if self.show_sql {
            info!(
                "event=store_call module=repo status=start data_source={} op={operation} {ctx} sql=\"{}\" arguments={:?}",
                self.name,
                compact_sql(sql),
                arguments
            );
        }

        let started_at = Instant::now();
        let result = connect(&self.path)
            .map_err(RepoError::from)
            .and_then(|mut conn| run(&mut conn, &expanded, values));
        self.log_outcome(ctx, operation, started_at, &result);
        result
    }

    fn log_outcome<T>(
        &self,
        ctx: &ExecContext,
        operation: &str,
        started_at: Instant,
        result: &RepoResult<T>,
    ) {
        match result {
            Ok(_) if self.show_time => info!(
                "event=store_call module=repo status=ok data_source={} op={operation} {ctx} duration_ms={}",
                self.name,
                started_at.elapsed().as_millis()
            ),
            Ok(_) => {}
            Err(err) => warn!(
                "event=store_call module=repo status=error data_source={} op={operation} {ctx} duration_ms={} error={err}",
                self.name,
                started_at.elapsed().as_millis()
            ),
        }
    }
}

fn compact_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}
