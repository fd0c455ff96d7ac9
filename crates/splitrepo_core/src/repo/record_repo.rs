//! Record repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and ad-hoc query APIs over the `records` table.
//! - Route collection-bound reads and deletes through the query spliterator
//!   so large id lists never exceed the data source's `spliterator-size`.
//!
//! # Invariants
//! - Write paths call `NewRecord::validate()` before SQL mutations.
//! - Read paths reject invalid persisted rows instead of masking them.
//! - `find_by_ids` returns records in ascending id order regardless of how
//!   the input was partitioned.

use crate::error::{RepoError, RepoResult};
use crate::model::record::{NewRecord, Record, RecordId};
use crate::repo::datasource::SqliteDataSource;
use crate::spliterator::builder::QuerySpliterator;
use crate::spliterator::context::ExecContext;
use crate::spliterator::env::SpliteratorEnv;
use crate::spliterator::value::{ArgValue, Arguments};
use rusqlite::{params, Row, Transaction};
use std::sync::Arc;

const RECORD_SELECT_SQL: &str = "SELECT
    id,
    name,
    category,
    created_at
FROM records";

/// Repository interface for record persistence and queries.
pub trait RecordRepository {
    fn save(&self, record: &NewRecord) -> RepoResult<RecordId>;
    /// Inserts every record in one transaction; nothing is stored on failure.
    fn saves(&self, records: &[NewRecord]) -> RepoResult<Vec<RecordId>>;
    fn find_by_id(&self, id: RecordId) -> RepoResult<Option<Record>>;
    fn find_by_ids(&self, ids: &[RecordId]) -> RepoResult<Vec<Record>>;
    fn find_all(&self) -> RepoResult<Vec<Record>>;
    fn count(&self) -> RepoResult<u64>;
    /// Runs a caller-supplied `SELECT` over the record columns.
    fn find_many(&self, query: &str, arguments: &Arguments) -> RepoResult<Vec<Record>>;
    /// First row of [`find_many`](Self::find_many), if any.
    fn find_first(&self, query: &str, arguments: &Arguments) -> RepoResult<Option<Record>>;
    /// Runs a caller-supplied write and returns affected rows.
    fn update(&self, query: &str, arguments: &Arguments) -> RepoResult<usize>;
    fn delete_by_id(&self, id: RecordId) -> RepoResult<bool>;
    fn delete_by_ids(&self, ids: &[RecordId]) -> RepoResult<usize>;
}

/// SQLite-backed record repository bound to one data source.
pub struct SqliteRecordRepository<'a> {
    data_source: Arc<SqliteDataSource>,
    env: &'a SpliteratorEnv,
    context: Option<ExecContext>,
}

impl<'a> SqliteRecordRepository<'a> {
    pub fn new(data_source: Arc<SqliteDataSource>, env: &'a SpliteratorEnv) -> Self {
        Self {
            data_source,
            env,
            context: None,
        }
    }

    /// Tags every following call with `context` instead of a fresh id.
    pub fn with_context(mut self, context: ExecContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn data_source(&self) -> &SqliteDataSource {
        &self.data_source
    }

    fn read(&self, ctx: &ExecContext, query: &str, arguments: &Arguments) -> RepoResult<Vec<Record>> {
        self.data_source.query(ctx, query, arguments, parse_record_row)
    }

    fn ctx(&self) -> ExecContext {
        self.context.clone().unwrap_or_else(ExecContext::generate)
    }

    fn split_size(&self) -> usize {
        self.data_source.max_collection_size().get()
    }
}

impl RecordRepository for SqliteRecordRepository<'_> {
    fn save(&self, record: &NewRecord) -> RepoResult<RecordId> {
        record.validate()?;
        self.data_source
            .transaction(&self.ctx(), |tx| insert_record(tx, record))
    }

    fn saves(&self, records: &[NewRecord]) -> RepoResult<Vec<RecordId>> {
        for record in records {
            record.validate()?;
        }
        if records.is_empty() {
            return Ok(Vec::new());
        }

        self.data_source.transaction(&self.ctx(), |tx| {
            records
                .iter()
                .map(|record| insert_record(tx, record))
                .collect()
        })
    }

    fn find_by_id(&self, id: RecordId) -> RepoResult<Option<Record>> {
        let mut arguments = Arguments::new();
        arguments.insert("id".to_string(), ArgValue::Integer(id));
        let records = self.read(
            &self.ctx(),
            &format!("{RECORD_SELECT_SQL} WHERE id = :id"),
            &arguments,
        )?;
        Ok(records.into_iter().next())
    }

    fn find_by_ids(&self, ids: &[RecordId]) -> RepoResult<Vec<Record>> {
        let read = |ctx: &ExecContext, query: &str, arguments: &Arguments| {
            self.read(ctx, query, arguments)
        };
        QuerySpliterator::of(self.env)
            .query(format!("{RECORD_SELECT_SQL} WHERE id IN (:ids) ORDER BY id ASC"))
            .split_by("ids", ids.iter().copied(), self.split_size())
            .context(self.ctx())
            .sort_by(|left: &Record, right: &Record| left.id.cmp(&right.id))
            .find_many(&read)
    }

    fn find_all(&self) -> RepoResult<Vec<Record>> {
        self.read(
            &self.ctx(),
            &format!("{RECORD_SELECT_SQL} ORDER BY id ASC"),
            &Arguments::new(),
        )
    }

    fn count(&self) -> RepoResult<u64> {
        let counts = self.data_source.query(
            &self.ctx(),
            "SELECT COUNT(*) FROM records",
            &Arguments::new(),
            |row| Ok(row.get::<_, i64>(0)?),
        )?;
        let count = counts.into_iter().next().unwrap_or(0);
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative record count `{count}`")))
    }

    fn find_many(&self, query: &str, arguments: &Arguments) -> RepoResult<Vec<Record>> {
        self.read(&self.ctx(), query, arguments)
    }

    fn find_first(&self, query: &str, arguments: &Arguments) -> RepoResult<Option<Record>> {
        Ok(self.find_many(query, arguments)?.into_iter().next())
    }

    fn update(&self, query: &str, arguments: &Arguments) -> RepoResult<usize> {
        self.data_source
            .execute(&self.ctx(), query, arguments)
    }

    fn delete_by_id(&self, id: RecordId) -> RepoResult<bool> {
        let mut arguments = Arguments::new();
        arguments.insert("id".to_string(), ArgValue::Integer(id));
        let affected = self.data_source.execute(
            &self.ctx(),
            "DELETE FROM records WHERE id = :id",
            &arguments,
        )?;
        Ok(affected > 0)
    }

    fn delete_by_ids(&self, ids: &[RecordId]) -> RepoResult<usize> {
        let write = |ctx: &ExecContext, query: &str, arguments: &Arguments| {
            self.data_source.execute(ctx, query, arguments)
        };
        QuerySpliterator::for_update(self.env)
            .query("DELETE FROM records WHERE id IN (:ids)")
            .split_by("ids", ids.iter().copied(), self.split_size())
            .context(self.ctx())
            .execute_update(&write)
    }
}

fn insert_record(tx: &Transaction<'_>, record: &NewRecord) -> RepoResult<RecordId> {
    tx.execute(
        "INSERT INTO records (id, name, category) VALUES (?1, ?2, ?3);",
        params![record.id, record.name.as_str(), record.category.as_deref()],
    )?;
    Ok(tx.last_insert_rowid())
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<Record> {
    let record = Record {
        id: row.get("id")?,
        name: row.get("name")?,
        category: row.get("category")?,
        created_at: row.get("created_at")?,
    };
    record.validate().map_err(|err| {
        RepoError::InvalidData(format!("record {} failed validation: {err}", record.id))
    })?;
    Ok(record)
}
