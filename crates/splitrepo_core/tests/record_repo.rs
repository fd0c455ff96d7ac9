use splitrepo_core::{
    ArgValue, Arguments, DataSourceConfig, ExecContext, NewRecord, RecordRepository, RepoError,
    SpliteratorConfig, SpliteratorEnv, SqliteDataSource, SqliteRecordRepository,
};
use std::sync::Arc;
use tempfile::TempDir;

fn setup(spliterator_size: i64) -> (TempDir, Arc<SqliteDataSource>, SpliteratorEnv) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = DataSourceConfig::sqlite(dir.path().join("records.db"));
    config.spliterator_size = spliterator_size;
    let source = SqliteDataSource::open("main", &config).unwrap();
    let env = SpliteratorEnv::started(&SpliteratorConfig::with_worker_size(4)).unwrap();
    (dir, Arc::new(source), env)
}

fn seed(repo: &SqliteRecordRepository<'_>, ids: impl IntoIterator<Item = i64>) {
    let records: Vec<NewRecord> = ids
        .into_iter()
        .map(|id| {
            NewRecord::new(format!("record-{id}"))
                .with_id(id)
                .with_category(if id % 2 == 0 { "even" } else { "odd" })
        })
        .collect();
    repo.saves(&records).unwrap();
}

fn args(entries: &[(&str, ArgValue)]) -> Arguments {
    entries
        .iter()
        .map(|(key, value)| ((*key).to_string(), value.clone()))
        .collect()
}

#[test]
fn save_and_find_by_id_roundtrip() {
    let (_dir, source, env) = setup(100);
    let repo = SqliteRecordRepository::new(source, &env);

    let id = repo
        .save(&NewRecord::new("first").with_category("alpha"))
        .unwrap();
    let loaded = repo.find_by_id(id).unwrap().unwrap();

    assert_eq!(loaded.id, id);
    assert_eq!(loaded.name, "first");
    assert_eq!(loaded.category.as_deref(), Some("alpha"));
    assert!(loaded.created_at > 0);
    assert!(repo.find_by_id(id + 1).unwrap().is_none());
}

#[test]
fn save_rejects_invalid_record_before_sql() {
    let (_dir, source, env) = setup(100);
    let repo = SqliteRecordRepository::new(source, &env);

    let err = repo.save(&NewRecord::new("   ")).unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
    assert_eq!(repo.count().unwrap(), 0);
}

#[test]
fn saves_is_all_or_nothing() {
    let (_dir, source, env) = setup(100);
    let repo = SqliteRecordRepository::new(source, &env);
    repo.save(&NewRecord::new("existing").with_id(2)).unwrap();

    let err = repo
        .saves(&[
            NewRecord::new("one").with_id(1),
            NewRecord::new("duplicate").with_id(2),
        ])
        .unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));
    assert_eq!(repo.count().unwrap(), 1);
    assert!(repo.find_by_id(1).unwrap().is_none());
}

#[test]
fn find_by_ids_splits_and_returns_ascending_records() {
    let (_dir, source, env) = setup(100);
    let repo = SqliteRecordRepository::new(source, &env);
    seed(&repo, 1..=250);

    let mut ids: Vec<i64> = (1..=250).collect();
    ids.reverse();
    let records = repo.find_by_ids(&ids).unwrap();

    assert_eq!(records.len(), 250);
    let loaded: Vec<i64> = records.iter().map(|record| record.id).collect();
    assert_eq!(loaded, (1..=250).collect::<Vec<_>>());
}

#[test]
fn find_by_ids_ignores_missing_ids_and_handles_empty_input() {
    let (_dir, source, env) = setup(3);
    let repo = SqliteRecordRepository::new(source, &env);
    seed(&repo, [1, 2, 3, 10]);

    let records = repo.find_by_ids(&[10, 11, 12, 1, 99]).unwrap();
    let loaded: Vec<i64> = records.iter().map(|record| record.id).collect();
    assert_eq!(loaded, vec![1, 10]);

    assert!(repo.find_by_ids(&[]).unwrap().is_empty());
}

#[test]
fn delete_by_ids_sums_affected_rows_across_partitions() {
    let (_dir, source, env) = setup(100);
    let repo = SqliteRecordRepository::new(source, &env);
    seed(&repo, 1..=300);

    let doomed: Vec<i64> = (1..=250).collect();
    assert_eq!(repo.delete_by_ids(&doomed).unwrap(), 250);
    assert_eq!(repo.count().unwrap(), 50);
    assert_eq!(repo.delete_by_ids(&doomed).unwrap(), 0);
    assert_eq!(repo.delete_by_ids(&[]).unwrap(), 0);
}

#[test]
fn delete_by_id_reports_whether_a_row_was_removed() {
    let (_dir, source, env) = setup(100);
    let repo = SqliteRecordRepository::new(source, &env);
    seed(&repo, [7]);

    assert!(repo.delete_by_id(7).unwrap());
    assert!(!repo.delete_by_id(7).unwrap());
}

#[test]
fn find_many_update_and_find_first_bind_named_arguments() {
    let (_dir, source, env) = setup(100);
    let repo = SqliteRecordRepository::new(source, &env);
    seed(&repo, 1..=10);

    let query = "SELECT id, name, category, created_at
                 FROM records
                 WHERE category = :category
                 ORDER BY id ASC";
    let odd = repo
        .find_many(query, &args(&[("category", ArgValue::from("odd"))]))
        .unwrap();
    assert_eq!(odd.len(), 5);
    assert!(odd.iter().all(|record| record.id % 2 == 1));

    let renamed = repo
        .update(
            "UPDATE records SET category = :to WHERE category = :from",
            &args(&[
                ("from", ArgValue::from("odd")),
                ("to", ArgValue::from("prime-ish")),
            ]),
        )
        .unwrap();
    assert_eq!(renamed, 5);

    let first = repo
        .find_first(query, &args(&[("category", ArgValue::from("prime-ish"))]))
        .unwrap()
        .unwrap();
    assert_eq!(first.id, 1);
    assert!(repo
        .find_first(query, &args(&[("category", ArgValue::from("odd"))]))
        .unwrap()
        .is_none());
}

#[test]
fn find_all_and_count_cover_every_record() {
    let (_dir, source, env) = setup(100);
    let repo = SqliteRecordRepository::new(source, &env);
    seed(&repo, [5, 3, 9]);

    let ids: Vec<i64> = repo.find_all().unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![3, 5, 9]);
    assert_eq!(repo.count().unwrap(), 3);
}

#[test]
fn unbound_argument_is_invalid_request() {
    let (_dir, source, env) = setup(100);
    let repo = SqliteRecordRepository::new(source, &env);

    let err = repo
        .find_many(
            "SELECT id, name, category, created_at FROM records WHERE id = :id",
            &Arguments::new(),
        )
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidRequest(_)));
}

#[test]
fn split_operations_fail_once_environment_is_closed() {
    let (_dir, source, env) = setup(2);
    let repo = SqliteRecordRepository::new(source, &env).with_context(ExecContext::new("closed"));
    seed(&repo, 1..=5);
    env.close();

    let err = repo.find_by_ids(&[1, 2, 3, 4, 5]).unwrap_err();
    assert!(matches!(err, RepoError::NotInitialized));
    // A single partition never needs the pool.
    assert_eq!(repo.find_by_ids(&[1, 2]).unwrap().len(), 2);
}
