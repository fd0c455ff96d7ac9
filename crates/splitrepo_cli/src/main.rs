//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `splitrepo_core` linkage.
//! - `demo` seeds a throwaway database and runs one split read and one split
//!   delete through the repository runtime.

use log::info;
use splitrepo_core::{
    default_log_level, init_logging, DataSourceConfig, NewRecord, RecordRepository,
    RepoError, RepositoryConfig, RepositoryRuntime, SpliteratorConfig,
};
use std::process::ExitCode;

const DEMO_RECORDS: i64 = 250;
const DEMO_SPLIT_SIZE: i64 = 100;

fn main() -> ExitCode {
    println!("splitrepo_core ping={}", splitrepo_core::ping());
    println!("splitrepo_core version={}", splitrepo_core::core_version());

    if std::env::args().nth(1).as_deref() != Some("demo") {
        return ExitCode::SUCCESS;
    }

    match run_demo() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("demo failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_demo() -> Result<(), Box<dyn std::error::Error>> {
    let workdir = tempfile::tempdir()?;
    let log_dir = workdir.path().join("logs");
    init_logging(default_log_level(), &log_dir.to_string_lossy())?;

    let mut source = DataSourceConfig::sqlite(workdir.path().join("demo.db"));
    source.spliterator_size = DEMO_SPLIT_SIZE;
    source.show_time = true;
    let mut config = RepositoryConfig::default();
    config.data_sources.insert("main".to_string(), source);
    config.query_spliterator = SpliteratorConfig::default();

    let runtime = RepositoryRuntime::start(&config)?;
    let outcome = exercise(&runtime);
    runtime.shutdown();
    outcome?;
    Ok(())
}

fn exercise(runtime: &RepositoryRuntime) -> Result<(), RepoError> {
    let repo = runtime.default_repository()?;
    let records: Vec<NewRecord> = (1..=DEMO_RECORDS)
        .map(|id| NewRecord::new(format!("record-{id}")).with_id(id))
        .collect();
    repo.saves(&records)?;

    let ids: Vec<i64> = (1..=DEMO_RECORDS).collect();
    let found = repo.find_by_ids(&ids)?;
    let deleted = repo.delete_by_ids(&ids[..ids.len() / 2])?;
    let remaining = repo.count()?;

    info!(
        "event=cli_demo module=cli status=ok found={} deleted={deleted} remaining={remaining}",
        found.len()
    );
    println!("splitrepo_demo found={} deleted={deleted} remaining={remaining}", found.len());
    Ok(())
}
