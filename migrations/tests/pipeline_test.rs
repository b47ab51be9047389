//! Clone-test-apply pipeline over file-backed SQLite databases

#![cfg(feature = "rusqlite")]

mod common;

use common::{FailingAdapter, write_migration_file};
use momentum_migrations::adapters::RusqliteAdapter;
use momentum_migrations::{
    CloneTestApplyOptions, DatabaseAdapter, MigrationSet, MigrationTracker, PipelinePhase,
    clone_test_apply,
};
use std::path::Path;

fn file_db(dir: &Path) -> RusqliteAdapter {
    RusqliteAdapter::open(dir.join("app.db")).unwrap()
}

fn clone_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("_mig_clone_"))
        .collect()
}

fn good_set(dir: &Path) -> MigrationSet {
    let migrations = dir.join("migrations");
    write_migration_file(
        &migrations,
        "20240101000000_posts",
        "CREATE TABLE \"posts\" (\"id\" TEXT PRIMARY KEY);",
        "DROP TABLE \"posts\";",
    );
    MigrationSet::from_dir(&migrations).unwrap()
}

#[tokio::test]
async fn test_complete_run_applies_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(dir.path());
    let set = good_set(dir.path());

    let result = clone_test_apply(&db, &set, &CloneTestApplyOptions::default()).await;

    assert_eq!(result.phase, PipelinePhase::Complete);
    assert!(result.clone_cleaned_up);
    assert!(result.error.is_none());
    assert_eq!(result.clone_result.as_ref().unwrap().success_count, 1);
    assert_eq!(result.apply_result.as_ref().unwrap().success_count, 1);
    assert!(clone_files(dir.path()).is_empty(), "clone file removed");

    let tracker = MigrationTracker::new(&db);
    assert_eq!(tracker.applied_migrations().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_test_only_skips_the_real_apply() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(dir.path());
    let set = good_set(dir.path());

    let result = clone_test_apply(
        &db,
        &set,
        &CloneTestApplyOptions {
            test_only: true,
            run_options: Default::default(),
        },
    )
    .await;

    assert_eq!(result.phase, PipelinePhase::Skipped);
    assert!(result.clone_cleaned_up);
    assert!(result.apply_result.is_none());

    // Nothing touched the real database
    let tracker = MigrationTracker::new(&db);
    assert!(tracker.applied_migrations().await.unwrap().is_empty());
    let rows = db
        .query_raw(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'posts'",
            &[],
        )
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_failing_migration_stops_at_test_phase() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(dir.path());
    let migrations = dir.path().join("migrations");
    write_migration_file(
        &migrations,
        "20240101000000_broken",
        "CREATE TABLE not valid sql;",
        "SELECT 1;",
    );
    let set = MigrationSet::from_dir(&migrations).unwrap();

    let result = clone_test_apply(&db, &set, &CloneTestApplyOptions::default()).await;

    assert_eq!(result.phase, PipelinePhase::Test);
    assert!(result.clone_cleaned_up, "clone dropped on the failure path too");
    assert!(result.error.is_some());
    assert!(result.apply_result.is_none());
    assert!(clone_files(dir.path()).is_empty());

    // The real database was never migrated
    let tracker = MigrationTracker::new(&db);
    assert!(tracker.applied_migrations().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_clone_failure_reports_clone_phase() {
    // In-memory databases cannot clone at all
    let db = RusqliteAdapter::open_in_memory().unwrap();
    let set = MigrationSet::new();

    let result = clone_test_apply(&db, &set, &CloneTestApplyOptions::default()).await;
    assert_eq!(result.phase, PipelinePhase::Clone);
    assert!(!result.clone_cleaned_up, "nothing was created, nothing to clean");
    assert!(result.error.is_some());
}

/// S6: an errorCode-carrying failure maps through the SQLSTATE table,
/// independent of the message text
#[tokio::test]
async fn test_sqlstate_driven_suggestion() {
    let dir = tempfile::tempdir().unwrap();
    let migrations = dir.path().join("migrations");
    write_migration_file(
        &migrations,
        "20240101000000_unique_slugs",
        "CREATE UNIQUE INDEX \"idx_posts_slug\" ON \"posts\" (\"slug\");",
        "DROP INDEX \"idx_posts_slug\";",
    );
    let set = MigrationSet::from_dir(&migrations).unwrap();

    let inner = file_db(dir.path());
    let db = FailingAdapter::new(
        inner,
        "CREATE UNIQUE INDEX",
        "some opaque driver message",
        Some("23505"),
    );

    let result = clone_test_apply(&db, &set, &CloneTestApplyOptions::default()).await;

    assert_eq!(result.phase, PipelinePhase::Test);
    assert_eq!(result.suggestions.len(), 1);
    assert!(result.suggestions[0].contains("dedup"));
    assert!(result.clone_cleaned_up);
}
