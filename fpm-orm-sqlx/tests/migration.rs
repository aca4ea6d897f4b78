#![cfg(all(feature = "sqlite", not(feature = "postgres")))]

mod common;

use std::path::Path;

use common::memory_setting;
use fpm_orm_data::DataError;
use fpm_orm_sqlx::{DbSetting, Engine};

fn write(dir: &Path, name: &str, sql: &str) {
    std::fs::write(dir.join(name), sql).unwrap();
}

async fn engine_for(dir: &Path) -> Engine {
    let setting = DbSetting {
        migrations_dir: dir.to_path_buf(),
        ..memory_setting()
    };
    common::connect(&setting).await
}

async fn table_exists(engine: &Engine, table: &str) -> bool {
    let sql = format!("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '{table}'");
    let found: Option<(i64,)> = engine.raw(&sql).await.unwrap();
    found == Some((1,))
}

#[tokio::test]
async fn test_applies_pending_scripts_once() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "V1__create_things.sql",
        "CREATE TABLE things (id INTEGER PRIMARY KEY, label TEXT);",
    );
    write(
        dir.path(),
        "V2__seed_things.sql",
        "INSERT INTO things (label) VALUES ('a'); INSERT INTO things (label) VALUES ('b');",
    );
    write(dir.path(), "README.md", "not a migration");

    let engine = engine_for(dir.path()).await;
    assert_eq!(engine.auto_migrate(&[]).await.unwrap(), 2);

    let history = engine.migration_history().await.unwrap();
    let scripts: Vec<_> = history.iter().map(|r| r.script.as_str()).collect();
    assert_eq!(scripts, vec!["V1__create_things.sql", "V2__seed_things.sql"]);
    assert_eq!(history[0].version, "V1");
    assert_eq!(history[0].description, "create_things");
    assert!(history.iter().all(|r| r.success));

    let labels: Option<(i64,)> = engine.raw("SELECT COUNT(*) FROM things").await.unwrap();
    assert_eq!(labels, Some((2,)));

    assert_eq!(engine.auto_migrate(&[]).await.unwrap(), 0);

    write(dir.path(), "V3__more_things.sql", "INSERT INTO things (label) VALUES ('c');");
    assert_eq!(engine.run_migrations().await.unwrap(), 1);
    let last = engine.last_applied_script().await.unwrap().unwrap();
    assert_eq!(last.script, "V3__more_things.sql");
}

#[tokio::test]
async fn test_failing_script_stops_the_run() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "V1__ok.sql", "CREATE TABLE one (id INTEGER PRIMARY KEY);");
    write(dir.path(), "V2__broken.sql", "INSERT INTO missing_table VALUES (1);");
    write(dir.path(), "V3__never.sql", "CREATE TABLE three (id INTEGER PRIMARY KEY);");

    let engine = engine_for(dir.path()).await;
    let err = engine.auto_migrate(&[]).await.unwrap_err();
    match err {
        DataError::Migration { script, .. } => assert_eq!(script, "V2__broken.sql"),
        other => panic!("expected a migration error, got {other}"),
    }

    let history = engine.migration_history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(table_exists(&engine, "one").await);
    assert!(!table_exists(&engine, "three").await);
}

#[tokio::test]
async fn test_missing_directory_applies_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_for(&dir.path().join("absent")).await;

    assert_eq!(engine.auto_migrate(&[common::audit_schema()]).await.unwrap(), 0);
    assert!(table_exists(&engine, "audit").await);
    assert!(table_exists(&engine, "migration_histories").await);
    assert!(engine.last_applied_script().await.unwrap().is_none());
}

#[tokio::test]
async fn test_unreadable_script_is_reported_with_its_path() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("V1__binary.sql"), [0xff, 0xfe, 0x00]).unwrap();

    let engine = engine_for(dir.path()).await;
    let err = engine.auto_migrate(&[]).await.unwrap_err();
    match err {
        DataError::Migration { script, source } => {
            assert_eq!(script, "V1__binary.sql");
            match *source {
                DataError::Config(msg) => assert!(msg.contains("V1__binary.sql")),
                other => panic!("expected a config error, got {other}"),
            }
        }
        other => panic!("expected a migration error, got {other}"),
    }
    assert!(engine.migration_history().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_migrations_path_that_is_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("migrations");
    std::fs::write(&file, "not a directory").unwrap();

    let engine = engine_for(&file).await;
    let err = engine.auto_migrate(&[]).await.unwrap_err();
    assert!(matches!(err, DataError::Config(ref msg) if msg.contains("migrations")));
}
