#![cfg(all(feature = "sqlite", not(feature = "postgres")))]

mod common;

use common::{memory_setting, Fake};
use fpm_orm_data::{Entity, Pager, Query, Sorter};
use fpm_orm_sqlx::{DbSetting, Engine, PoolSetting};

const GROUPS: i64 = 4;

fn file_setting(dir: &tempfile::TempDir) -> DbSetting {
    DbSetting {
        database: dir.path().join("shared.db").display().to_string(),
        pool: PoolSetting {
            max_open: 4,
            min_idle: 0,
            ..PoolSetting::default()
        },
        ..memory_setting()
    }
}

/// Rows `g<n>` carry values `n*100 .. n*100+4`.
async fn seed(engine: &Engine) {
    for group in 0..GROUPS {
        for offset in 0..5 {
            let fake = Fake::new(&format!("g{group}"), group * 100 + offset);
            engine.insert(&fake).await.unwrap();
        }
    }
}

fn group_query(group: i64) -> Query {
    let sorter = if group % 2 == 0 {
        Sorter::asc("value")
    } else {
        Sorter::desc("value")
    };
    Query::new("fake")
        .condition("name = ?", [format!("g{group}")])
        .sorter(sorter)
        .pager(Pager::new(1, 2).unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_engine_across_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let engine = common::connect(&file_setting(&dir)).await;
    engine.auto_migrate(&[Fake::schema()]).await.unwrap();
    seed(&engine).await;

    let mut handles = Vec::new();
    for group in 0..GROUPS {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let mut seen = Vec::new();
            for _ in 0..10 {
                let rows = engine.find_object(&group_query(group)).await.unwrap();
                let values: Vec<i64> = rows
                    .iter()
                    .map(|row| row.get("value").and_then(|v| v.as_i64()).unwrap())
                    .collect();
                seen.push(values);
            }
            (group, seen)
        }));
    }

    for handle in handles {
        let (group, seen) = handle.await.unwrap();
        let base = group * 100;
        let expected = if group % 2 == 0 {
            vec![base + 1, base + 2]
        } else {
            vec![base + 3, base + 2]
        };
        assert!(seen.iter().all(|values| *values == expected), "group {group}: {seen:?}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_connects() {
    let dir = tempfile::tempdir().unwrap();
    let setting = file_setting(&dir);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let setting = setting.clone();
        handles.push(tokio::spawn(async move { Engine::connect(&setting).await }));
    }

    let mut engines = Vec::new();
    for handle in handles {
        engines.push(handle.await.unwrap().unwrap());
    }
    engines[0].auto_migrate(&[Fake::schema()]).await.unwrap();
    engines[1].insert(&Fake::new("shared", 1)).await.unwrap();
    for engine in &engines {
        let found = engine
            .find_object(&Query::new("fake").condition("name = ?", ["shared"]))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
