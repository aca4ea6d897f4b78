#![allow(dead_code)]

use fpm_orm_data::{ColumnType, Entity, TableSchema, Value};
use fpm_orm_sqlx::{DbSetting, Engine, PoolSetting};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Fake {
    pub id: i64,
    pub name: String,
    pub value: i64,
}

impl Fake {
    pub fn new(name: &str, value: i64) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            value,
        }
    }
}

impl Entity for Fake {
    fn table_name() -> &'static str {
        "fake"
    }

    fn columns() -> &'static [&'static str] {
        &["name", "value"]
    }

    fn values(&self) -> Vec<Value> {
        vec![self.name.clone().into(), self.value.into()]
    }

    fn schema() -> TableSchema {
        TableSchema::new("fake")
            .column("name", ColumnType::Text)
            .column("value", ColumnType::Integer)
    }
}

pub fn audit_schema() -> TableSchema {
    TableSchema::plain("audit")
        .not_null("event", ColumnType::Text)
        .column("score", ColumnType::Real)
}

/// An in-memory SQLite database kept alive by a single pooled connection.
pub fn memory_setting() -> DbSetting {
    DbSetting {
        engine: "sqlite".into(),
        database: ":memory:".into(),
        plain_tables: vec!["audit".into()],
        migrations_dir: "does-not-exist".into(),
        pool: PoolSetting {
            max_open: 1,
            min_idle: 1,
            ..PoolSetting::default()
        },
        ..DbSetting::default()
    }
}

pub async fn connect(setting: &DbSetting) -> Engine {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    Engine::connect(setting).await.unwrap()
}

/// A fresh engine with the `fake` and `audit` tables created.
pub async fn engine() -> Engine {
    let engine = connect(&memory_setting()).await;
    engine
        .auto_migrate(&[Fake::schema(), audit_schema()])
        .await
        .unwrap();
    engine
}
