//! # fpm-orm-sqlx — SQLx execution engine for fpm-orm
//!
//! This crate runs the descriptors and payloads defined in [`fpm-orm-data`]
//! against a real database through [SQLx](https://github.com/launchbadge/sqlx).
//! It adds the engine handle, row materialization, transactions, schema
//! bootstrap with versioned migrations, and connection settings.
//!
//! # What's in this crate
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Engine`] | Pool- or transaction-bound handle running every data operation |
//! | [`EngineOptions`] | Plain (unmanaged) tables, affected-row policy, SQL logging, migrations directory |
//! | [`AffectedRows`] | Whether Remove / Updates report zero affected rows as one |
//! | [`DbSetting`] | Connection settings loaded from YAML, `.env` and `DB_*` variables |
//! | [`MigrationRecord`] | One row of the `migration_histories` ledger |
//! | [`generic_row`] | Materializes a driver row as a column-keyed [`GenericRow`] |
//! | [`SqlxErrorExt`] | Extension trait to convert `sqlx::Error` → `DataError` (`.into_data_error()`) |
//!
//! # Feature flags
//!
//! Exactly one database driver is compiled in:
//!
//! | Feature    | Driver |
//! |------------|--------|
//! | `sqlite`   | SQLite via `sqlx/sqlite` (default) |
//! | `postgres` | PostgreSQL via `sqlx/postgres`; takes precedence when both are on |
//!
//! # Quick start
//!
//! ```ignore
//! use fpm_orm_sqlx::prelude::*;
//!
//! let setting = DbSetting::load("application.yaml")?;
//! let engine = Engine::connect(&setting).await?;
//! engine.auto_migrate(&[Fake::schema()]).await?;
//!
//! let id = engine.insert(&Fake { id: 0, name: "c".into(), value: 100 }).await?;
//! let fakes: Vec<Fake> = engine
//!     .find(&Query::new("fake").condition("name = ?", ["c"]).sorter(Sorter::parse("id-")))
//!     .await?;
//! let removed = engine.remove(&Base::new("fake").condition("name = ?", ["c"])).await?;
//! ```
//!
//! # Soft delete
//!
//! Tables are *managed* unless listed in [`EngineOptions::plain_tables`]:
//! reads only see rows whose `deleted_at` is null, Remove stamps
//! `deleted_at` instead of deleting, and writes maintain `created_at` /
//! `updated_at`. Plain tables are read and written as they are and Remove
//! deletes rows.
//!
//! # Transactions
//!
//! [`Engine::transaction`] commits when its body returns `Ok` and rolls
//! back when it returns `Err`. Nested calls join the enclosing
//! transaction.
//!
//! # Error bridging
//!
//! Due to Rust's orphan rules, `From<sqlx::Error> for DataError` can't be
//! implemented here. Use the [`SqlxErrorExt`] trait instead:
//!
//! ```ignore
//! use fpm_orm_sqlx::SqlxErrorExt;
//!
//! let row = sqlx::query("SELECT ...")
//!     .fetch_one(&pool)
//!     .await
//!     .map_err(|e| e.into_data_error())?;
//! ```

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod migration;
pub mod row;
pub mod tx;

pub use backend::{Db, DbRow, DIALECT, ENGINE};
pub use config::{DbSetting, PoolSetting};
pub use engine::{AffectedRows, Engine, EngineOptions};
pub use error::{SqlxErrorExt, SqlxResult};
pub use fpm_orm_data::GenericRow;
pub use migration::MigrationRecord;
pub use row::{generic_row, typed_row};

/// Re-exports of the most commonly used types from both `fpm-orm-data` and this crate.
pub mod prelude {
    pub use crate::{AffectedRows, DbSetting, Engine, EngineOptions, SqlxErrorExt};
    pub use fpm_orm_data::prelude::*;
}
