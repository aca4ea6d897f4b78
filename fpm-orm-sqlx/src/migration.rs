//! Schema bootstrap and versioned SQL migrations.
//!
//! [`Engine::auto_migrate`] creates the ledger table and the given tables
//! when missing, then applies the scripts in the configured migrations
//! directory that are newer than the last one recorded:
//!
//! ```text
//! migrations/
//!   V1__create_fake.sql
//!   V1.1__add_fake_index.sql
//!   V2__seed.sql
//! ```
//!
//! Each script runs in its own transaction together with its ledger row, so
//! a failing script leaves neither partial changes nor a record behind.

use std::path::Path;

use chrono::{DateTime, Utc};
use fpm_orm_data::migration::{pending_scripts, ScriptName};
use fpm_orm_data::{
    ColumnType, DataError, DataResult, Entity, Query, Sorter, TableSchema, Value,
};

use crate::backend::DIALECT;
use crate::engine::Engine;

/// One applied migration script, as recorded in `migration_histories`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct MigrationRecord {
    pub id: i64,
    /// The version prefix, e.g. `V1.1`.
    pub version: String,
    pub description: String,
    /// The script file name.
    pub script: String,
    pub installed_at: DateTime<Utc>,
    pub success: bool,
}

impl MigrationRecord {
    fn applied(script: &ScriptName) -> Self {
        Self {
            id: 0,
            version: script.version.clone(),
            description: script.description.clone(),
            script: script.file_name.clone(),
            installed_at: Utc::now(),
            success: true,
        }
    }
}

impl Entity for MigrationRecord {
    fn table_name() -> &'static str {
        "migration_histories"
    }

    fn columns() -> &'static [&'static str] {
        &["version", "description", "script", "installed_at", "success"]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.version.clone().into(),
            self.description.clone().into(),
            self.script.clone().into(),
            self.installed_at.into(),
            self.success.into(),
        ]
    }

    fn schema() -> TableSchema {
        TableSchema::new(<Self as Entity>::table_name())
            .not_null("version", ColumnType::Text)
            .not_null("description", ColumnType::Text)
            .not_null("script", ColumnType::Text)
            .not_null("installed_at", ColumnType::Timestamp)
            .not_null("success", ColumnType::Bool)
    }
}

impl Engine {
    /// Create the migration ledger and `tables` when missing, then apply
    /// pending scripts. Returns the number of scripts applied.
    pub async fn auto_migrate(&self, tables: &[TableSchema]) -> DataResult<usize> {
        let ledger = MigrationRecord::schema();
        for schema in std::iter::once(&ledger).chain(tables) {
            for sql in schema.create_sql(DIALECT)? {
                self.execute(&sql).await?;
            }
        }
        self.run_migrations().await
    }

    /// Apply the scripts in the migrations directory newer than the last
    /// recorded one. A missing directory applies nothing.
    pub async fn run_migrations(&self) -> DataResult<usize> {
        let dir = self.options.migrations_dir.clone();
        let file_names = match script_files(&dir).await? {
            Some(names) => names,
            None => {
                tracing::debug!(dir = %dir.display(), "No migrations directory, skipping scripts");
                return Ok(0);
            }
        };

        let last = self.last_applied_script().await?;
        let pending = pending_scripts(&file_names, last.as_ref().map(|r| r.script.as_str()));
        for script in &pending {
            let path = dir.join(&script.file_name);
            let sql = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| migration_error(script, io_error(&path, e)))?;
            self.apply_script(script, sql)
                .await
                .map_err(|e| migration_error(script, e))?;
            tracing::info!(script = %script.file_name, version = %script.version, "Applied migration");
        }
        Ok(pending.len())
    }

    /// The most recently installed script, if any.
    pub async fn last_applied_script(&self) -> DataResult<Option<MigrationRecord>> {
        let query = Query::new(<MigrationRecord as Entity>::table_name())
            .sorter(Sorter::desc("installed_at"))
            .sorter(Sorter::desc("id"));
        self.first(&query).await
    }

    /// Every recorded script, oldest first.
    pub async fn migration_history(&self) -> DataResult<Vec<MigrationRecord>> {
        let query = Query::new(<MigrationRecord as Entity>::table_name())
            .sorter(Sorter::asc("installed_at"))
            .sorter(Sorter::asc("id"));
        self.find(&query).await
    }

    async fn apply_script(&self, script: &ScriptName, sql: String) -> DataResult<()> {
        let record = MigrationRecord::applied(script);
        self.transaction(|tx| async move {
            tx.execute(&sql).await?;
            tx.insert(&record).await?;
            Ok::<_, DataError>(())
        })
        .await
    }
}

fn migration_error(script: &ScriptName, source: DataError) -> DataError {
    DataError::Migration {
        script: script.file_name.clone(),
        source: Box::new(source),
    }
}

fn io_error(path: &Path, err: std::io::Error) -> DataError {
    DataError::Config(format!("{}: {err}", path.display()))
}

/// File names directly inside `dir`, or `None` when it does not exist.
async fn script_files(dir: &Path) -> DataResult<Option<Vec<String>>> {
    if !tokio::fs::try_exists(dir).await.map_err(|e| io_error(dir, e))? {
        return Ok(None);
    }
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| io_error(dir, e))?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(dir, e))? {
        if entry.file_type().await.map_err(|e| io_error(&entry.path(), e))?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(Some(names))
}
