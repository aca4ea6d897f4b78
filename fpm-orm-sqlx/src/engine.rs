//! The execution engine: turns descriptors into statements, runs them on a
//! pool or an open transaction, and materializes the results.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use fpm_orm_data::writer::{insert_statement, update_statement};
use fpm_orm_data::{
    Base, DataError, DataResult, Database, Dialect, Entity, EntityValue, FieldMap, GenericRow, Page,
    Query, Statement, TableKind,
};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Transaction};
use tokio::sync::Mutex;

use crate::backend::{bind_all, DbRow, Db, DIALECT};
use crate::error::SqlxErrorExt;
use crate::row::{generic_row, typed_row};

/// Directory scanned for versioned migration scripts unless configured
/// otherwise.
pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

/// How the affected-row count of Remove / Updates is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffectedRows {
    /// The exact count reported by the driver.
    #[default]
    Reported,
    /// Zero is reported as one when the statement did not fail.
    ZeroAsOne,
}

impl AffectedRows {
    pub fn apply(self, rows: u64) -> u64 {
        match self {
            AffectedRows::ZeroAsOne if rows == 0 => 1,
            _ => rows,
        }
    }
}

/// Engine-wide behavior switches, shared by every handle cloned from the
/// same engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Tables without the managed timestamp and soft-delete columns.
    pub plain_tables: HashSet<String>,
    pub affected_rows: AffectedRows,
    /// Log full statement text at `info` instead of a summary at `debug`.
    pub show_sql: bool,
    pub migrations_dir: PathBuf,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            plain_tables: HashSet::new(),
            affected_rows: AffectedRows::default(),
            show_sql: false,
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
        }
    }
}

impl EngineOptions {
    pub fn plain_table(mut self, table: impl Into<String>) -> Self {
        self.plain_tables.insert(table.into());
        self
    }

    pub fn affected_rows(mut self, policy: AffectedRows) -> Self {
        self.affected_rows = policy;
        self
    }

    pub fn migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    pub fn table_kind(&self, table: &str) -> TableKind {
        if self.plain_tables.contains(table) {
            TableKind::Plain
        } else {
            TableKind::Managed
        }
    }
}

pub(crate) type SharedTx = Arc<Mutex<Option<Transaction<'static, Db>>>>;

#[derive(Clone)]
pub(crate) enum Conn {
    Pool(Pool<Db>),
    /// Shared with the `transaction` call that opened it; `None` once it
    /// has been committed or rolled back.
    Tx(SharedTx),
}

/// Runs `$body` with `$exec` bound to the engine's executor: the pool, or
/// the connection of the open transaction.
macro_rules! with_executor {
    ($engine:expr, $exec:ident => $body:expr) => {
        match &$engine.conn {
            $crate::engine::Conn::Pool(pool) => {
                let $exec = pool;
                $body
            }
            $crate::engine::Conn::Tx(shared) => {
                let mut guard = shared.lock().await;
                let tx = guard.as_mut().ok_or_else(|| {
                    fpm_orm_data::DataError::Other("transaction already finished".into())
                })?;
                let $exec = &mut **tx;
                $body
            }
        }
    };
}

/// A handle to the database, bound either to a connection pool or to one
/// open transaction.
///
/// Cheap to clone; every clone shares the pool (or transaction) and the
/// options. Each call takes its own descriptor, so a pool-bound engine can
/// be used from many tasks at once.
#[derive(Clone)]
pub struct Engine {
    pub(crate) conn: Conn,
    pub(crate) options: Arc<EngineOptions>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("transaction", &self.is_transaction())
            .field("options", &self.options)
            .finish()
    }
}

impl Engine {
    pub fn new(pool: Pool<Db>) -> Self {
        Self::with_options(pool, EngineOptions::default())
    }

    pub fn with_options(pool: Pool<Db>, options: EngineOptions) -> Self {
        Self {
            conn: Conn::Pool(pool),
            options: Arc::new(options),
        }
    }

    /// The pool, unless this handle is bound to a transaction.
    pub fn pool(&self) -> Option<&Pool<Db>> {
        match &self.conn {
            Conn::Pool(pool) => Some(pool),
            Conn::Tx(_) => None,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self.conn, Conn::Tx(_))
    }

    pub fn table_kind(&self, table: &str) -> TableKind {
        self.options.table_kind(table.trim())
    }

    // ── Descriptor-driven reads ─────────────────────────────────────────

    /// All rows matching the descriptor, as records.
    pub async fn find<T>(&self, query: &Query) -> DataResult<Vec<T>>
    where
        T: for<'r> sqlx::FromRow<'r, DbRow> + Send + Unpin,
    {
        let stmt = query.build_select(DIALECT, self.table_kind(&query.base.table))?;
        self.trace("find", &query.base.table, &stmt);
        self.fetch_all(&stmt).await?.iter().map(typed_row).collect()
    }

    /// All rows matching the descriptor, as generic rows.
    pub async fn find_object(&self, query: &Query) -> DataResult<Vec<GenericRow>> {
        let stmt = query.build_select(DIALECT, self.table_kind(&query.base.table))?;
        self.trace("find", &query.base.table, &stmt);
        self.fetch_all(&stmt).await?.iter().map(generic_row).collect()
    }

    /// Number of live rows matching the predicate.
    pub async fn count(&self, base: &Base) -> DataResult<u64> {
        let stmt = base.build_count(DIALECT, self.table_kind(&base.table))?;
        self.trace("count", &base.table, &stmt);
        let row = self.fetch_one(&stmt).await?;
        let count: i64 = row.try_get(0).map_err(SqlxErrorExt::into_data_error)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// The current window of records plus the total number of matches.
    pub async fn find_and_count<T>(&self, query: &Query) -> DataResult<Page<T>>
    where
        T: for<'r> sqlx::FromRow<'r, DbRow> + Send + Unpin,
    {
        let count = self.count(query.base()).await?;
        let rows = self.find(query).await?;
        Ok(Page::new(rows, count))
    }

    pub async fn find_and_count_object(&self, query: &Query) -> DataResult<Page<GenericRow>> {
        let count = self.count(query.base()).await?;
        let rows = self.find_object(query).await?;
        Ok(Page::new(rows, count))
    }

    /// The first matching record, or `None`.
    pub async fn first<T>(&self, query: &Query) -> DataResult<Option<T>>
    where
        T: for<'r> sqlx::FromRow<'r, DbRow> + Send + Unpin,
    {
        let stmt = query.build_first(DIALECT, self.table_kind(&query.base.table))?;
        self.trace("first", &query.base.table, &stmt);
        self.fetch_optional(&stmt).await?.as_ref().map(typed_row).transpose()
    }

    /// Like [`Engine::first`], but a missing row is [`DataError::NotFound`].
    pub async fn first_required<T>(&self, query: &Query) -> DataResult<T>
    where
        T: for<'r> sqlx::FromRow<'r, DbRow> + Send + Unpin,
    {
        self.first(query).await?.ok_or_else(|| {
            DataError::NotFound(format!(
                "no row in {} matches {}",
                query.base.table, query.base.condition
            ))
        })
    }

    pub async fn first_object(&self, query: &Query) -> DataResult<Option<GenericRow>> {
        let stmt = query.build_first(DIALECT, self.table_kind(&query.base.table))?;
        self.trace("first", &query.base.table, &stmt);
        self.fetch_optional(&stmt).await?.as_ref().map(generic_row).transpose()
    }

    // ── Writes ──────────────────────────────────────────────────────────

    /// Insert a typed record or a field map and return the new row id.
    ///
    /// The row is written to `base.table` when set, otherwise to the typed
    /// record's own table. Plain tables report no id.
    pub async fn create<'a>(
        &self,
        base: &Base,
        entity: impl Into<EntityValue<'a>>,
    ) -> DataResult<Option<i64>> {
        let entity = entity.into();
        let table = entity.resolve_table(base)?.to_string();
        let insert = insert_statement(DIALECT, self.table_kind(&table), &table, &entity)?;
        self.trace("create", &table, &insert.statement);
        if insert.returns_id {
            let row = self.fetch_one(&insert.statement).await?;
            let id: i64 = row.try_get(0).map_err(SqlxErrorExt::into_data_error)?;
            Ok(Some(id))
        } else {
            self.run(&insert.statement).await?;
            Ok(None)
        }
    }

    /// Insert a typed record into its own table.
    pub async fn insert<E: Entity>(&self, entity: &E) -> DataResult<Option<i64>> {
        self.create(&Base::new(<E as Entity>::table_name()), entity).await
    }

    /// Soft-delete the live rows matching the predicate (hard delete for
    /// plain tables).
    pub async fn remove(&self, base: &Base) -> DataResult<u64> {
        let stmt = base.build_remove(DIALECT, self.table_kind(&base.table))?;
        self.trace("remove", &base.table, &stmt);
        let rows = self.run(&stmt).await?;
        Ok(self.options.affected_rows.apply(rows))
    }

    /// Set `fields` on the live rows matching the predicate.
    pub async fn updates(&self, base: &Base, fields: &FieldMap) -> DataResult<u64> {
        let stmt = update_statement(DIALECT, self.table_kind(&base.table), base, fields)?;
        self.trace("update", &base.table, &stmt);
        let rows = self.run(&stmt).await?;
        Ok(self.options.affected_rows.apply(rows))
    }

    // ── Raw SQL ─────────────────────────────────────────────────────────

    /// Run one or more statements verbatim and return the affected rows.
    pub async fn execute(&self, sql: &str) -> DataResult<u64> {
        self.trace_raw("execute", sql);
        let result = with_executor!(self, exec => sqlx::Executor::execute(exec, sqlx::raw_sql(sql)).await)
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(result.rows_affected())
    }

    /// Read the first row of a raw query into `T` (a record or a tuple
    /// such as `(i64,)`).
    pub async fn raw<T>(&self, sql: &str) -> DataResult<Option<T>>
    where
        T: for<'r> sqlx::FromRow<'r, DbRow> + Send + Unpin,
    {
        self.trace_raw("raw", sql);
        let row = with_executor!(self, exec => sqlx::query(sql).fetch_optional(exec).await)
            .map_err(SqlxErrorExt::into_data_error)?;
        row.as_ref().map(typed_row).transpose()
    }

    /// Stream the rows of a raw query: `factory` builds an object from each
    /// row and `appender` receives it. Returns the number of rows seen.
    pub async fn raws<T, F, A>(&self, sql: &str, mut factory: F, mut appender: A) -> DataResult<u64>
    where
        F: FnMut(&DbRow) -> DataResult<T>,
        A: FnMut(T),
    {
        use futures_util::TryStreamExt;

        self.trace_raw("raws", sql);
        let mut seen = 0;
        with_executor!(self, exec => {
            let mut rows = sqlx::query(sql).fetch(exec);
            while let Some(row) = rows.try_next().await.map_err(SqlxErrorExt::into_data_error)? {
                appender(factory(&row)?);
                seen += 1;
            }
        });
        Ok(seen)
    }

    /// Collect the rows of a raw query as generic rows.
    pub async fn raw_objects(&self, sql: &str) -> DataResult<Vec<GenericRow>> {
        let mut out = Vec::new();
        self.raws(sql, generic_row, |row| out.push(row)).await?;
        Ok(out)
    }

    // ── Plumbing ────────────────────────────────────────────────────────

    async fn fetch_all(&self, stmt: &Statement) -> DataResult<Vec<DbRow>> {
        let query = bind_all(sqlx::query(&stmt.sql), &stmt.args);
        with_executor!(self, exec => query.fetch_all(exec).await)
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn fetch_optional(&self, stmt: &Statement) -> DataResult<Option<DbRow>> {
        let query = bind_all(sqlx::query(&stmt.sql), &stmt.args);
        with_executor!(self, exec => query.fetch_optional(exec).await)
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn fetch_one(&self, stmt: &Statement) -> DataResult<DbRow> {
        let query = bind_all(sqlx::query(&stmt.sql), &stmt.args);
        with_executor!(self, exec => query.fetch_one(exec).await)
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn run(&self, stmt: &Statement) -> DataResult<u64> {
        let query = bind_all(sqlx::query(&stmt.sql), &stmt.args);
        let result = with_executor!(self, exec => query.execute(exec).await)
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(result.rows_affected())
    }

    fn trace(&self, op: &'static str, table: &str, stmt: &Statement) {
        if self.options.show_sql {
            tracing::info!(target: "fpm_orm::sql", op, table, args = stmt.args.len(), sql = %stmt.sql, "Executing statement");
        } else {
            tracing::debug!(target: "fpm_orm::sql", op, table, args = stmt.args.len(), "Executing statement");
        }
    }

    fn trace_raw(&self, op: &'static str, sql: &str) {
        if self.options.show_sql {
            tracing::info!(target: "fpm_orm::sql", op, sql, "Executing raw statement");
        } else {
            tracing::debug!(target: "fpm_orm::sql", op, "Executing raw statement");
        }
    }
}

impl Database for Engine {
    fn dialect(&self) -> Dialect {
        DIALECT
    }

    async fn find_object(&self, query: &Query) -> Result<Vec<GenericRow>, DataError> {
        Engine::find_object(self, query).await
    }

    async fn first_object(&self, query: &Query) -> Result<Option<GenericRow>, DataError> {
        Engine::first_object(self, query).await
    }

    async fn count(&self, base: &Base) -> Result<u64, DataError> {
        Engine::count(self, base).await
    }

    async fn find_and_count_object(&self, query: &Query) -> Result<Page<GenericRow>, DataError> {
        Engine::find_and_count_object(self, query).await
    }

    async fn create(&self, base: &Base, entity: EntityValue<'_>) -> Result<Option<i64>, DataError> {
        Engine::create(self, base, entity).await
    }

    async fn remove(&self, base: &Base) -> Result<u64, DataError> {
        Engine::remove(self, base).await
    }

    async fn updates(&self, base: &Base, fields: &FieldMap) -> Result<u64, DataError> {
        Engine::updates(self, base, fields).await
    }

    async fn execute(&self, sql: &str) -> Result<u64, DataError> {
        Engine::execute(self, sql).await
    }
}
