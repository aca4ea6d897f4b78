//! The query descriptor: table, predicate, projection, window and ordering
//! for one call.
//!
//! A descriptor is a plain value built fresh per call and passed by
//! reference into each engine operation. Builder methods consume and return
//! `Self` and copy everything they are given.
//!
//! # Example
//!
//! ```
//! use fpm_orm_data::{Dialect, Pager, Query, Sorter, TableKind};
//!
//! let q = Query::new("fake")
//!     .condition("name = ?", ["c"])
//!     .fields(["id", "name"])
//!     .sorter(Sorter::parse("id-"))
//!     .pager(Pager::new(0, 10).unwrap());
//! let stmt = q.build_select(Dialect::Postgres, TableKind::Managed).unwrap();
//! assert_eq!(
//!     stmt.sql,
//!     "SELECT \"id\", \"name\" FROM \"fake\" WHERE (name = $1) AND deleted_at IS NULL ORDER BY \"id\" DESC LIMIT 10"
//! );
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};
use crate::page::Pager;
use crate::sql::{checked_identifier, count_placeholders, Dialect, Statement};
use crate::value::Value;

/// The predicate used when the caller gives none.
pub const TAUTOLOGY: &str = "1=1";

/// Whether a table carries the managed `created_at` / `updated_at` /
/// `deleted_at` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableKind {
    /// Soft-deleted and timestamped by the engine.
    #[default]
    Managed,
    /// Left alone: no soft-delete filter, hard deletes, no timestamps.
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(Direction::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(Direction::Desc)
        } else {
            Err(DataError::Validation(format!(
                "sort direction must be asc or desc, got {s:?}"
            )))
        }
    }
}

/// One ORDER BY entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sorter {
    pub column: String,
    pub direction: Direction,
}

impl Sorter {
    pub fn new(column: impl Into<String>, direction: Direction) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    pub fn asc(column: impl Into<String>) -> Self {
        Self::new(column, Direction::Asc)
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self::new(column, Direction::Desc)
    }

    /// Parse the suffix convention: `col-` sorts descending, `col+` or a
    /// bare `col` ascending. An empty column falls back to `id`.
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        let (column, direction) = match spec.strip_suffix('-') {
            Some(column) => (column, Direction::Desc),
            None => (spec.strip_suffix('+').unwrap_or(spec), Direction::Asc),
        };
        let column = if column.is_empty() { "id" } else { column };
        Self::new(column, direction)
    }

    fn render(&self, dialect: Dialect) -> DataResult<String> {
        let column = checked_identifier(&self.column, false, "sort column", dialect)?;
        Ok(format!("{column} {}", self.direction.as_sql()))
    }
}

/// One entry of the projection list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// A plain column (or `*`, or `table.*`).
    Column(String),
    /// A timestamp column rendered as epoch milliseconds under an alias.
    EpochMillis { column: String, alias: String },
}

impl Field {
    fn render(&self, dialect: Dialect) -> DataResult<String> {
        match self {
            Field::Column(column) => checked_identifier(column, true, "field", dialect),
            Field::EpochMillis { column, alias } => {
                let column = checked_identifier(column, false, "field", dialect)?;
                let alias = checked_identifier(alias, false, "alias", dialect)?;
                Ok(format!("{} AS {alias}", dialect.epoch_millis(&column)))
            }
        }
    }
}

impl From<&str> for Field {
    fn from(column: &str) -> Self {
        Field::Column(column.to_string())
    }
}

impl From<String> for Field {
    fn from(column: String) -> Self {
        Field::Column(column)
    }
}

/// The table + predicate subset of a descriptor, used by count, remove,
/// update and create.
#[derive(Debug, Clone, PartialEq)]
pub struct Base {
    pub table: String,
    pub condition: String,
    pub args: Vec<Value>,
}

impl Default for Base {
    fn default() -> Self {
        Self {
            table: String::new(),
            condition: TAUTOLOGY.to_string(),
            args: Vec::new(),
        }
    }
}

impl Base {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set the predicate and its positional arguments, replacing any
    /// previous ones.
    pub fn condition<I, V>(mut self, condition: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let condition = condition.into();
        self.condition = if condition.trim().is_empty() {
            TAUTOLOGY.to_string()
        } else {
            condition
        };
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Check the table name and that the argument count matches the
    /// placeholders present in the condition.
    pub fn validate(&self) -> DataResult<()> {
        if self.table.trim().is_empty() {
            return Err(DataError::validation("table is required"));
        }
        let expected = count_placeholders(&self.condition);
        if expected != self.args.len() {
            return Err(DataError::Validation(format!(
                "condition {:?} expects {expected} argument(s), got {}",
                self.condition,
                self.args.len()
            )));
        }
        Ok(())
    }

    pub(crate) fn quoted_table(&self, dialect: Dialect) -> DataResult<String> {
        checked_identifier(&self.table, false, "table", dialect)
    }

    /// `WHERE (condition)` plus the soft-delete filter for managed tables.
    fn where_clause(&self, kind: TableKind) -> String {
        match kind {
            TableKind::Managed => format!(" WHERE ({}) AND deleted_at IS NULL", self.condition),
            TableKind::Plain => format!(" WHERE ({})", self.condition),
        }
    }

    /// Build `SELECT COUNT(*) ...` for the live rows matching the condition.
    pub fn build_count(&self, dialect: Dialect, kind: TableKind) -> DataResult<Statement> {
        self.validate()?;
        let table = self.quoted_table(dialect)?;
        let sql = format!("SELECT COUNT(*) FROM {table}{}", self.where_clause(kind));
        Ok(Statement::new(sql, self.args.clone()).finalize(dialect))
    }

    /// Build the removal statement: a soft delete stamping `deleted_at` on
    /// rows not yet deleted, or a hard `DELETE` for plain tables.
    pub fn build_remove(&self, dialect: Dialect, kind: TableKind) -> DataResult<Statement> {
        self.validate()?;
        let table = self.quoted_table(dialect)?;
        let sql = match kind {
            TableKind::Managed => format!(
                "UPDATE {table} SET deleted_at = CURRENT_TIMESTAMP{}",
                self.where_clause(kind)
            ),
            TableKind::Plain => format!("DELETE FROM {table}{}", self.where_clause(kind)),
        };
        Ok(Statement::new(sql, self.args.clone()).finalize(dialect))
    }
}

/// A complete query descriptor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub base: Base,
    pub fields: Vec<Field>,
    pub pager: Pager,
    pub sorters: Vec<Sorter>,
}

impl Query {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            base: Base::new(table),
            ..Self::default()
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.base.table = table.into();
        self
    }

    pub fn condition<I, V>(mut self, condition: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.base = self.base.condition(condition, args);
        self
    }

    /// Append entries to the projection list. An empty list selects `*`.
    pub fn fields<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn pager(mut self, pager: Pager) -> Self {
        self.pager = pager;
        self
    }

    /// Append a sorter; sorters apply in the order they were added.
    pub fn sorter(mut self, sorter: Sorter) -> Self {
        self.sorters.push(sorter);
        self
    }

    /// The table + predicate subset.
    pub fn base(&self) -> &Base {
        &self.base
    }

    pub fn validate(&self) -> DataResult<()> {
        self.base.validate()?;
        self.pager.validate()
    }

    /// Build the SELECT for this descriptor.
    pub fn build_select(&self, dialect: Dialect, kind: TableKind) -> DataResult<Statement> {
        self.render_select(dialect, kind, self.pager)
    }

    /// Build the SELECT for a single-row lookup: same predicate, projection
    /// and ordering, window forced to the first row.
    pub fn build_first(&self, dialect: Dialect, kind: TableKind) -> DataResult<Statement> {
        self.render_select(dialect, kind, Pager { skip: 0, limit: 1 })
    }

    fn render_select(
        &self,
        dialect: Dialect,
        kind: TableKind,
        pager: Pager,
    ) -> DataResult<Statement> {
        self.validate()?;
        pager.validate()?;
        let table = self.base.quoted_table(dialect)?;
        let columns = if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields
                .iter()
                .map(|f| f.render(dialect))
                .collect::<DataResult<Vec<_>>>()?
                .join(", ")
        };

        let mut sql = format!("SELECT {columns} FROM {table}{}", self.base.where_clause(kind));
        if !self.sorters.is_empty() {
            let clauses = self
                .sorters
                .iter()
                .map(|s| s.render(dialect))
                .collect::<DataResult<Vec<_>>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&clauses.join(", "));
        }
        sql.push_str(&pager.render(dialect));
        Ok(Statement::new(sql, self.base.args.clone()).finalize(dialect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let q = Query::new("fake");
        assert_eq!(q.base.condition, "1=1");
        assert!(q.base.args.is_empty());
        assert!(q.fields.is_empty());
        assert_eq!(q.pager, Pager { skip: 0, limit: -1 });
        assert!(q.sorters.is_empty());
    }

    #[test]
    fn test_simple_select() {
        let stmt = Query::new("fake")
            .build_select(Dialect::Sqlite, TableKind::Managed)
            .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM \"fake\" WHERE (1=1) AND deleted_at IS NULL"
        );
        assert!(stmt.args.is_empty());
    }

    #[test]
    fn test_plain_table_has_no_soft_delete_filter() {
        let stmt = Query::new("audit")
            .condition("id > ?", [3])
            .build_select(Dialect::Sqlite, TableKind::Plain)
            .unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM \"audit\" WHERE (id > ?)");
        assert_eq!(stmt.args, vec![Value::Int(3)]);
    }

    #[test]
    fn test_complex_query() {
        let stmt = Query::new("fake")
            .condition("name = ? AND value > ?", [Value::from("c"), Value::from(10)])
            .fields(["id", "name"])
            .sorter(Sorter::asc("name"))
            .sorter(Sorter::desc("id"))
            .pager(Pager::new(20, 10).unwrap())
            .build_select(Dialect::Postgres, TableKind::Managed)
            .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT \"id\", \"name\" FROM \"fake\" WHERE (name = $1 AND value > $2) AND deleted_at IS NULL ORDER BY \"name\" ASC, \"id\" DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(stmt.args, vec![Value::from("c"), Value::Int(10)]);
    }

    #[test]
    fn test_first_forces_single_row() {
        let stmt = Query::new("fake")
            .pager(Pager::new(40, 20).unwrap())
            .build_first(Dialect::Sqlite, TableKind::Managed)
            .unwrap();
        assert!(stmt.sql.ends_with(" LIMIT 1"));
    }

    #[test]
    fn test_count_query() {
        let stmt = Query::new("fake")
            .condition("name = ?", ["c"])
            .base()
            .build_count(Dialect::Sqlite, TableKind::Managed)
            .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT COUNT(*) FROM \"fake\" WHERE (name = ?) AND deleted_at IS NULL"
        );
        assert_eq!(stmt.args, vec![Value::from("c")]);
    }

    #[test]
    fn test_remove_is_soft_and_skips_deleted_rows() {
        let stmt = Base::new("fake")
            .condition("name = ?", ["c"])
            .build_remove(Dialect::Postgres, TableKind::Managed)
            .unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE \"fake\" SET deleted_at = CURRENT_TIMESTAMP WHERE (name = $1) AND deleted_at IS NULL"
        );

        let stmt = Base::new("audit")
            .build_remove(Dialect::Sqlite, TableKind::Plain)
            .unwrap();
        assert_eq!(stmt.sql, "DELETE FROM \"audit\" WHERE (1=1)");
    }

    #[test]
    fn test_argument_mismatch_is_rejected() {
        let err = Query::new("fake")
            .condition("name = ? AND value = ?", ["c"])
            .build_select(Dialect::Sqlite, TableKind::Managed)
            .unwrap_err();
        assert!(matches!(err, DataError::Validation(_)));
    }

    #[test]
    fn test_missing_table_is_rejected() {
        let err = Base::default()
            .build_count(Dialect::Sqlite, TableKind::Managed)
            .unwrap_err();
        assert!(err.to_string().contains("table is required"));
    }

    #[test]
    fn test_unsafe_sort_column_is_rejected() {
        let err = Query::new("fake")
            .sorter(Sorter::asc("id; drop table fake"))
            .build_select(Dialect::Sqlite, TableKind::Managed)
            .unwrap_err();
        assert!(matches!(err, DataError::Validation(_)));
    }

    #[test]
    fn test_epoch_field() {
        let stmt = Query::new("fake")
            .fields([
                Field::from("created_at"),
                Field::EpochMillis {
                    column: "created_at".into(),
                    alias: "createAt".into(),
                },
            ])
            .build_select(Dialect::Postgres, TableKind::Managed)
            .unwrap();
        assert!(stmt.sql.starts_with(
            "SELECT \"created_at\", (floor(extract(epoch from \"created_at\") * 1000))::bigint AS \"createAt\" FROM"
        ));
    }

    #[test]
    fn test_sort_suffix_parsing() {
        assert_eq!(Sorter::parse("id-"), Sorter::desc("id"));
        assert_eq!(Sorter::parse("name"), Sorter::asc("name"));
        assert_eq!(Sorter::parse("name+"), Sorter::asc("name"));
        assert_eq!(Sorter::parse("-"), Sorter::desc("id"));
    }

    #[test]
    fn test_direction_is_case_insensitive() {
        assert_eq!("DESC".parse::<Direction>().unwrap(), Direction::Desc);
        assert_eq!("Asc".parse::<Direction>().unwrap(), Direction::Asc);
        assert!("down".parse::<Direction>().is_err());
    }

    #[test]
    fn test_builders_copy_caller_data() {
        let mut args = vec![Value::from("c")];
        let q = Query::new("fake").condition("name = ?", args.clone());
        args[0] = Value::from("d");
        assert_eq!(q.base.args, vec![Value::from("c")]);
    }
}
