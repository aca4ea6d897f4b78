//! Table definitions used to bootstrap schemas before migrations run.

use crate::error::DataResult;
use crate::query::TableKind;
use crate::sql::{checked_identifier, Dialect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    BigInt,
    Real,
    Text,
    Bool,
    Timestamp,
    Blob,
}

impl ColumnType {
    fn sql(self, dialect: Dialect) -> &'static str {
        match (self, dialect) {
            (ColumnType::Integer, Dialect::MySql) => "INT",
            (ColumnType::Integer, _) => "INTEGER",
            (ColumnType::BigInt, Dialect::Sqlite) => "INTEGER",
            (ColumnType::BigInt, _) => "BIGINT",
            (ColumnType::Real, Dialect::Sqlite) => "REAL",
            (ColumnType::Real, Dialect::Postgres) => "DOUBLE PRECISION",
            (ColumnType::Real, Dialect::MySql) => "DOUBLE",
            (ColumnType::Text, _) => "TEXT",
            (ColumnType::Bool, _) => "BOOLEAN",
            (ColumnType::Timestamp, Dialect::Sqlite) => "TIMESTAMP",
            (ColumnType::Timestamp, Dialect::Postgres) => "TIMESTAMPTZ",
            (ColumnType::Timestamp, Dialect::MySql) => "DATETIME(3)",
            (ColumnType::Blob, Dialect::Postgres) => "BYTEA",
            (ColumnType::Blob, _) => "BLOB",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
}

/// A table and its user-declared columns.
///
/// Managed tables additionally get an auto-increment `id` primary key and
/// the `created_at` / `updated_at` / `deleted_at` columns, with an index on
/// `deleted_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub kind: TableKind,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            kind: TableKind::Managed,
        }
    }

    /// A table without the managed id and timestamp columns.
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            kind: TableKind::Plain,
            ..Self::new(name)
        }
    }

    /// Add a nullable column.
    pub fn column(mut self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            ty,
            nullable: true,
        });
        self
    }

    pub fn not_null(mut self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            ty,
            nullable: false,
        });
        self
    }

    /// DDL statements creating the table (and its soft-delete index) when
    /// missing.
    pub fn create_sql(&self, dialect: Dialect) -> DataResult<Vec<String>> {
        let table = checked_identifier(&self.name, false, "table", dialect)?;
        let mut defs = Vec::new();
        if self.kind == TableKind::Managed {
            defs.push(match dialect {
                Dialect::Sqlite => "\"id\" INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
                Dialect::Postgres => "\"id\" BIGSERIAL PRIMARY KEY".to_string(),
                Dialect::MySql => "`id` BIGINT AUTO_INCREMENT PRIMARY KEY".to_string(),
            });
            let ts = ColumnType::Timestamp.sql(dialect);
            for column in ["created_at", "updated_at", "deleted_at"] {
                let column = checked_identifier(column, false, "column", dialect)?;
                defs.push(format!("{column} {ts} NULL"));
            }
        }
        for column in &self.columns {
            let name = checked_identifier(&column.name, false, "column", dialect)?;
            let null = if column.nullable { "NULL" } else { "NOT NULL" };
            defs.push(format!("{name} {} {null}", column.ty.sql(dialect)));
        }

        let mut statements = vec![format!(
            "CREATE TABLE IF NOT EXISTS {table} ({})",
            defs.join(", ")
        )];
        if self.kind == TableKind::Managed && dialect != Dialect::MySql {
            let index = checked_identifier(
                &format!("idx_{}_deleted_at", self.name.replace('.', "_")),
                false,
                "index",
                dialect,
            )?;
            statements.push(format!(
                "CREATE INDEX IF NOT EXISTS {index} ON {table} (deleted_at)"
            ));
        }
        Ok(statements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_managed_table_sqlite() {
        let sql = TableSchema::new("fake")
            .column("name", ColumnType::Text)
            .column("value", ColumnType::Integer)
            .create_sql(Dialect::Sqlite)
            .unwrap();
        assert_eq!(
            sql[0],
            "CREATE TABLE IF NOT EXISTS \"fake\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"created_at\" TIMESTAMP NULL, \"updated_at\" TIMESTAMP NULL, \"deleted_at\" TIMESTAMP NULL, \"name\" TEXT NULL, \"value\" INTEGER NULL)"
        );
        assert_eq!(
            sql[1],
            "CREATE INDEX IF NOT EXISTS \"idx_fake_deleted_at\" ON \"fake\" (deleted_at)"
        );
    }

    #[test]
    fn test_plain_table_postgres() {
        let sql = TableSchema::plain("audit")
            .not_null("event", ColumnType::Text)
            .column("at", ColumnType::Timestamp)
            .create_sql(Dialect::Postgres)
            .unwrap();
        assert_eq!(
            sql,
            vec!["CREATE TABLE IF NOT EXISTS \"audit\" (\"event\" TEXT NOT NULL, \"at\" TIMESTAMPTZ NULL)".to_string()]
        );
    }

    #[test]
    fn test_invalid_column_name() {
        assert!(TableSchema::new("fake")
            .column("bad name", ColumnType::Text)
            .create_sql(Dialect::Sqlite)
            .is_err());
    }
}
