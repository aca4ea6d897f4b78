//! Write-statement composition for entities whose schema is not known ahead
//! of time.
//!
//! Column names come from the payload, so each one is validated as an
//! identifier and quoted; every value is a bound parameter. Only the
//! `NULL` keyword and `CURRENT_TIMESTAMP` are ever spliced into the SQL text.

use crate::entity::EntityValue;
use crate::error::{DataError, DataResult};
use crate::query::{Base, TableKind};
use crate::sql::{checked_identifier, Dialect, Statement};
use crate::value::{FieldMap, Value};

/// Payload keys the engine maintains itself; matched case-insensitively.
const RESERVED_KEYS: [&str; 5] = ["createat", "updateat", "created_at", "updated_at", "deleted_at"];

pub fn is_reserved(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    RESERVED_KEYS.contains(&key.as_str())
}

/// An INSERT and whether it yields the new row id.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub statement: Statement,
    pub returns_id: bool,
}

/// Build the INSERT for an entity of either shape.
///
/// Typed records contribute their declared columns verbatim; generic maps
/// go through the integer coercion rule first. Reserved timestamp keys are
/// dropped from both.
pub fn insert_statement(
    dialect: Dialect,
    kind: TableKind,
    table: &str,
    entity: &EntityValue<'_>,
) -> DataResult<InsertStatement> {
    let fields: Vec<(String, Value)> = match entity {
        EntityValue::Typed(record) => record.fields(),
        EntityValue::Generic(map) => map
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone().coerce_integral()))
            .collect(),
    };

    let table = checked_identifier(table, false, "table", dialect)?;
    let mut columns = Vec::new();
    let mut values = Vec::new();
    let mut args = Vec::new();
    if kind == TableKind::Managed {
        for column in ["created_at", "updated_at", "deleted_at"] {
            columns.push(checked_identifier(column, false, "column", dialect)?);
        }
        values.extend(["CURRENT_TIMESTAMP", "CURRENT_TIMESTAMP", "NULL"].map(String::from));
    }
    for (key, value) in fields {
        if is_reserved(&key) {
            continue;
        }
        columns.push(checked_identifier(&key, false, "column", dialect)?);
        push_value(&mut values, &mut args, value);
    }

    let mut sql = if columns.is_empty() {
        format!("INSERT INTO {table} DEFAULT VALUES")
    } else {
        format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            values.join(", ")
        )
    };
    let returns_id = kind == TableKind::Managed && dialect.supports_returning();
    if returns_id {
        sql.push_str(&format!(
            " RETURNING {}",
            checked_identifier("id", false, "column", dialect)?
        ));
    }
    Ok(InsertStatement {
        statement: Statement::new(sql, args).finalize(dialect),
        returns_id,
    })
}

/// Build `UPDATE ... SET` for a field map against the rows matched by
/// `base`.
///
/// Managed tables get `updated_at` stamped and only live rows are touched.
/// Reserved keys and empty keys in `fields` are skipped.
pub fn update_statement(
    dialect: Dialect,
    kind: TableKind,
    base: &Base,
    fields: &FieldMap,
) -> DataResult<Statement> {
    base.validate()?;
    let table = base.quoted_table(dialect)?;
    let mut sets = Vec::new();
    let mut args = Vec::new();
    if kind == TableKind::Managed {
        sets.push(format!(
            "{} = CURRENT_TIMESTAMP",
            checked_identifier("updated_at", false, "column", dialect)?
        ));
    }
    for (key, value) in fields.iter() {
        if key.is_empty() || is_reserved(key) {
            continue;
        }
        let column = checked_identifier(key, false, "column", dialect)?;
        let mut rendered = Vec::with_capacity(1);
        push_value(&mut rendered, &mut args, value.clone().coerce_integral());
        sets.push(format!("{column} = {}", rendered.remove(0)));
    }
    if sets.is_empty() {
        return Err(DataError::validation("no fields to update"));
    }

    let filter = match kind {
        TableKind::Managed => format!("deleted_at IS NULL AND ({})", base.condition),
        TableKind::Plain => format!("({})", base.condition),
    };
    args.extend(base.args.iter().cloned());
    let sql = format!("UPDATE {table} SET {} WHERE {filter}", sets.join(", "));
    Ok(Statement::new(sql, args).finalize(dialect))
}

fn push_value(values: &mut Vec<String>, args: &mut Vec<Value>, value: Value) {
    if value.is_null() {
        values.push("NULL".to_string());
    } else {
        values.push("?".to_string());
        args.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, Record};
    use crate::schema::{ColumnType, TableSchema};

    struct Fake {
        name: String,
        value: i64,
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

    #[test]
    fn test_generic_insert_binds_every_value() {
        let map = FieldMap::new()
            .with("name", "o'brien")
            .with("value", 100.0)
            .with("ratio", 100.5)
            .with("createAt", 1)
            .with("UpdateAt", 2);
        let insert = insert_statement(
            Dialect::Postgres,
            TableKind::Managed,
            "fake",
            &EntityValue::Generic(map),
        )
        .unwrap();
        assert_eq!(
            insert.statement.sql,
            "INSERT INTO \"fake\" (\"created_at\", \"updated_at\", \"deleted_at\", \"name\", \"value\", \"ratio\") VALUES (CURRENT_TIMESTAMP, CURRENT_TIMESTAMP, NULL, $1, $2, $3) RETURNING \"id\""
        );
        assert_eq!(
            insert.statement.args,
            vec![Value::from("o'brien"), Value::Int(100), Value::Float(100.5)]
        );
        assert!(insert.returns_id);
    }

    #[test]
    fn test_null_is_rendered_as_keyword() {
        let map = FieldMap::new().with("name", Value::Null).with("value", 1);
        let insert = insert_statement(
            Dialect::Sqlite,
            TableKind::Managed,
            "fake",
            &EntityValue::Generic(map),
        )
        .unwrap();
        assert!(insert.statement.sql.contains("VALUES (CURRENT_TIMESTAMP, CURRENT_TIMESTAMP, NULL, NULL, ?)"));
        assert_eq!(insert.statement.args, vec![Value::Int(1)]);
    }

    #[test]
    fn test_unsafe_column_name_is_rejected() {
        let map = FieldMap::new().with("name\" = 1; --", "x");
        let err = insert_statement(
            Dialect::Sqlite,
            TableKind::Managed,
            "fake",
            &EntityValue::Generic(map),
        )
        .unwrap_err();
        assert!(matches!(err, DataError::Validation(_)));
    }

    #[test]
    fn test_typed_insert_keeps_declared_values() {
        let fake = Fake {
            name: "c".into(),
            value: 100,
        };
        let record: &dyn Record = &fake;
        let insert = insert_statement(
            Dialect::Sqlite,
            TableKind::Managed,
            "fake",
            &EntityValue::Typed(record),
        )
        .unwrap();
        assert_eq!(
            insert.statement.sql,
            "INSERT INTO \"fake\" (\"created_at\", \"updated_at\", \"deleted_at\", \"name\", \"value\") VALUES (CURRENT_TIMESTAMP, CURRENT_TIMESTAMP, NULL, ?, ?) RETURNING \"id\""
        );
        assert_eq!(insert.statement.args, vec![Value::from("c"), Value::Int(100)]);
    }

    #[test]
    fn test_plain_insert() {
        let insert = insert_statement(
            Dialect::Sqlite,
            TableKind::Plain,
            "audit",
            &EntityValue::Generic(FieldMap::new()),
        )
        .unwrap();
        assert_eq!(insert.statement.sql, "INSERT INTO \"audit\" DEFAULT VALUES");
        assert!(!insert.returns_id);
    }

    #[test]
    fn test_update_strips_managed_keys() {
        let base = Base::new("fake").condition("name = ?", ["c"]);
        let fields = FieldMap::new()
            .with("value", 101.0)
            .with("updateAt", 5)
            .with("createAt", 5)
            .with("", 1);
        let stmt =
            update_statement(Dialect::Postgres, TableKind::Managed, &base, &fields).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE \"fake\" SET \"updated_at\" = CURRENT_TIMESTAMP, \"value\" = $1 WHERE deleted_at IS NULL AND (name = $2)"
        );
        assert_eq!(stmt.args, vec![Value::Int(101), Value::from("c")]);
    }

    #[test]
    fn test_plain_update_without_fields_is_rejected() {
        let base = Base::new("audit");
        let fields = FieldMap::new().with("updated_at", 1);
        let err = update_statement(Dialect::Sqlite, TableKind::Plain, &base, &fields).unwrap_err();
        assert!(err.to_string().contains("no fields to update"));
    }
}
