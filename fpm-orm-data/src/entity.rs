use crate::error::{DataError, DataResult};
use crate::query::Base;
use crate::schema::TableSchema;
use crate::value::{FieldMap, Value};

/// Trait representing a database entity with a table name, its writable
/// columns and their values.
///
/// `columns()` lists the columns written on insert, in the same order as
/// `values()`. The managed `id` / `created_at` / `updated_at` /
/// `deleted_at` columns are maintained by the engine and should not be
/// listed.
///
/// # Example
///
/// ```ignore
/// impl Entity for Fake {
///     fn table_name() -> &'static str { "fake" }
///     fn columns() -> &'static [&'static str] { &["name", "value"] }
///     fn values(&self) -> Vec<Value> { vec![self.name.clone().into(), self.value.into()] }
///     fn schema() -> TableSchema {
///         TableSchema::new("fake")
///             .column("name", ColumnType::Text)
///             .column("value", ColumnType::Integer)
///     }
/// }
/// ```
pub trait Entity: Send + Sync + Unpin + 'static {
    fn table_name() -> &'static str;

    fn id_column() -> &'static str {
        "id"
    }

    fn columns() -> &'static [&'static str];

    fn values(&self) -> Vec<Value>;

    fn schema() -> TableSchema;
}

/// Object-safe view of a typed record, used at the write boundary.
pub trait Record: Send + Sync {
    fn table_name(&self) -> &str;

    /// Column/value pairs to insert, in declaration order.
    fn fields(&self) -> Vec<(String, Value)>;
}

impl<E: Entity> Record for E {
    fn table_name(&self) -> &str {
        <E as Entity>::table_name()
    }

    fn fields(&self) -> Vec<(String, Value)> {
        E::columns()
            .iter()
            .map(|c| c.to_string())
            .zip(self.values())
            .collect()
    }
}

/// The payload of a write: either a statically typed record or a
/// schema-less field map.
pub enum EntityValue<'a> {
    Typed(&'a dyn Record),
    Generic(FieldMap),
}

impl<'a> EntityValue<'a> {
    /// Accept a payload from a generic interchange format. Only JSON
    /// objects describe an entity; every other shape is rejected.
    pub fn from_json(value: serde_json::Value) -> DataResult<EntityValue<'static>> {
        match value {
            serde_json::Value::Object(object) => {
                Ok(EntityValue::Generic(FieldMap::from_json_object(object)))
            }
            other => Err(DataError::UnknownDataType(json_kind(&other).to_string())),
        }
    }

    /// The table to write into: the descriptor's table when given,
    /// otherwise the typed record's own table.
    pub fn resolve_table<'b>(&'b self, base: &'b Base) -> DataResult<&'b str> {
        let table = base.table.trim();
        if !table.is_empty() {
            return Ok(table);
        }
        match self {
            EntityValue::Typed(record) => Ok(record.table_name()),
            EntityValue::Generic(_) => Err(DataError::validation("table is required")),
        }
    }
}

impl<'a, E: Entity> From<&'a E> for EntityValue<'a> {
    fn from(entity: &'a E) -> Self {
        EntityValue::Typed(entity)
    }
}

impl From<FieldMap> for EntityValue<'static> {
    fn from(map: FieldMap) -> Self {
        EntityValue::Generic(map)
    }
}

impl std::fmt::Debug for EntityValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityValue::Typed(record) => f
                .debug_tuple("Typed")
                .field(&record.table_name())
                .finish(),
            EntityValue::Generic(map) => f.debug_tuple("Generic").field(map).finish(),
        }
    }
}

pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
