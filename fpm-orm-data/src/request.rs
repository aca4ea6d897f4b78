//! Translation of loosely typed request parameters into a [`Query`].

use serde::Deserialize;

use crate::entity::json_kind;
use crate::error::{DataError, DataResult};
use crate::page::Pager;
use crate::query::{Field, Query, Sorter};
use crate::sql::{checked_identifier, Dialect};
use crate::value::Value;

/// The parameter bag accepted by the named operations.
///
/// ```json
/// {"table": "fake", "condition": {"name": "c"}, "fields": "id,name,createAt",
///  "skip": 0, "limit": 10, "sort": "id-"}
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QueryRequest {
    pub table: String,
    /// A predicate string, or an object of column -> equality value.
    pub condition: Option<serde_json::Value>,
    /// Comma-separated projection list.
    pub fields: Option<String>,
    pub skip: i64,
    /// `0` (absent) leaves the window unbounded.
    pub limit: i64,
    /// Write payload for `create` / `update`.
    pub row: Option<serde_json::Value>,
    pub id: Option<serde_json::Value>,
    /// A column with an optional `+` / `-` suffix.
    pub sort: Option<String>,
}

impl QueryRequest {
    pub fn from_params(params: serde_json::Value) -> DataResult<Self> {
        serde_json::from_value(params)
            .map_err(|e| DataError::Validation(format!("malformed request: {e}")))
    }

    /// Whether the request narrows the rows it targets.
    pub fn has_predicate(&self) -> bool {
        self.id.as_ref().is_some_and(|id| !id.is_null())
            || match &self.condition {
                Some(serde_json::Value::String(s)) => !s.trim().is_empty(),
                Some(serde_json::Value::Object(o)) => !o.is_empty(),
                _ => false,
            }
    }

    /// Build the descriptor. Columns named by an object condition are
    /// validated and quoted for `dialect`.
    pub fn to_query(&self, dialect: Dialect) -> DataResult<Query> {
        let mut query = Query::new(self.table.trim());

        if self.limit != 0 {
            // Negative windows are treated as "from the start" / "no limit".
            query = query.pager(Pager::new(self.skip.max(0), self.limit.max(-1))?);
        }

        if let Some(fields) = &self.fields {
            query = query.fields(parse_fields(fields));
        }

        match &self.condition {
            None | Some(serde_json::Value::Null) => {}
            Some(serde_json::Value::String(condition)) => {
                query = query.condition(condition.clone(), Vec::<Value>::new());
            }
            Some(serde_json::Value::Object(pairs)) => {
                let mut clauses = Vec::with_capacity(pairs.len());
                let mut args = Vec::with_capacity(pairs.len());
                for (column, value) in pairs {
                    let column = checked_identifier(column, false, "condition column", dialect)?;
                    match Value::from_json(value.clone()) {
                        Value::Null => clauses.push(format!("{column} IS NULL")),
                        value => {
                            clauses.push(format!("{column} = ?"));
                            args.push(value);
                        }
                    }
                }
                if !clauses.is_empty() {
                    query = query.condition(clauses.join(" AND "), args);
                }
            }
            Some(other) => {
                return Err(DataError::Validation(format!(
                    "unsupported condition shape: {}",
                    json_kind(other)
                )));
            }
        }

        if let Some(id) = self.id.clone().filter(|id| !id.is_null()) {
            query = query.condition("id = ?", [Value::from_json(id)]);
        }

        if let Some(sort) = self.sort.as_deref().filter(|s| !s.trim().is_empty()) {
            query = query.sorter(Sorter::parse(sort));
        }

        Ok(query)
    }
}

/// Split a comma-separated field list, expanding the `createAt` /
/// `updateAt` virtual fields into the timestamp column plus its epoch
/// millisecond form.
fn parse_fields(fields: &str) -> Vec<Field> {
    let mut out = Vec::new();
    for field in fields.split(',').map(str::trim).filter(|f| !f.is_empty()) {
        let column = match field {
            "createAt" => Some("created_at"),
            "updateAt" => Some("updated_at"),
            _ => None,
        };
        match column {
            Some(column) => {
                out.push(Field::from(column));
                out.push(Field::EpochMillis {
                    column: column.to_string(),
                    alias: field.to_string(),
                });
            }
            None => out.push(Field::from(field)),
        }
    }
    out
}
