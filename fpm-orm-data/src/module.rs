//! Named-operation dispatch for hosts that drive the data layer with
//! loosely typed parameters.
//!
//! | Operation | Result |
//! |-----------|--------|
//! | `find` | array of rows |
//! | `findAndCount` | `{"count": n, "rows": [...]}` |
//! | `count` | number |
//! | `first` / `get` | object, `{}` when nothing matches |
//! | `remove` / `clear` | affected rows |
//! | `create` | `{"id": n}` |
//! | `update` | affected rows |

use std::fmt;
use std::str::FromStr;

use serde_json::json;

use crate::entity::{json_kind, EntityValue};
use crate::error::{DataError, DataResult};
use crate::repository::Database;
use crate::request::QueryRequest;
use crate::value::{FieldMap, GenericRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Find,
    FindAndCount,
    Count,
    First,
    Get,
    Remove,
    Clear,
    Create,
    Update,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::Find,
        Operation::FindAndCount,
        Operation::Count,
        Operation::First,
        Operation::Get,
        Operation::Remove,
        Operation::Clear,
        Operation::Create,
        Operation::Update,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::Find => "find",
            Operation::FindAndCount => "findAndCount",
            Operation::Count => "count",
            Operation::First => "first",
            Operation::Get => "get",
            Operation::Remove => "remove",
            Operation::Clear => "clear",
            Operation::Create => "create",
            Operation::Update => "update",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| DataError::Validation(format!("unknown operation: {s}")))
    }
}

/// Exposes a [`Database`] through the named operations.
#[derive(Debug, Clone)]
pub struct OrmModule<D> {
    db: D,
}

impl<D: Database> OrmModule<D> {
    pub fn new(db: D) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    /// The operation names a host should register.
    pub fn names() -> Vec<&'static str> {
        Operation::ALL.iter().map(|op| op.name()).collect()
    }

    /// Parse `op` and run it with `params`.
    pub async fn execute(&self, op: &str, params: serde_json::Value) -> DataResult<serde_json::Value> {
        let op: Operation = op.parse()?;
        let request = QueryRequest::from_params(params)?;
        self.dispatch(op, &request).await
    }

    pub async fn dispatch(&self, op: Operation, request: &QueryRequest) -> DataResult<serde_json::Value> {
        tracing::debug!(operation = %op, table = %request.table, "Dispatching data operation");
        let query = request.to_query(self.db.dialect())?;
        match op {
            Operation::Find => {
                let rows = self.db.find_object(&query).await?;
                Ok(rows_to_json(rows))
            }
            Operation::FindAndCount => {
                let page = self.db.find_and_count_object(&query).await?;
                Ok(json!({"count": page.count, "rows": rows_to_json(page.rows)}))
            }
            Operation::Count => Ok(json!(self.db.count(query.base()).await?)),
            Operation::Get if request.id.as_ref().map_or(true, |id| id.is_null()) => {
                Err(DataError::validation("get requires an id"))
            }
            Operation::First | Operation::Get => {
                let row = self.db.first_object(&query).await?;
                Ok(row.map(|r| r.to_json()).unwrap_or_else(|| json!({})))
            }
            Operation::Remove => {
                if !request.has_predicate() {
                    return Err(DataError::validation(
                        "remove requires a condition or an id; use clear to remove every row",
                    ));
                }
                Ok(json!(self.db.remove(query.base()).await?))
            }
            Operation::Clear => Ok(json!(self.db.remove(query.base()).await?)),
            Operation::Create => {
                let row = request
                    .row
                    .clone()
                    .ok_or_else(|| DataError::validation("create requires a row"))?;
                let entity = EntityValue::from_json(row)?;
                let id = self.db.create(query.base(), entity).await?;
                Ok(json!({ "id": id }))
            }
            Operation::Update => {
                let fields = match request.row.clone() {
                    Some(serde_json::Value::Object(object)) => FieldMap::from_json_object(object),
                    Some(other) => return Err(DataError::UnknownDataType(json_kind(&other).to_string())),
                    None => return Err(DataError::validation("update requires a row")),
                };
                Ok(json!(self.db.updates(query.base(), &fields).await?))
            }
        }
    }
}

fn rows_to_json(rows: Vec<GenericRow>) -> serde_json::Value {
    serde_json::Value::Array(rows.iter().map(GenericRow::to_json).collect())
}
