//! The SQL backend compiled into this crate.
//!
//! Exactly one backend is active: `postgres` when that feature is on,
//! otherwise `sqlite`. Everything else in the crate is written against the
//! aliases below.

use fpm_orm_data::{DataResult, Dialect, Value};
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::error::SqlxErrorExt;

#[cfg(not(any(feature = "sqlite", feature = "postgres")))]
compile_error!("fpm-orm-sqlx needs either the `sqlite` or the `postgres` feature");

#[cfg(feature = "postgres")]
mod active {
    pub type Db = sqlx::Postgres;
    pub type DbConnectOptions = sqlx::postgres::PgConnectOptions;
    pub const DIALECT: fpm_orm_data::Dialect = fpm_orm_data::Dialect::Postgres;
    pub const ENGINE: &str = "postgres";
}

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
mod active {
    pub type Db = sqlx::Sqlite;
    pub type DbConnectOptions = sqlx::sqlite::SqliteConnectOptions;
    pub const DIALECT: fpm_orm_data::Dialect = fpm_orm_data::Dialect::Sqlite;
    pub const ENGINE: &str = "sqlite";
}

pub use active::{Db, DbConnectOptions, DIALECT, ENGINE};

pub type DbRow = <Db as sqlx::Database>::Row;
pub type DbQueryResult = <Db as sqlx::Database>::QueryResult;
pub(crate) type DbQuery<'q> = sqlx::query::Query<'q, Db, <Db as sqlx::Database>::Arguments<'q>>;

/// The dialect the statement builders render for.
pub fn dialect() -> Dialect {
    DIALECT
}

/// Bind one value as the next positional argument.
pub(crate) fn bind_value<'q>(query: DbQuery<'q>, value: &Value) -> DbQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
        Value::Timestamp(ts) => query.bind(*ts),
    }
}

pub(crate) fn bind_all<'q>(mut query: DbQuery<'q>, args: &[Value]) -> DbQuery<'q> {
    for arg in args {
        query = bind_value(query, arg);
    }
    query
}

/// Decode column `idx` of `row` into a [`Value`] driven by the type the
/// driver reports for it.
pub(crate) fn decode(row: &DbRow, idx: usize) -> DataResult<Value> {
    let raw = row.try_get_raw(idx).map_err(SqlxErrorExt::into_data_error)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let value_type = raw.type_info().name().to_ascii_uppercase();
    let declared = row.column(idx).type_info().name().to_ascii_uppercase();
    decode_typed(row, idx, &value_type, &declared)
}

#[cfg(feature = "postgres")]
fn decode_typed(row: &DbRow, idx: usize, value_type: &str, _declared: &str) -> DataResult<Value> {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
    use sqlx::types::{Decimal, JsonValue, Uuid};

    let value = match value_type {
        "BOOL" => Value::Bool(get(row, idx)?),
        "INT2" => Value::Int(get::<i16>(row, idx)?.into()),
        "INT4" => Value::Int(get::<i32>(row, idx)?.into()),
        "INT8" => Value::Int(get(row, idx)?),
        "FLOAT4" => Value::Float(get::<f32>(row, idx)?.into()),
        "FLOAT8" => Value::Float(get(row, idx)?),
        "BYTEA" => Value::Bytes(get(row, idx)?),
        "TIMESTAMPTZ" => Value::Timestamp(get::<DateTime<Utc>>(row, idx)?),
        "TIMESTAMP" => Value::Timestamp(get::<NaiveDateTime>(row, idx)?.and_utc()),
        "DATE" => Value::Text(get::<NaiveDate>(row, idx)?.to_string()),
        "TIME" => Value::Text(get::<NaiveTime>(row, idx)?.to_string()),
        // Kept as text so precision survives.
        "NUMERIC" => Value::Text(get::<Decimal>(row, idx)?.to_string()),
        "UUID" => Value::Text(get::<Uuid>(row, idx)?.to_string()),
        "JSON" | "JSONB" => Value::Text(get::<JsonValue>(row, idx)?.to_string()),
        _ => fallback(row, idx)?,
    };
    Ok(value)
}

/// Columns of any other type: text-like types decode as strings, the rest
/// are taken from the raw value instead of failing the whole row.
#[cfg(feature = "postgres")]
fn fallback(row: &DbRow, idx: usize) -> DataResult<Value> {
    use sqlx::postgres::PgValueFormat;

    let raw = row.try_get_raw(idx).map_err(SqlxErrorExt::into_data_error)?;
    if <String as sqlx::Type<Db>>::compatible(&raw.type_info()) {
        return Ok(Value::Text(get(row, idx)?));
    }
    let text_format = matches!(raw.format(), PgValueFormat::Text);
    let bytes = raw
        .as_bytes()
        .map_err(|e| fpm_orm_data::DataError::Other(format!("column {idx}: {e}")))?;
    Ok(raw_value(bytes, text_format))
}

/// A value in the text wire format is the column's SQL literal; a binary
/// one is only meaningful as bytes.
#[cfg(any(test, feature = "postgres"))]
fn raw_value(bytes: &[u8], text_format: bool) -> Value {
    match std::str::from_utf8(bytes) {
        Ok(text) if text_format => Value::Text(text.to_string()),
        _ => Value::Bytes(bytes.to_vec()),
    }
}

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
fn decode_typed(row: &DbRow, idx: usize, value_type: &str, declared: &str) -> DataResult<Value> {
    // Non-null values report their storage class; the declared column type
    // only distinguishes booleans stored as integers.
    let value = match (value_type, declared) {
        ("INTEGER", "BOOLEAN") => Value::Bool(get(row, idx)?),
        ("INTEGER", _) => Value::Int(get(row, idx)?),
        ("REAL", _) => Value::Float(get(row, idx)?),
        ("BLOB", _) => Value::Bytes(get(row, idx)?),
        ("TEXT", _) => Value::Text(get(row, idx)?),
        (other, _) => {
            return Err(fpm_orm_data::DataError::Other(format!(
                "unsupported column type {other} at index {idx}"
            )))
        }
    };
    Ok(value)
}

fn get<'r, T>(row: &'r DbRow, idx: usize) -> DataResult<T>
where
    T: sqlx::Decode<'r, Db> + sqlx::Type<Db>,
{
    row.try_get(idx).map_err(SqlxErrorExt::into_data_error)
}
