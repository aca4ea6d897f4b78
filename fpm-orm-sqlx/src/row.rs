//! Row materialization.
//!
//! Typed results go through `sqlx::FromRow`; rows without a record type
//! become a [`GenericRow`] keyed by column name in select-list order.

use fpm_orm_data::{DataResult, GenericRow};
use sqlx::{Column, Row};

use crate::backend::{decode, DbRow};
use crate::error::SqlxErrorExt;

/// Materialize one row as a column-name keyed map.
pub fn generic_row(row: &DbRow) -> DataResult<GenericRow> {
    let mut out = GenericRow::new();
    for (idx, column) in row.columns().iter().enumerate() {
        out.insert(column.name(), decode(row, idx)?);
    }
    Ok(out)
}

/// Materialize one row as a record type.
pub fn typed_row<T>(row: &DbRow) -> DataResult<T>
where
    T: for<'r> sqlx::FromRow<'r, DbRow>,
{
    T::from_row(row).map_err(SqlxErrorExt::into_data_error)
}
