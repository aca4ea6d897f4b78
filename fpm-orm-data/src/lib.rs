pub mod entity;
pub mod error;
pub mod migration;
pub mod module;
pub mod page;
pub mod query;
pub mod repository;
pub mod request;
pub mod schema;
pub mod sql;
pub mod value;
pub mod writer;

pub use entity::{Entity, EntityValue, Record};
pub use error::{DataError, DataResult};
pub use module::{Operation, OrmModule};
pub use page::{Page, Pager};
pub use query::{Base, Direction, Field, Query, Sorter, TableKind, TAUTOLOGY};
pub use repository::Database;
pub use request::QueryRequest;
pub use schema::{ColumnDef, ColumnType, TableSchema};
pub use sql::{Dialect, Statement};
pub use value::{FieldMap, GenericRow, Value};

pub mod prelude {
    //! Re-exports of the most commonly used data types.
    pub use crate::{
        Base, ColumnType, DataError, DataResult, Database, Direction, Entity, EntityValue,
        FieldMap, GenericRow, Page, Pager, Query, Sorter, TableSchema, Value,
    };
}
