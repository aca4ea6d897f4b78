use crate::entity::EntityValue;
use crate::error::DataError;
use crate::page::Page;
use crate::query::{Base, Query};
use crate::sql::Dialect;
use crate::value::{FieldMap, GenericRow};
use std::future::Future;

/// The generic-row operations a backend exposes to the named-operation
/// dispatcher.
///
/// Uses RPITIT (return-position `impl Trait` in traits), so no `async-trait`
/// is needed.
pub trait Database: Send + Sync {
    /// The SQL dialect statements are rendered for.
    fn dialect(&self) -> Dialect;

    fn find_object(&self, query: &Query) -> impl Future<Output = Result<Vec<GenericRow>, DataError>> + Send;

    /// The first matching row, or `None`.
    fn first_object(&self, query: &Query) -> impl Future<Output = Result<Option<GenericRow>, DataError>> + Send;

    fn count(&self, base: &Base) -> impl Future<Output = Result<u64, DataError>> + Send;

    /// Rows of the current window plus the total number of matches.
    fn find_and_count_object(&self, query: &Query) -> impl Future<Output = Result<Page<GenericRow>, DataError>> + Send {
        async move {
            let count = self.count(query.base()).await?;
            let rows = self.find_object(query).await?;
            Ok(Page::new(rows, count))
        }
    }

    /// Insert a row and return its id when the backend reports one.
    fn create(&self, base: &Base, entity: EntityValue<'_>) -> impl Future<Output = Result<Option<i64>, DataError>> + Send;

    fn remove(&self, base: &Base) -> impl Future<Output = Result<u64, DataError>> + Send;

    fn updates(&self, base: &Base, fields: &FieldMap) -> impl Future<Output = Result<u64, DataError>> + Send;

    /// Run a statement verbatim.
    fn execute(&self, sql: &str) -> impl Future<Output = Result<u64, DataError>> + Send;
}
