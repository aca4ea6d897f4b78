//! Transaction scopes with automatic lifecycle management.
//!
//! [`Engine::transaction`] begins a transaction, hands the body an engine
//! bound to it, and then:
//! - commits if the body returns `Ok`
//! - rolls back if the body returns `Err`, returning the body's error
//!
//! A rollback that itself fails is logged and its error returned in place
//! of the body's error.

use std::future::Future;
use std::sync::Arc;

use fpm_orm_data::{DataError, DataResult};
use tokio::sync::Mutex;

use crate::engine::{Conn, Engine};
use crate::error::SqlxErrorExt;

impl Engine {
    /// Run `body` inside a transaction.
    ///
    /// On a handle that is already bound to a transaction the body joins
    /// it: it runs on the same handle and the outermost scope decides
    /// whether to commit.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let id = engine
    ///     .transaction(|tx| async move {
    ///         let id = tx.insert(&fake).await?;
    ///         tx.updates(&Base::new("fake").condition("id = ?", [id]), &fields).await?;
    ///         Ok(id)
    ///     })
    ///     .await?;
    /// ```
    pub async fn transaction<F, Fut, T>(&self, body: F) -> DataResult<T>
    where
        F: FnOnce(Engine) -> Fut,
        Fut: Future<Output = DataResult<T>>,
    {
        let pool = match &self.conn {
            Conn::Pool(pool) => pool,
            Conn::Tx(_) => {
                tracing::debug!("Joining enclosing transaction");
                return body(self.clone()).await;
            }
        };

        let tx = pool.begin().await.map_err(SqlxErrorExt::into_data_error)?;
        tracing::debug!("Transaction started");
        let shared = Arc::new(Mutex::new(Some(tx)));
        let scoped = Engine {
            conn: Conn::Tx(shared.clone()),
            options: self.options.clone(),
        };

        let result = body(scoped).await;

        let tx = shared.lock().await.take();
        let Some(tx) = tx else {
            return Err(DataError::Other("transaction already finished".into()));
        };
        match result {
            Ok(value) => {
                tx.commit().await.map_err(SqlxErrorExt::into_data_error)?;
                tracing::debug!("Transaction committed");
                Ok(value)
            }
            Err(err) => match tx.rollback().await {
                Ok(()) => {
                    tracing::debug!(error = %err, "Transaction rolled back");
                    Err(err)
                }
                Err(rollback) => {
                    tracing::error!(error = %rollback, cause = %err, "Transaction rollback failed");
                    Err(rollback.into_data_error())
                }
            },
        }
    }
}
