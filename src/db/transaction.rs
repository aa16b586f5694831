/*!
 * Transaction Helper Utilities
 *
 * Runs a unit of work inside a database transaction: committed when the
 * closure returns `Ok`, rolled back otherwise.
 */

use metrics::counter;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionError, TransactionTrait};
use std::future::Future;
use std::pin::Pin;
use tracing::warn;

use crate::errors::ServiceError;

/// Type alias for boxed future used in transactions
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Execute a function within a database transaction
///
/// The closure's own `ServiceError` is returned unchanged on rollback, so
/// callers can still tell input errors from database errors.
///
/// # Example
///
/// ```rust,ignore
/// use crate::db::transaction::with_transaction;
///
/// let inserted = with_transaction(&db, |txn| {
///     Box::pin(async move {
///         forecast::Entity::delete_many().exec(txn).await?;
///         forecast::Entity::insert_many(rows).exec(txn).await?;
///         Ok(count)
///     })
/// }).await?;
/// ```
pub async fn with_transaction<F, T>(db: &DatabaseConnection, f: F) -> Result<T, ServiceError>
where
    F: for<'a> FnOnce(&'a DatabaseTransaction) -> BoxFuture<'a, Result<T, ServiceError>> + Send,
    T: Send,
{
    let result = db.transaction::<_, T, ServiceError>(f).await;

    match result {
        Ok(value) => {
            counter!("revenue_forecast_db.transactions_committed", 1);
            Ok(value)
        }
        Err(TransactionError::Connection(db_err)) => {
            counter!("revenue_forecast_db.transactions_failed", 1);
            warn!("Transaction could not be started or committed: {}", db_err);
            Err(ServiceError::DatabaseError(db_err))
        }
        Err(TransactionError::Transaction(err)) => {
            counter!("revenue_forecast_db.transactions_rolled_back", 1);
            warn!("Transaction rolled back: {}", err);
            Err(err)
        }
    }
}
