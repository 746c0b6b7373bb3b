//! Transaction scope
//!
//! Every public graph operation takes `&mut Transaction`. An operation that
//! calls another one passes the same transaction down, so the whole call tree
//! shares one atomic unit instead of committing pieces independently.

use super::traits::{GraphStore, GraphTxn};
use crate::error::Result;
use futures::future::BoxFuture;

/// An open, explicitly threaded transaction.
pub struct Transaction {
    txn: Box<dyn GraphTxn>,
    backend: &'static str,
    operations: usize,
}

impl Transaction {
    /// Open a fresh transaction on the store
    pub async fn begin(store: &dyn GraphStore) -> Result<Self> {
        let txn = store.begin().await?;
        tracing::trace!(backend = store.backend(), "Transaction opened");
        Ok(Self {
            txn,
            backend: store.backend(),
            operations: 0,
        })
    }

    /// Access the underlying store transaction for one operation
    pub(crate) fn store(&mut self) -> &mut dyn GraphTxn {
        self.operations += 1;
        self.txn.as_mut()
    }

    /// Number of store operations issued so far
    pub fn operations(&self) -> usize {
        self.operations
    }

    pub async fn commit(self) -> Result<()> {
        self.txn.commit().await?;
        tracing::debug!(
            backend = self.backend,
            operations = self.operations,
            "Transaction committed"
        );
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.txn.rollback().await?;
        tracing::debug!(
            backend = self.backend,
            operations = self.operations,
            "Transaction rolled back"
        );
        Ok(())
    }

    /// Commit on `Ok`, roll back on `Err` and return the original error.
    pub async fn finish<T>(self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(e) => {
                let backend = self.backend;
                if let Err(rollback_err) = self.rollback().await {
                    tracing::warn!(
                        backend,
                        error = %rollback_err,
                        "Rollback failed after error"
                    );
                }
                Err(e)
            }
        }
    }
}

/// Run `f` inside a fresh transaction, committed if it succeeds and rolled
/// back otherwise.
///
/// The closure must own what it captures:
///
/// ```ignore
/// let node = with_transaction(store, |tx| {
///     Box::pin(async move { resources::add(tx, NewNode::new().id("db")).await })
/// })
/// .await?;
/// ```
pub async fn with_transaction<T, F>(store: &dyn GraphStore, f: F) -> Result<T>
where
    F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T>>,
{
    let mut tx = Transaction::begin(store).await?;
    let result = f(&mut tx).await;
    tx.finish(result).await
}
