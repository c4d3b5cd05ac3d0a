use async_trait::async_trait;
use relay_core::{
    StoreError, StoreResult, Transaction, TransactionId, TransactionStatus, TransactionStore, H256,
};
use tokio::sync::Mutex;
use tracing::debug;

use crate::DB;

const TRANSACTION_BY_ID: &str = "transaction_by_id_";

/// [`TransactionStore`] persisted in rocksdb as JSON.
#[derive(Debug)]
pub struct RocksTransactionStore {
    db: DB,
    // serializes read-modify-write sequences within this process
    write_lock: Mutex<()>,
}

impl RocksTransactionStore {
    /// Store backed by `db`
    pub fn new(db: DB) -> Self {
        Self {
            db,
            write_lock: Mutex::new(()),
        }
    }

    fn retrieve(&self, id: &TransactionId) -> StoreResult<Option<Transaction>> {
        Ok(self.db.retrieve_json(TRANSACTION_BY_ID, id.as_str())?)
    }

    fn store(&self, tx: &Transaction) -> StoreResult<()> {
        Ok(self.db.store_json(TRANSACTION_BY_ID, tx.id.as_str(), tx)?)
    }
}

#[async_trait]
impl TransactionStore for RocksTransactionStore {
    async fn find_by_id(&self, id: &TransactionId) -> StoreResult<Option<Transaction>> {
        self.retrieve(id)
    }

    async fn insert(&self, transaction: &Transaction) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        if self.retrieve(&transaction.id)?.is_some() {
            return Err(StoreError::DuplicateId(transaction.id.clone()));
        }
        self.store(transaction)?;
        debug!(transaction_id = %transaction.id, kind = %transaction.kind(), "Stored new transaction");
        Ok(())
    }

    async fn update_status(
        &self,
        id: &TransactionId,
        status: TransactionStatus,
        hash: Option<H256>,
        result: Option<serde_json::Value>,
    ) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self
            .retrieve(id)?
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        tx.settle(status, hash, result)?;
        self.store(&tx)?;
        debug!(transaction_id = %id, %status, "Updated transaction status");
        Ok(())
    }
}
