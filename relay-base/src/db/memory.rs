use std::collections::HashMap;

use async_trait::async_trait;
use relay_core::{
    StoreError, StoreResult, Transaction, TransactionId, TransactionStatus, TransactionStore, H256,
};
use tokio::sync::RwLock;

/// [`TransactionStore`] kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryTransactionStore {
    transactions: RwLock<HashMap<TransactionId, Transaction>>,
}

impl MemoryTransactionStore {
    /// An empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored transactions
    pub async fn len(&self) -> usize {
        self.transactions.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.transactions.read().await.is_empty()
    }

    /// Every stored transaction, in no particular order
    pub async fn snapshot(&self) -> Vec<Transaction> {
        self.transactions.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn find_by_id(&self, id: &TransactionId) -> StoreResult<Option<Transaction>> {
        Ok(self.transactions.read().await.get(id).cloned())
    }

    async fn insert(&self, transaction: &Transaction) -> StoreResult<()> {
        let mut transactions = self.transactions.write().await;
        if transactions.contains_key(&transaction.id) {
            return Err(StoreError::DuplicateId(transaction.id.clone()));
        }
        transactions.insert(transaction.id.clone(), transaction.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        id: &TransactionId,
        status: TransactionStatus,
        hash: Option<H256>,
        result: Option<serde_json::Value>,
    ) -> StoreResult<()> {
        let mut transactions = self.transactions.write().await;
        let tx = transactions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        tx.settle(status, hash, result)
    }
}

#[cfg(test)]
mod tests {
    use relay_core::{Address, DirectRequest, RelayRequest};

    use super::*;

    #[tokio::test]
    async fn enforces_store_rules() {
        let store = MemoryTransactionStore::new();
        let tx = Transaction::new(
            "tx-1".into(),
            RelayRequest::Direct(DirectRequest {
                to: Address::zero(),
                data: Default::default(),
                value: None,
                gas_limit: None,
                speed: None,
            }),
        );
        store.insert(&tx).await.unwrap();
        assert!(matches!(
            store.insert(&tx).await,
            Err(StoreError::DuplicateId(_))
        ));
        assert_eq!(store.len().await, 1);

        store
            .update_status(&tx.id, TransactionStatus::Confirmed, None, None)
            .await
            .unwrap();
        assert!(store
            .update_status(&tx.id, TransactionStatus::Failed, None, None)
            .await
            .is_err());
        let stored = store.find_by_id(&tx.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Confirmed);
    }
}
