use async_trait::async_trait;
use ethers::types::H256;

use crate::{StoreResult, Transaction, TransactionId, TransactionStatus};

/// Durable record of every relayed transaction.
///
/// `update_status` only ever moves a `queued` transaction into a terminal
/// status; implementations reject anything else with
/// [`crate::StoreError::AlreadyTerminal`] or
/// [`crate::StoreError::InvalidTransition`].
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Look up a transaction by id
    async fn find_by_id(&self, id: &TransactionId) -> StoreResult<Option<Transaction>>;

    /// Persist a new transaction. Fails with `DuplicateId` if the id is taken.
    async fn insert(&self, transaction: &Transaction) -> StoreResult<()>;

    /// Record the terminal outcome of a transaction
    async fn update_status(
        &self,
        id: &TransactionId,
        status: TransactionStatus,
        hash: Option<H256>,
        result: Option<serde_json::Value>,
    ) -> StoreResult<()>;
}
