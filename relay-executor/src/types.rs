use ethers::types::{Address, Bytes, H256, U256};
use relay_core::{serde_u256, Speed};
use serde::{Deserialize, Serialize};

/// Every backend response is wrapped in `{"data": ...}`.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    /// The payload
    pub data: T,
}

/// One executor (signing account) known to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecutorInfo {
    /// Id used in the transaction routes
    pub id: String,
    /// Human readable name
    #[serde(default)]
    pub name: Option<String>,
}

/// Body of a transaction submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRequestArgs {
    /// Target address
    pub to: Address,
    /// Call data
    pub data: Bytes,
    /// Native value, as a decimal string
    #[serde(with = "serde_u256")]
    pub value: U256,
    /// Gas limit
    pub gas_limit: u64,
    /// Pricing speed
    pub speed: Speed,
}

/// The submission reply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmittedTransaction {
    /// Backend transaction id
    pub id: String,
}

/// Backend-side transaction status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExecutorTxStatus {
    /// Accepted, not yet sent
    Pending,
    /// Signed and sent
    Sent,
    /// In the mempool
    Submitted,
    /// Included in a block
    Mined,
    /// Included with enough confirmations
    Confirmed,
    /// The backend gave up on it
    Failed,
    /// Included but reverted
    Reverted,
    /// Never included before its validity window closed
    Expired,
    /// Cancelled by the backend operator
    Canceled,
    /// Anything this client doesn't know about yet
    #[serde(other)]
    Unknown,
}

impl ExecutorTxStatus {
    /// The on-chain state of the transaction won't change any more
    pub fn is_terminal(&self) -> bool {
        use ExecutorTxStatus::*;
        matches!(
            self,
            Mined | Confirmed | Failed | Reverted | Expired | Canceled
        )
    }

    /// A terminal status where the call made it on-chain without reverting
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutorTxStatus::Mined | ExecutorTxStatus::Confirmed)
    }
}

/// A transaction as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorTransaction {
    /// Backend transaction id
    pub id: String,
    /// On-chain hash, once sent
    #[serde(default)]
    pub hash: Option<H256>,
    /// Current status
    pub status: ExecutorTxStatus,
    /// Why the backend failed the transaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    /// When the backend accepted it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// When it was broadcast
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<String>,
    /// When it was confirmed on-chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<String>,
}

impl ExecutorTransaction {
    /// Terminal, and carrying a hash when the status is a success. A success
    /// reported before its hash is known isn't settled yet.
    pub fn is_settled(&self) -> bool {
        self.status.is_terminal() && (!self.status.is_success() || self.hash.is_some())
    }
}
