use std::error::Error as StdError;

use crate::{TransactionId, TransactionStatus};

/// Errors raised by a [`crate::TransactionStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No transaction with this id exists
    #[error("transaction {0} not found")]
    NotFound(TransactionId),
    /// A transaction with this id already exists
    #[error("transaction {0} already exists")]
    DuplicateId(TransactionId),
    /// The transaction already reached a terminal status and can't change again
    #[error("transaction {id} is already {status}")]
    AlreadyTerminal {
        /// Transaction id
        id: TransactionId,
        /// The terminal status it holds
        status: TransactionStatus,
    },
    /// Only terminal statuses can be written by an update
    #[error("transaction {id} can't be moved back to {status}")]
    InvalidTransition {
        /// Transaction id
        id: TransactionId,
        /// The requested status
        status: TransactionStatus,
    },
    /// Failed to (de)serialize a stored record
    #[error("failed to encode or decode a stored transaction: {0}")]
    Encoding(#[from] serde_json::Error),
    /// The storage backend failed
    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn StdError + Send + Sync>),
}

/// Errors raised by a [`crate::QueueChannel`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The receipt handle is unknown, already used, or its visibility window expired
    #[error("receipt handle not found or no longer valid")]
    HandleNotFound,
    /// The message body couldn't be serialized
    #[error("failed to encode message body: {0}")]
    Encode(#[from] serde_json::Error),
    /// The broker rejected the call or could not be reached
    #[error("queue transport error: {0}")]
    Transport(#[source] Box<dyn StdError + Send + Sync>),
}

/// A queue message body that can't be turned into a [`crate::MessageBody`].
/// Redelivering it will never help.
#[derive(Debug, thiserror::Error)]
pub enum MessageParseError {
    /// The body is not valid JSON or doesn't have the expected shape
    #[error("malformed message body: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Result alias for store calls
pub type StoreResult<T> = Result<T, StoreError>;

/// Result alias for queue calls
pub type QueueResult<T> = Result<T, QueueError>;
