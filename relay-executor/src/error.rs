/// Errors talking to the execution backend
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The request never got a response
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    /// The backend answered with a non-success status
    #[error("executor backend returned {status}: {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },
    /// The response body didn't have the expected shape
    #[error("unexpected executor response: {0}")]
    Decode(#[from] serde_json::Error),
    /// Discovery returned no executors
    #[error("no executor available")]
    NoExecutorAvailable,
    /// The request can't be expressed to the backend
    #[error("invalid transaction request: {0}")]
    InvalidRequest(String),
    /// The transaction didn't reach a terminal status in time
    #[error("transaction {executor_tx_id} not terminal after {attempts} status checks")]
    PollTimeout {
        /// Backend transaction id
        executor_tx_id: String,
        /// Number of status checks made
        attempts: u32,
    },
}

/// Result alias for executor calls
pub type ExecutorResult<T> = Result<T, ExecutorError>;
