use ethers::providers::ProviderError;

/// Errors talking to the chain
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The RPC call failed
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// The RPC answered with something that isn't what the contract returns
    #[error("malformed contract response: {0}")]
    MalformedResponse(String),
    /// The RPC url couldn't be used
    #[error("invalid rpc url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Result alias for chain calls
pub type ChainResult<T> = Result<T, ChainError>;
