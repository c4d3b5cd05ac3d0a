use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, TransactionRequest, U256};
use tracing::instrument;
use url::Url;

use crate::{nonces_calldata, ChainError, ChainResult};

/// Reads the next expected nonce of a user from a forwarder contract.
#[async_trait]
pub trait ForwarderNonces: Send + Sync {
    /// `forwarder.nonces(owner)`
    async fn nonce_of(&self, forwarder: Address, owner: Address) -> ChainResult<U256>;
}

/// [`ForwarderNonces`] over a JSON-RPC `eth_call`.
#[derive(Debug, Clone)]
pub struct RpcForwarderNonces {
    provider: Provider<Http>,
}

impl RpcForwarderNonces {
    /// Connect to the RPC at `url`
    pub fn new(url: &str) -> ChainResult<Self> {
        let url: Url = url.parse()?;
        Ok(Self {
            provider: Provider::new(Http::new(url)),
        })
    }
}

#[async_trait]
impl ForwarderNonces for RpcForwarderNonces {
    #[instrument(skip(self), err)]
    async fn nonce_of(&self, forwarder: Address, owner: Address) -> ChainResult<U256> {
        let tx = TransactionRequest::new()
            .to(forwarder)
            .data(nonces_calldata(owner));
        let output = self.provider.call(&tx.into(), None).await?;
        decode_uint_word(&output)
    }
}

/// Decode a single `uint256` return value.
pub(crate) fn decode_uint_word(output: &[u8]) -> ChainResult<U256> {
    if output.len() < 32 {
        return Err(ChainError::MalformedResponse(format!(
            "expected a 32 byte word, got 0x{}",
            hex::encode(output)
        )));
    }
    Ok(U256::from_big_endian(&output[..32]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_big_endian_word() {
        let mut word = [0u8; 32];
        word[31] = 5;
        word[30] = 1;
        assert_eq!(decode_uint_word(&word).unwrap(), U256::from(261));
    }

    #[test]
    fn rejects_short_output() {
        let err = decode_uint_word(&[]).unwrap_err();
        assert!(matches!(err, ChainError::MalformedResponse(_)));
    }

    #[test]
    fn rejects_bad_url() {
        assert!(RpcForwarderNonces::new("not a url").is_err());
    }
}
