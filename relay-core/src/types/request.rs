use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use super::serde_u256;

/// How aggressively the executor should price the transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Speed {
    /// Cheapest, slowest
    SafeLow,
    /// Network average
    Average,
    /// Above average
    #[default]
    Fast,
    /// Highest price
    Fastest,
}

/// A plain call the executor signs and sends itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectRequest {
    /// Target contract or account
    pub to: Address,
    /// Call data
    #[serde(default)]
    pub data: Bytes,
    /// Native value to send. Zero when absent.
    #[serde(
        default,
        with = "serde_u256::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<U256>,
    /// Gas limit. The submission client applies a floor when absent.
    #[serde(
        default,
        with = "serde_u256::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub gas_limit: Option<U256>,
    /// Pricing speed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<Speed>,
}

/// The forward-request tuple a user signs off-chain for an ERC-2771 forwarder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardRequest {
    /// The user the call is executed on behalf of; must be the signer
    pub from: Address,
    /// Target contract
    pub to: Address,
    /// Native value forwarded with the inner call
    #[serde(with = "serde_u256")]
    pub value: U256,
    /// Gas for the inner call
    #[serde(with = "serde_u256")]
    pub gas: U256,
    /// Must equal the forwarder's current nonce for `from`
    #[serde(with = "serde_u256")]
    pub nonce: U256,
    /// Unix timestamp in seconds (uint48 on-chain)
    pub deadline: u64,
    /// Inner call data
    #[serde(default)]
    pub data: Bytes,
}

/// A forward request together with the user's EIP-712 signature over it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsoredRequest {
    /// The signed request
    pub request: ForwardRequest,
    /// 65-byte `r || s || v` signature
    pub signature: Bytes,
}
