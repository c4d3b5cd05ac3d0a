//! Ethereum side of the relay: ERC-2771 forwarder encoding, forwarder nonce
//! reads and off-chain validation of sponsored meta-transactions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub use error::*;
pub use forwarder::*;
pub use nonce::*;
pub use validator::*;

mod error;
mod forwarder;
mod nonce;
mod validator;
