//! Core types and collaborator interfaces shared by every relay crate.
//!
//! Nothing in here talks to a network. The chain, executor and broker
//! integrations live in their own crates and plug in through the traits
//! exported from [`traits`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub use ethers::types::{Address, Bytes, H256, U256};

pub use error::*;
pub use traits::*;
pub use types::*;

mod error;
/// Interfaces to the transaction store and the queue channel
pub mod traits;
/// Domain types: transactions, request payloads and queue envelopes
pub mod types;
