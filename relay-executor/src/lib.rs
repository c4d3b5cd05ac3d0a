//! Client for the transaction execution backend: executor discovery,
//! submission of direct and sponsored transactions and polling until the
//! backend reports a terminal status.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub use api::*;
pub use client::*;
pub use error::*;
pub use types::*;

mod api;
mod client;
mod error;
mod types;
