//! The relay agent. Admission validates requests and queues them; the
//! consumer loop submits queued transactions to the execution backend and
//! records their outcome.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub use admission::*;
pub use consumer::*;
pub use metrics::*;
pub use relayer::*;

mod admission;
mod consumer;
mod metrics;
mod relayer;

#[cfg(test)]
mod test_utils;
