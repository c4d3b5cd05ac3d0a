//! Shared plumbing for relay agents: settings, tracing, storage backends,
//! queue backends and the metrics server.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Transaction store backends
pub mod db;
/// Queue channel backends
pub mod queue;
/// HTTP server exposing prometheus metrics
pub mod server;
/// Agent settings and tracing configuration
pub mod settings;

pub use db::*;
pub use queue::*;
pub use settings::*;
