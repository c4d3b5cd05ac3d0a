pub use message::*;
pub use request::*;
pub use transaction::*;

mod message;
mod request;
/// Serde helpers for wide integers carried as strings on the wire
pub mod serde_u256;
mod transaction;
