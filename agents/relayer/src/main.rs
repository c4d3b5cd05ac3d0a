//! Relays queued transactions to the execution backend.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use eyre::Result;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    // Logging is not initialised at this point, so, using `println!`
    println!("Relayer starting up...");

    relayer::relayer_main().await
}
