use std::sync::Arc;

use eyre::Result;
use relay_core::QueueChannel;
use tracing::info;

pub use memory::*;
pub use sqs::*;

use crate::{QueueBackend, QueueSettings};

mod memory;
mod sqs;

/// Build the configured queue channel. For SQS the channel policy is written
/// onto the queue before it is used.
pub async fn build_queue(settings: &QueueSettings) -> Result<Arc<dyn QueueChannel>> {
    match settings.backend {
        QueueBackend::Memory => {
            info!("Using in-memory queue, messages won't survive a restart");
            Ok(Arc::new(MemoryQueue::new(settings.policy())))
        }
        QueueBackend::Sqs => {
            let queue = SqsQueue::connect(settings).await?;
            queue.apply_policy().await?;
            info!(queue_url = ?settings.queue_url, "Connected to SQS queue");
            Ok(Arc::new(queue))
        }
    }
}
