use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::{MessageBody, QueueMessage, QueueResult, ReceiptHandle};

/// Durable at-least-once hand-off between admission and the consumer.
///
/// A received message stays invisible to other receivers for the visibility
/// timeout. Unless it is acknowledged within that window it becomes visible
/// again with a new receipt handle, until the broker dead-letters it after
/// [`ChannelPolicy::max_receive_count`] deliveries.
#[async_trait]
pub trait QueueChannel: Send + Sync {
    /// Publish a message, returning the broker's message id
    async fn enqueue(&self, body: &MessageBody) -> QueueResult<String>;

    /// Long-poll for up to `max_messages` messages, waiting at most `wait`.
    /// Returns an empty batch when nothing arrived in time.
    async fn receive(&self, max_messages: u32, wait: Duration) -> QueueResult<Vec<QueueMessage>>;

    /// Delete one delivery. A stale handle yields `QueueError::HandleNotFound`.
    async fn acknowledge(&self, receipt_handle: &ReceiptHandle) -> QueueResult<()>;
}

/// Receive and redelivery parameters of a queue channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChannelPolicy {
    /// Messages fetched per receive call
    pub max_messages: u32,
    /// Long-poll wait per receive call, in seconds
    pub wait_seconds: u64,
    /// How long a received message stays invisible, in seconds
    pub visibility_timeout_seconds: u64,
    /// Deliveries before the message is moved to the dead-letter channel
    pub max_receive_count: u32,
}

impl Default for ChannelPolicy {
    fn default() -> Self {
        Self {
            max_messages: 10,
            wait_seconds: 20,
            visibility_timeout_seconds: 60,
            max_receive_count: 3,
        }
    }
}

impl ChannelPolicy {
    /// Long-poll wait as a duration
    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_seconds)
    }

    /// Visibility timeout as a duration
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_seconds)
    }

    /// How long a consumer may work on one delivery. Ends
    /// [`VISIBILITY_MARGIN`] before the message can be redelivered.
    pub fn processing_budget(&self) -> Duration {
        self.visibility_timeout().saturating_sub(VISIBILITY_MARGIN)
    }
}

/// Time kept back from the visibility timeout for the store update and
/// acknowledgement after a delivery is processed.
pub const VISIBILITY_MARGIN: Duration = Duration::from_secs(5);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_budget_ends_before_redelivery() {
        let policy = ChannelPolicy::default();
        assert_eq!(policy.processing_budget(), Duration::from_secs(55));
        assert!(policy.processing_budget() < policy.visibility_timeout());

        let tiny = ChannelPolicy {
            visibility_timeout_seconds: 2,
            ..policy
        };
        assert_eq!(tiny.processing_budget(), Duration::ZERO);
    }
}
