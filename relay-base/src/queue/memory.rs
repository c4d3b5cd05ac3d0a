use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use relay_core::{
    ChannelPolicy, MessageBody, QueueChannel, QueueError, QueueMessage, QueueResult,
    ReceiptHandle,
};
use tokio::sync::{Mutex, Notify};
use tokio::time::{sleep_until, Instant};
use tracing::warn;

#[derive(Debug)]
struct StoredMessage {
    id: String,
    body: String,
    receive_count: u32,
    invisible_until: Option<Instant>,
    receipt_handle: Option<ReceiptHandle>,
}

impl StoredMessage {
    fn is_visible(&self, now: Instant) -> bool {
        self.invisible_until.map_or(true, |until| until <= now)
    }
}

/// A message moved aside after too many deliveries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    /// Original message id
    pub message_id: String,
    /// Raw body
    pub body: String,
    /// Deliveries made before it was moved
    pub receive_count: u32,
}

#[derive(Debug, Default)]
struct QueueState {
    next_id: u64,
    messages: VecDeque<StoredMessage>,
    dead_letters: Vec<DeadLetter>,
}

impl QueueState {
    fn next_visible_at(&self) -> Option<Instant> {
        self.messages.iter().filter_map(|m| m.invisible_until).min()
    }
}

/// In-process [`QueueChannel`] with the same delivery semantics as the
/// broker: visibility timeout, a fresh receipt handle per delivery and
/// dead-lettering after `max_receive_count` deliveries.
#[derive(Debug)]
pub struct MemoryQueue {
    policy: ChannelPolicy,
    state: Mutex<QueueState>,
    arrivals: Notify,
}

impl MemoryQueue {
    /// An empty queue
    pub fn new(policy: ChannelPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(QueueState::default()),
            arrivals: Notify::new(),
        }
    }

    /// The channel parameters
    pub fn policy(&self) -> ChannelPolicy {
        self.policy
    }

    /// Publish a raw body without validating it
    pub async fn push_raw(&self, body: impl Into<String>) -> String {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = format!("msg-{}", state.next_id);
        state.messages.push_back(StoredMessage {
            id: id.clone(),
            body: body.into(),
            receive_count: 0,
            invisible_until: None,
            receipt_handle: None,
        });
        drop(state);
        self.arrivals.notify_waiters();
        id
    }

    /// Messages not yet acknowledged or dead-lettered, in flight or not
    pub async fn len(&self) -> usize {
        self.state.lock().await.messages.len()
    }

    /// Whether every message was acknowledged or dead-lettered
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.messages.is_empty()
    }

    /// Messages moved to the dead-letter channel so far
    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().await.dead_letters.clone()
    }

    async fn take_visible(&self, max_messages: usize) -> (Vec<QueueMessage>, Option<Instant>) {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let mut batch = vec![];
        let mut i = 0;
        while i < state.messages.len() && batch.len() < max_messages {
            if !state.messages[i].is_visible(now) {
                i += 1;
                continue;
            }
            if state.messages[i].receive_count >= self.policy.max_receive_count {
                if let Some(dead) = state.messages.remove(i) {
                    warn!(
                        message_id = dead.id,
                        receive_count = dead.receive_count,
                        "Moving message to dead-letter channel"
                    );
                    state.dead_letters.push(DeadLetter {
                        message_id: dead.id,
                        body: dead.body,
                        receive_count: dead.receive_count,
                    });
                }
                continue;
            }
            let msg = &mut state.messages[i];
            msg.receive_count += 1;
            msg.invisible_until = Some(now + self.policy.visibility_timeout());
            let handle = ReceiptHandle::new(format!("{}#{}", msg.id, msg.receive_count));
            msg.receipt_handle = Some(handle.clone());
            batch.push(QueueMessage {
                message_id: msg.id.clone(),
                body: msg.body.clone(),
                receipt_handle: handle,
                receive_count: msg.receive_count,
            });
            i += 1;
        }
        (batch, state.next_visible_at())
    }
}

#[async_trait]
impl QueueChannel for MemoryQueue {
    async fn enqueue(&self, body: &MessageBody) -> QueueResult<String> {
        Ok(self.push_raw(body.to_json()?).await)
    }

    async fn receive(&self, max_messages: u32, wait: Duration) -> QueueResult<Vec<QueueMessage>> {
        let deadline = Instant::now() + wait;
        let max_messages = max_messages.max(1) as usize;
        loop {
            // registered before looking so an enqueue in between isn't missed
            let arrival = self.arrivals.notified();
            let (batch, next_visible_at) = self.take_visible(max_messages).await;
            if !batch.is_empty() || Instant::now() >= deadline {
                return Ok(batch);
            }
            let wake_at = next_visible_at.map_or(deadline, |t| t.min(deadline));
            tokio::select! {
                _ = arrival => {}
                _ = sleep_until(wake_at) => {}
            }
        }
    }

    async fn acknowledge(&self, receipt_handle: &ReceiptHandle) -> QueueResult<()> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let position = state.messages.iter().position(|m| {
            m.receipt_handle.as_ref() == Some(receipt_handle) && !m.is_visible(now)
        });
        match position {
            Some(i) => {
                state.messages.remove(i);
                Ok(())
            }
            None => Err(QueueError::HandleNotFound),
        }
    }
}
