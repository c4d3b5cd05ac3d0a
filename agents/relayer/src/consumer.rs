use std::{sync::Arc, time::Duration};

use relay_base::ConsumerSettings;
use relay_core::{
    ChannelPolicy, MessageBody, MessageParseError, QueueChannel, QueueError, QueueMessage,
    ReceiptHandle, RelayRequest, StoreError, TransactionStatus, TransactionStore,
};
use relay_executor::{ExecutorError, ExecutorTransaction, SubmitsTransactions};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{sleep, timeout},
};
use tracing::{debug, error, info, instrument, warn};

use crate::metrics::ConsumerMetrics;

/// Why a message was left unacknowledged
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    /// The body can't be parsed. Redelivery won't help.
    #[error(transparent)]
    Parse(#[from] MessageParseError),
    /// The transaction store failed
    #[error("transaction store error: {0}")]
    Store(#[from] StoreError),
    /// Submission or status polling failed
    #[error("execution backend error: {0}")]
    Executor(#[from] ExecutorError),
    /// The backend outcome couldn't be encoded for the store
    #[error("failed to encode execution result: {0}")]
    Encode(#[from] serde_json::Error),
    /// Submission and polling didn't finish before the delivery could be redelivered
    #[error("processing budget of {0:?} exhausted")]
    BudgetExhausted(Duration),
}

/// What happened to one received message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Dispatched, settled in the store and acknowledged
    Settled,
    /// Already terminal in the store, acknowledged without dispatch
    AlreadyTerminal,
    /// Body couldn't be parsed, left unacknowledged
    ParseFailed,
    /// Lookup, submission, polling or the store update failed, left unacknowledged
    DispatchFailed,
}

impl MessageOutcome {
    /// Metric label
    pub fn as_label(&self) -> &'static str {
        match self {
            MessageOutcome::Settled => "settled",
            MessageOutcome::AlreadyTerminal => "already_terminal",
            MessageOutcome::ParseFailed => "parse_failed",
            MessageOutcome::DispatchFailed => "dispatch_failed",
        }
    }

    /// Whether the message was acknowledged
    pub fn is_acknowledged(&self) -> bool {
        matches!(
            self,
            MessageOutcome::Settled | MessageOutcome::AlreadyTerminal
        )
    }
}

/// Sequential consumer: receive a batch, settle each message, pause, repeat.
///
/// A message is only acknowledged after its outcome is in the store. Anything
/// that goes wrong leaves it unacknowledged so the queue redelivers it after
/// the visibility timeout, until it is dead-lettered.
pub struct RelayConsumer {
    queue: Arc<dyn QueueChannel>,
    store: Arc<dyn TransactionStore>,
    submitter: Arc<dyn SubmitsTransactions>,
    policy: ChannelPolicy,
    settings: ConsumerSettings,
    metrics: ConsumerMetrics,
}

fn shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

impl RelayConsumer {
    /// Consumer over the given collaborators
    pub fn new(
        queue: Arc<dyn QueueChannel>,
        store: Arc<dyn TransactionStore>,
        submitter: Arc<dyn SubmitsTransactions>,
        policy: ChannelPolicy,
        settings: ConsumerSettings,
        metrics: ConsumerMetrics,
    ) -> Self {
        Self {
            queue,
            store,
            submitter,
            policy,
            settings,
            metrics,
        }
    }

    /// Run the loop on a new task
    pub fn spawn(self) -> ConsumerHandle {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        ConsumerHandle { shutdown, task }
    }

    /// Run until `shutdown` turns true or its sender is dropped. The message
    /// being handled when that happens is finished first.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            max_messages = self.policy.max_messages,
            wait = ?self.policy.wait(),
            "Starting consumer loop"
        );
        loop {
            if shutdown_requested(&shutdown) {
                break;
            }
            let received = tokio::select! {
                res = self.queue.receive(self.policy.max_messages, self.policy.wait()) => res,
                _ = shutdown.changed() => break,
            };
            match received {
                Ok(batch) => {
                    if !batch.is_empty() {
                        debug!(count = batch.len(), "Received messages");
                    }
                    self.metrics.record_received(batch.len());
                    for message in &batch {
                        if shutdown_requested(&shutdown) {
                            info!("Shutdown requested, leaving the rest of the batch for redelivery");
                            break;
                        }
                        let outcome = self.handle_message(message).await;
                        self.metrics.record_outcome(outcome);
                    }
                }
                Err(err) => warn!(?err, "Failed to receive messages"),
            }
            self.metrics.record_cycle();
            tokio::select! {
                _ = sleep(self.settings.cycle_delay()) => {}
                _ = shutdown.changed() => {}
            }
        }
        info!("Consumer loop stopped");
    }

    /// Settle one delivery and acknowledge it when that succeeded.
    #[instrument(skip_all, fields(message_id = %message.message_id, receive_count = message.receive_count))]
    pub async fn handle_message(&self, message: &QueueMessage) -> MessageOutcome {
        let body = match MessageBody::parse(&message.body) {
            Ok(body) => body,
            Err(err) => {
                error!(?err, body = message.body, "Malformed message, leaving it for the dead-letter channel");
                return MessageOutcome::ParseFailed;
            }
        };
        match self.settle(&body).await {
            Ok(outcome) => {
                self.acknowledge(&message.receipt_handle).await;
                outcome
            }
            Err(err) => {
                warn!(transaction_id = %body.transaction_id, ?err, "Failed to process message, leaving it for redelivery");
                MessageOutcome::DispatchFailed
            }
        }
    }

    #[instrument(skip_all, fields(transaction_id = %body.transaction_id, kind = %body.request.kind()))]
    async fn settle(&self, body: &MessageBody) -> Result<MessageOutcome, ConsumerError> {
        match self.store.find_by_id(&body.transaction_id).await? {
            Some(tx) if tx.status.is_terminal() => {
                info!(status = %tx.status, "Transaction already settled, skipping");
                return Ok(MessageOutcome::AlreadyTerminal);
            }
            Some(_) => {}
            None => {
                warn!("Transaction not in store, adopting it from the message");
                match self.store.insert(&body.to_transaction()).await {
                    Ok(()) | Err(StoreError::DuplicateId(_)) => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }

        // stop working on the delivery before another consumer can receive it
        let budget = self.policy.processing_budget();
        let executed = timeout(budget, self.execute(&body.request))
            .await
            .map_err(|_| ConsumerError::BudgetExhausted(budget))??;

        let status = if executed.status.is_success() {
            TransactionStatus::Confirmed
        } else {
            TransactionStatus::Failed
        };
        let result = serde_json::to_value(&executed)?;
        match self
            .store
            .update_status(&body.transaction_id, status, executed.hash, Some(result))
            .await
        {
            Ok(()) => {
                info!(%status, executor_status = %executed.status, hash = ?executed.hash, "Transaction settled");
                self.metrics.record_settled(status);
                Ok(MessageOutcome::Settled)
            }
            Err(StoreError::AlreadyTerminal { status, .. }) => {
                info!(%status, "Transaction was settled concurrently");
                Ok(MessageOutcome::AlreadyTerminal)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn execute(&self, request: &RelayRequest) -> Result<ExecutorTransaction, ExecutorError> {
        let executor_tx_id = self.dispatch(request).await?;
        self.submitter
            .poll_until_terminal(
                &executor_tx_id,
                self.settings.poll_max_attempts,
                self.settings.poll_interval(),
            )
            .await
    }

    async fn dispatch(&self, request: &RelayRequest) -> Result<String, ExecutorError> {
        match request {
            RelayRequest::Direct(request) => self.submitter.submit_direct(request).await,
            RelayRequest::Sponsored { call, forwarder } => {
                self.submitter
                    .submit_sponsored(&call.request, &call.signature, *forwarder)
                    .await
            }
        }
    }

    async fn acknowledge(&self, receipt_handle: &ReceiptHandle) {
        match self.queue.acknowledge(receipt_handle).await {
            Ok(()) => debug!("Message acknowledged"),
            Err(QueueError::HandleNotFound) => {
                debug!("Receipt handle no longer valid, message already removed or due for redelivery")
            }
            Err(err) => warn!(?err, "Failed to acknowledge message"),
        }
    }
}

/// Handle to a spawned consumer loop
#[derive(Debug)]
pub struct ConsumerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ConsumerHandle {
    /// Whether the loop task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Ask the loop to stop and wait up to `grace` for the in-flight message
    /// to finish, then abort it.
    pub async fn shutdown(self, grace: Duration) {
        if self.shutdown.send(true).is_err() {
            debug!("Consumer loop already gone");
        }
        let mut task = self.task;
        match timeout(grace, &mut task).await {
            Ok(Ok(())) => info!("Consumer shut down"),
            Ok(Err(err)) => error!(?err, "Consumer task failed"),
            Err(_) => {
                warn!(?grace, "Consumer didn't stop within the grace period, aborting");
                task.abort();
                if let Err(err) = task.await {
                    debug!(cancelled = err.is_cancelled(), "Consumer task aborted");
                }
            }
        }
    }
}
