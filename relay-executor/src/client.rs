use std::time::Duration;

use async_trait::async_trait;
use ethers::types::{Address, Bytes, U256};
use relay_core::{DirectRequest, ForwardRequest, Speed};
use relay_ethereum::build_forwarder_calldata;
use tokio::{sync::OnceCell, time::sleep};
use tracing::{debug, info, instrument, warn};

use crate::{
    ExecutorApi, ExecutorError, ExecutorResult, ExecutorTransaction, TransactionRequestArgs,
};

/// Gas limit for direct requests that don't carry one.
pub const DEFAULT_GAS_LIMIT: u64 = 100_000;

/// Gas added on top of a forward request's inner gas for the forwarder's own
/// signature and nonce checks.
pub const FORWARDER_GAS_OVERHEAD: u64 = 50_000;

/// What the consumer needs from the execution backend.
#[async_trait]
pub trait SubmitsTransactions: Send + Sync {
    /// Submit a plain call. Returns the backend transaction id.
    async fn submit_direct(&self, request: &DirectRequest) -> ExecutorResult<String>;

    /// Submit a signed forward request through `forwarder`. Returns the
    /// backend transaction id.
    async fn submit_sponsored(
        &self,
        request: &ForwardRequest,
        signature: &Bytes,
        forwarder: Address,
    ) -> ExecutorResult<String>;

    /// Query the backend until the transaction is terminal, at most
    /// `max_attempts` times, `interval` apart.
    async fn poll_until_terminal(
        &self,
        executor_tx_id: &str,
        max_attempts: u32,
        interval: Duration,
    ) -> ExecutorResult<ExecutorTransaction>;
}

/// Submission client over an [`ExecutorApi`].
///
/// The executor id is discovered on first use and then kept for the
/// lifetime of the client.
#[derive(Debug)]
pub struct SubmissionClient<A> {
    api: A,
    executor_id: OnceCell<String>,
    speed: Speed,
}

impl<A: ExecutorApi> SubmissionClient<A> {
    /// Client that discovers its executor on first use
    pub fn new(api: A) -> Self {
        Self {
            api,
            executor_id: OnceCell::new(),
            speed: Speed::default(),
        }
    }

    /// Skip discovery and always use `executor_id`
    pub fn with_executor_id(mut self, executor_id: String) -> Self {
        self.executor_id = OnceCell::new_with(Some(executor_id));
        self
    }

    /// Speed used when a request doesn't name one
    pub fn with_default_speed(mut self, speed: Speed) -> Self {
        self.speed = speed;
        self
    }

    /// The executor to submit through. Only a successful lookup is cached.
    pub async fn resolve_executor(&self) -> ExecutorResult<String> {
        self.executor_id
            .get_or_try_init(|| async {
                let executors = self.api.list_executors().await?;
                let executor = executors
                    .into_iter()
                    .next()
                    .ok_or(ExecutorError::NoExecutorAvailable)?;
                info!(executor_id = executor.id, name = ?executor.name, "Resolved executor");
                Ok(executor.id)
            })
            .await
            .cloned()
    }

    async fn send(&self, args: TransactionRequestArgs) -> ExecutorResult<String> {
        let executor_id = self.resolve_executor().await?;
        let submitted = self.api.send_transaction(&executor_id, &args).await?;
        info!(
            executor_id,
            executor_tx_id = submitted.id,
            to = ?args.to,
            gas_limit = args.gas_limit,
            "Submitted transaction"
        );
        Ok(submitted.id)
    }
}

fn gas_to_u64(gas: U256) -> ExecutorResult<u64> {
    u64::try_from(gas).map_err(|_| ExecutorError::InvalidRequest(format!("gas {gas} exceeds u64")))
}

#[async_trait]
impl<A: ExecutorApi> SubmitsTransactions for SubmissionClient<A> {
    #[instrument(skip_all, fields(to = ?request.to))]
    async fn submit_direct(&self, request: &DirectRequest) -> ExecutorResult<String> {
        let gas_limit = match request.gas_limit {
            Some(gas) => gas_to_u64(gas)?,
            None => DEFAULT_GAS_LIMIT,
        };
        self.send(TransactionRequestArgs {
            to: request.to,
            data: request.data.clone(),
            value: request.value.unwrap_or_default(),
            gas_limit,
            speed: request.speed.unwrap_or(self.speed),
        })
        .await
    }

    #[instrument(skip_all, fields(from = ?request.from, ?forwarder))]
    async fn submit_sponsored(
        &self,
        request: &ForwardRequest,
        signature: &Bytes,
        forwarder: Address,
    ) -> ExecutorResult<String> {
        let gas_limit = gas_to_u64(request.gas)?
            .checked_add(FORWARDER_GAS_OVERHEAD)
            .ok_or_else(|| ExecutorError::InvalidRequest("gas overflows u64".into()))?;
        self.send(TransactionRequestArgs {
            to: forwarder,
            data: build_forwarder_calldata(request, signature),
            // the inner value is carried in the request itself
            value: U256::zero(),
            gas_limit,
            speed: self.speed,
        })
        .await
    }

    #[instrument(skip(self, interval))]
    async fn poll_until_terminal(
        &self,
        executor_tx_id: &str,
        max_attempts: u32,
        interval: Duration,
    ) -> ExecutorResult<ExecutorTransaction> {
        let executor_id = self.resolve_executor().await?;
        for attempt in 1..=max_attempts {
            match self.api.get_transaction(&executor_id, executor_tx_id).await {
                Ok(tx) if tx.is_settled() => {
                    info!(attempt, status = %tx.status, hash = ?tx.hash, "Transaction reached terminal status");
                    return Ok(tx);
                }
                Ok(tx) if tx.status.is_terminal() => {
                    warn!(attempt, status = %tx.status, "Successful status reported without a hash, polling again")
                }
                Ok(tx) => debug!(attempt, status = %tx.status, "Transaction not terminal yet"),
                Err(err) => warn!(attempt, ?err, "Failed to query transaction status"),
            }
            if attempt < max_attempts {
                sleep(interval).await;
            }
        }
        Err(ExecutorError::PollTimeout {
            executor_tx_id: executor_tx_id.to_owned(),
            attempts: max_attempts,
        })
    }
}
