//! Settings are loaded from, in increasing order of precedence:
//!
//! 1. every `*.json` file in `./config`
//! 2. the files listed in the comma separated `CONFIG_FILES` env var
//! 3. env vars prefixed `RELAY_`, with `__` separating nesting levels,
//!    e.g. `RELAY_EXECUTOR__API_KEY` or `RELAY_QUEUE__QUEUE_URL`
//!
//! Keys are snake_case.

use std::time::Duration;

use eyre::{bail, Result};
use relay_core::{Address, ChannelPolicy, Speed, VISIBILITY_MARGIN};
use serde::Deserialize;

pub use trace::*;

mod loader;
mod trace;

/// Which queue channel implementation to run against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    /// AWS SQS or a compatible endpoint
    #[default]
    Sqs,
    /// In-process broker. Messages don't survive a restart.
    Memory,
}

/// Queue channel settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Backend implementation
    pub backend: QueueBackend,
    /// Main queue url, required for `sqs`
    pub queue_url: Option<String>,
    /// Dead-letter queue url. When set, the redrive policy is applied on start.
    pub dlq_url: Option<String>,
    /// AWS region
    pub region: String,
    /// Custom endpoint, e.g. LocalStack
    pub endpoint: Option<String>,
    /// Static credentials; the default AWS credential chain is used otherwise
    pub access_key_id: Option<String>,
    /// Static credentials secret
    pub secret_access_key: Option<String>,
    /// Messages fetched per receive
    pub max_messages: u32,
    /// Long-poll wait per receive, seconds
    pub wait_seconds: u64,
    /// Visibility timeout, seconds
    pub visibility_timeout_seconds: u64,
    /// Deliveries before dead-lettering
    pub max_receive_count: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        let policy = ChannelPolicy::default();
        Self {
            backend: QueueBackend::default(),
            queue_url: None,
            dlq_url: None,
            region: "us-east-1".into(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            max_messages: policy.max_messages,
            wait_seconds: policy.wait_seconds,
            visibility_timeout_seconds: policy.visibility_timeout_seconds,
            max_receive_count: policy.max_receive_count,
        }
    }
}

impl QueueSettings {
    /// The receive and redelivery parameters
    pub fn policy(&self) -> ChannelPolicy {
        ChannelPolicy {
            max_messages: self.max_messages,
            wait_seconds: self.wait_seconds,
            visibility_timeout_seconds: self.visibility_timeout_seconds,
            max_receive_count: self.max_receive_count,
        }
    }
}

/// Execution backend settings
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSettings {
    /// Base url, e.g. `http://localhost:8080`
    pub url: String,
    /// Bearer token
    pub api_key: String,
    /// Fixed executor id. Discovered on first use when absent.
    #[serde(default)]
    pub executor_id: Option<String>,
    /// Per request timeout, seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Default pricing speed
    #[serde(default)]
    pub speed: Speed,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl ExecutorSettings {
    /// Per request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Chain the forwarder is deployed on
#[derive(Debug, Clone, Deserialize)]
pub struct ChainSettings {
    /// JSON-RPC url
    pub rpc_url: String,
    /// EIP-155 chain id
    pub chain_id: u64,
    /// ERC-2771 forwarder contract
    pub forwarder_address: Address,
}

/// Consumer loop pacing
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ConsumerSettings {
    /// Pause between receive cycles, milliseconds
    pub cycle_delay_ms: u64,
    /// Status checks per transaction before giving up
    pub poll_max_attempts: u32,
    /// Pause between status checks, milliseconds
    pub poll_interval_ms: u64,
    /// How long shutdown waits for the in-flight message, seconds
    pub shutdown_grace_secs: u64,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            cycle_delay_ms: 1_000,
            poll_max_attempts: 20,
            poll_interval_ms: 2_000,
            shutdown_grace_secs: 30,
        }
    }
}

impl ConsumerSettings {
    /// Pause between receive cycles
    pub fn cycle_delay(&self) -> Duration {
        Duration::from_millis(self.cycle_delay_ms)
    }

    /// Pause between status checks
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Shutdown grace period
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Upper bound on time spent polling one transaction
    pub fn poll_budget(&self) -> Duration {
        self.poll_interval() * self.poll_max_attempts
    }
}

/// Rocksdb location
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbSettings {
    /// Directory, created if missing
    pub path: String,
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            path: "./relay_db".into(),
        }
    }
}

/// Everything the relayer agent is configured with.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Logging
    #[serde(default)]
    pub tracing: TracingConfig,
    /// Port for `/metrics`. Not served when absent.
    #[serde(default)]
    pub metrics_port: Option<u16>,
    /// Transaction store
    #[serde(default)]
    pub db: DbSettings,
    /// Queue channel
    #[serde(default)]
    pub queue: QueueSettings,
    /// Execution backend
    pub executor: ExecutorSettings,
    /// Forwarder chain
    pub chain: ChainSettings,
    /// Consumer loop
    #[serde(default)]
    pub consumer: ConsumerSettings,
}

impl Settings {
    /// Load settings from the config files and environment
    pub fn load() -> Result<Self> {
        loader::load_settings_object("RELAY")
    }

    /// Reject combinations that can't work.
    pub fn validate(&self) -> Result<()> {
        if self.queue.backend == QueueBackend::Sqs && self.queue.queue_url.is_none() {
            bail!("queue.queue_url is required for the sqs backend");
        }
        if !(1..=10).contains(&self.queue.max_messages) {
            bail!(
                "queue.max_messages must be between 1 and 10, got {}",
                self.queue.max_messages
            );
        }
        if self.queue.wait_seconds > 20 {
            bail!(
                "queue.wait_seconds must be at most 20, got {}",
                self.queue.wait_seconds
            );
        }
        if self.queue.max_receive_count == 0 {
            bail!("queue.max_receive_count must be at least 1");
        }
        if self.consumer.poll_max_attempts == 0 {
            bail!("consumer.poll_max_attempts must be at least 1");
        }
        // The consumer abandons a delivery once the processing budget is spent,
        // so polling and every single backend call have to fit inside it.
        let policy = self.queue.policy();
        let budget = policy.processing_budget();
        if budget.is_zero() {
            bail!(
                "queue.visibility_timeout_seconds must exceed {:?}, got {}",
                VISIBILITY_MARGIN,
                policy.visibility_timeout_seconds
            );
        }
        if self.consumer.poll_budget() >= budget {
            bail!(
                "consumer polling may take {:?}, which must stay below the processing budget of {:?} (visibility timeout {:?})",
                self.consumer.poll_budget(),
                budget,
                policy.visibility_timeout()
            );
        }
        if self.executor.request_timeout() >= budget {
            bail!(
                "executor.request_timeout_secs of {:?} must stay below the processing budget of {:?} (visibility timeout {:?})",
                self.executor.request_timeout(),
                budget,
                policy.visibility_timeout()
            );
        }
        Ok(())
    }
}
