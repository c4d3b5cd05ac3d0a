use std::{path::Path, sync::Arc, time::Duration};

use eyre::{Result, WrapErr};
use prometheus::Registry;
use relay_base::{build_queue, server::Server, RocksTransactionStore, Settings, DB};
use relay_core::{QueueChannel, TransactionStore};
use relay_ethereum::{ForwarderDomain, MetaTxValidator, RpcForwarderNonces};
use relay_executor::{HttpExecutorApi, SubmissionClient};
use tracing::{info, warn};

use crate::{ConsumerMetrics, RelayAdmission, RelayConsumer};

/// Every component of a running relay agent, wired from [`Settings`].
pub struct Relayer {
    admission: RelayAdmission<RpcForwarderNonces>,
    consumer: RelayConsumer,
    metrics_server: Option<Server>,
    shutdown_grace: Duration,
}

impl Relayer {
    /// Open the store, connect to the queue and build the executor client
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let registry = Registry::new();
        let metrics = ConsumerMetrics::new(registry.clone())?;

        let db = DB::from_path(Path::new(&settings.db.path))?;
        let store: Arc<dyn TransactionStore> = Arc::new(RocksTransactionStore::new(db));
        let queue: Arc<dyn QueueChannel> = build_queue(&settings.queue).await?;

        let api = HttpExecutorApi::new(
            &settings.executor.url,
            settings.executor.api_key.clone(),
            settings.executor.request_timeout(),
        )
        .wrap_err("Invalid executor settings")?;
        let mut client = SubmissionClient::new(api).with_default_speed(settings.executor.speed);
        if let Some(executor_id) = &settings.executor.executor_id {
            client = client.with_executor_id(executor_id.clone());
        }

        let nonces = RpcForwarderNonces::new(&settings.chain.rpc_url)
            .wrap_err("Invalid chain rpc url")?;
        let validator = MetaTxValidator::new(
            nonces,
            ForwarderDomain {
                chain_id: settings.chain.chain_id,
                forwarder: settings.chain.forwarder_address,
            },
        );

        Ok(Self {
            admission: RelayAdmission::new(store.clone(), queue.clone(), validator),
            consumer: RelayConsumer::new(
                queue,
                store,
                Arc::new(client),
                settings.queue.policy(),
                settings.consumer,
                metrics,
            ),
            metrics_server: settings.metrics_port.map(|port| Server::new(port, registry)),
            shutdown_grace: settings.consumer.shutdown_grace(),
        })
    }

    /// Producer side, for embedding behind a request surface
    pub fn admission(&self) -> &RelayAdmission<RpcForwarderNonces> {
        &self.admission
    }

    /// Run until SIGINT or SIGTERM, then stop the consumer gracefully
    pub async fn run(self) -> Result<()> {
        let _server = self.metrics_server.map(Server::run);
        let consumer = self.consumer.spawn();

        shutdown_signal().await?;
        info!(grace = ?self.shutdown_grace, "Shutting down");
        consumer.shutdown(self.shutdown_grace).await;
        Ok(())
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).wrap_err("Failed to install SIGTERM handler")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.wrap_err("Failed to install Ctrl-C handler")?;
            info!("Received SIGINT");
        }
        _ = terminate.recv() => info!("Received SIGTERM"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .wrap_err("Failed to install Ctrl-C handler")?;
    info!("Received Ctrl-C");
    Ok(())
}

/// Entry point of the `relayer` binary
pub async fn relayer_main() -> Result<()> {
    color_eyre::install()?;

    let settings = Settings::load()?;
    settings.validate()?;
    settings.tracing.start_tracing()?;

    if settings.metrics_port.is_none() {
        warn!("metrics_port not set, metrics won't be served");
    }

    Relayer::from_settings(&settings).await?.run().await
}
