use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use derive_new::new;
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Serves the agent's prometheus registry on `/metrics`
#[derive(new, Debug)]
pub struct Server {
    listen_port: u16,
    registry: Registry,
}

impl Server {
    /// Run the HTTP server in the background
    pub fn run(self) -> JoinHandle<()> {
        self.run_with_custom_router(Router::new())
    }

    /// Run the HTTP server with additional agent-specific routes
    pub fn run_with_custom_router(self, router: Router) -> JoinHandle<()> {
        let port = self.listen_port;
        info!(port, "Starting metrics server on 0.0.0.0");

        let registry = self.registry;
        let app = Router::new()
            .route("/metrics", get(move || gather_metrics(registry.clone())))
            .merge(router);

        tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
                Ok(listener) => listener,
                Err(err) => {
                    error!(port, ?err, "Failed to bind metrics server");
                    return;
                }
            };
            if let Err(err) = axum::serve(listener, app).await {
                error!(?err, "Metrics server stopped");
            }
        })
    }
}

/// Encode every metric in `registry` in the prometheus text format.
pub fn encode_metrics(registry: &Registry) -> prometheus::Result<String> {
    let mut buffer = vec![];
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
}

async fn gather_metrics(registry: Registry) -> impl IntoResponse {
    debug!("Serving /metrics");
    match encode_metrics(&registry) {
        Ok(metrics) => (StatusCode::OK, metrics),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to gather metrics".to_owned(),
        ),
    }
}
