use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::{
    ApiResponse, ExecutorError, ExecutorInfo, ExecutorResult, ExecutorTransaction,
    SubmittedTransaction, TransactionRequestArgs,
};

/// Raw calls against the execution backend.
#[async_trait]
pub trait ExecutorApi: Send + Sync {
    /// `GET /api/v1/relayers`
    async fn list_executors(&self) -> ExecutorResult<Vec<ExecutorInfo>>;

    /// `POST /api/v1/relayers/{executor_id}/transactions`
    async fn send_transaction(
        &self,
        executor_id: &str,
        args: &TransactionRequestArgs,
    ) -> ExecutorResult<SubmittedTransaction>;

    /// `GET /api/v1/relayers/{executor_id}/transactions/{tx_id}`
    async fn get_transaction(
        &self,
        executor_id: &str,
        tx_id: &str,
    ) -> ExecutorResult<ExecutorTransaction>;
}

/// [`ExecutorApi`] over HTTP with bearer authentication.
#[derive(Debug, Clone)]
pub struct HttpExecutorApi {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpExecutorApi {
    /// Client for the backend at `base_url`. Every request times out after `timeout`.
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> ExecutorResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/relayers{}", self.base_url, path)
    }
}

#[async_trait]
impl ExecutorApi for HttpExecutorApi {
    #[instrument(skip(self), err)]
    async fn list_executors(&self) -> ExecutorResult<Vec<ExecutorInfo>> {
        let res = self
            .http
            .get(self.url(""))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        parse_response(res).await
    }

    #[instrument(skip(self, args), fields(to = ?args.to), err)]
    async fn send_transaction(
        &self,
        executor_id: &str,
        args: &TransactionRequestArgs,
    ) -> ExecutorResult<SubmittedTransaction> {
        let res = self
            .http
            .post(self.url(&format!("/{executor_id}/transactions")))
            .bearer_auth(&self.api_key)
            .json(args)
            .send()
            .await?;
        parse_response(res).await
    }

    #[instrument(skip(self), err)]
    async fn get_transaction(
        &self,
        executor_id: &str,
        tx_id: &str,
    ) -> ExecutorResult<ExecutorTransaction> {
        let res = self
            .http
            .get(self.url(&format!("/{executor_id}/transactions/{tx_id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        parse_response(res).await
    }
}

async fn parse_response<T: DeserializeOwned>(res: reqwest::Response) -> ExecutorResult<T> {
    let status = res.status();
    let body = res.text().await?;
    if !status.is_success() {
        return Err(ExecutorError::Api {
            status: status.as_u16(),
            body,
        });
    }
    let reply: ApiResponse<T> = serde_json::from_str(&body)?;
    Ok(reply.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_routes_without_double_slashes() {
        let api =
            HttpExecutorApi::new("http://localhost:8080/", "key".into(), Duration::from_secs(1))
                .unwrap();
        assert_eq!(api.url(""), "http://localhost:8080/api/v1/relayers");
        assert_eq!(
            api.url("/abc/transactions/1"),
            "http://localhost:8080/api/v1/relayers/abc/transactions/1"
        );
    }
}
