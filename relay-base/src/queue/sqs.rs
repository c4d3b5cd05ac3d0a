use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::{
    config::{Credentials, Region},
    operation::delete_message::DeleteMessageError,
    types::{MessageSystemAttributeName, QueueAttributeName},
    Client,
};
use eyre::{eyre, Result};
use relay_core::{
    ChannelPolicy, MessageBody, QueueChannel, QueueError, QueueMessage, QueueResult,
    ReceiptHandle,
};
use tracing::{info, instrument, warn};

use crate::QueueSettings;

// SQS limits
const MAX_BATCH: u32 = 10;
const MAX_WAIT_SECONDS: u64 = 20;

fn transport<E>(err: E) -> QueueError
where
    aws_sdk_sqs::Error: From<E>,
{
    QueueError::Transport(Box::new(aws_sdk_sqs::Error::from(err)))
}

/// The SQS redrive policy document for `dlq_arn`.
pub fn redrive_policy(dlq_arn: &str, max_receive_count: u32) -> String {
    serde_json::json!({
        "deadLetterTargetArn": dlq_arn,
        "maxReceiveCount": max_receive_count.to_string(),
    })
    .to_string()
}

/// [`QueueChannel`] backed by AWS SQS or an SQS compatible endpoint.
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
    dlq_url: Option<String>,
    policy: ChannelPolicy,
}

impl SqsQueue {
    /// Build a client from settings. Static credentials and a custom endpoint
    /// are used when configured, the default AWS chain otherwise.
    pub async fn connect(settings: &QueueSettings) -> Result<Self> {
        let queue_url = settings
            .queue_url
            .clone()
            .ok_or_else(|| eyre!("queue.queue_url is required for the sqs backend"))?;

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(settings.region.clone()));
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(key), Some(secret)) = (&settings.access_key_id, &settings.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                key,
                secret,
                None,
                None,
                "relay-settings",
            ));
        }
        let config = loader.load().await;

        Ok(Self {
            client: Client::new(&config),
            queue_url,
            dlq_url: settings.dlq_url.clone(),
            policy: settings.policy(),
        })
    }

    /// Write the visibility timeout and, with a dead-letter queue configured,
    /// the redrive policy onto the queue.
    #[instrument(skip(self), fields(queue_url = %self.queue_url), err)]
    pub async fn apply_policy(&self) -> QueueResult<()> {
        let mut request = self.client.set_queue_attributes().queue_url(&self.queue_url).attributes(
            QueueAttributeName::VisibilityTimeout,
            self.policy.visibility_timeout_seconds.to_string(),
        );
        if let Some(dlq_url) = &self.dlq_url {
            let dlq_arn = self.queue_arn(dlq_url).await?;
            request = request.attributes(
                QueueAttributeName::RedrivePolicy,
                redrive_policy(&dlq_arn, self.policy.max_receive_count),
            );
            info!(dlq_arn, max_receive_count = self.policy.max_receive_count, "Applying redrive policy");
        }
        request.send().await.map_err(transport)?;
        Ok(())
    }

    async fn queue_arn(&self, queue_url: &str) -> QueueResult<String> {
        let output = self
            .client
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(QueueAttributeName::QueueArn)
            .send()
            .await
            .map_err(transport)?;
        output
            .attributes()
            .and_then(|attrs| attrs.get(&QueueAttributeName::QueueArn))
            .cloned()
            .ok_or_else(|| QueueError::Transport(format!("no ARN reported for {queue_url}").into()))
    }
}

#[async_trait]
impl QueueChannel for SqsQueue {
    #[instrument(skip_all, fields(transaction_id = %body.transaction_id))]
    async fn enqueue(&self, body: &MessageBody) -> QueueResult<String> {
        let output = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body.to_json()?)
            .send()
            .await
            .map_err(transport)?;
        Ok(output.message_id().unwrap_or_default().to_owned())
    }

    async fn receive(&self, max_messages: u32, wait: Duration) -> QueueResult<Vec<QueueMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages.clamp(1, MAX_BATCH) as i32)
            .wait_time_seconds(wait.as_secs().min(MAX_WAIT_SECONDS) as i32)
            .visibility_timeout(i32::try_from(self.policy.visibility_timeout_seconds).unwrap_or(i32::MAX))
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(transport)?;

        let mut batch = vec![];
        for message in output.messages() {
            let (Some(message_id), Some(body), Some(handle)) =
                (message.message_id(), message.body(), message.receipt_handle())
            else {
                warn!(?message, "Skipping message without id, body or receipt handle");
                continue;
            };
            let receive_count = message
                .attributes()
                .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
                .and_then(|count| count.parse().ok())
                .unwrap_or(1);
            batch.push(QueueMessage {
                message_id: message_id.to_owned(),
                body: body.to_owned(),
                receipt_handle: ReceiptHandle::new(handle),
                receive_count,
            });
        }
        Ok(batch)
    }

    async fn acknowledge(&self, receipt_handle: &ReceiptHandle) -> QueueResult<()> {
        let res = self
            .client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle.as_str())
            .send()
            .await;
        match res {
            Ok(_) => Ok(()),
            Err(err) => match err.into_service_error() {
                DeleteMessageError::ReceiptHandleIsInvalid(_)
                | DeleteMessageError::InvalidIdFormat(_) => Err(QueueError::HandleNotFound),
                other => Err(transport(other)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redrive_policy_document() {
        let doc: serde_json::Value =
            serde_json::from_str(&redrive_policy("arn:aws:sqs:us-east-1:000000000000:relay-dlq", 3))
                .unwrap();
        assert_eq!(
            doc,
            serde_json::json!({
                "deadLetterTargetArn": "arn:aws:sqs:us-east-1:000000000000:relay-dlq",
                "maxReceiveCount": "3"
            })
        );
    }

    #[tokio::test]
    async fn connect_requires_queue_url() {
        let settings = QueueSettings::default();
        assert!(SqsQueue::connect(&settings).await.is_err());
    }
}
