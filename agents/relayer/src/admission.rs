use std::sync::Arc;

use relay_core::{
    Address, Bytes, DirectRequest, ForwardRequest, MessageBody, QueueChannel, QueueError,
    RelayRequest, SponsoredRequest, StoreError, Transaction, TransactionId, TransactionStatus,
    TransactionStore,
};
use relay_ethereum::{parse_signature, ForwarderNonces, MetaTxValidator, ValidationError};
use tracing::{error, info, instrument};

/// Why a request wasn't accepted
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// The sponsored request failed validation
    #[error(transparent)]
    Rejected(#[from] ValidationError),
    /// The transaction store failed
    #[error("transaction store unavailable: {0}")]
    Store(#[from] StoreError),
    /// The transaction was recorded but couldn't be enqueued. It is marked failed.
    #[error("queue unavailable: {0}")]
    QueueUnavailable(#[source] QueueError),
}

impl AdmissionError {
    /// True when resubmitting the same request can't succeed
    pub fn is_client_error(&self) -> bool {
        match self {
            AdmissionError::Rejected(err) => err.is_client_error(),
            _ => false,
        }
    }
}

/// Producer side of the pipeline: validates a request, records it as
/// `queued` and hands it to the queue channel.
pub struct RelayAdmission<N> {
    store: Arc<dyn TransactionStore>,
    queue: Arc<dyn QueueChannel>,
    validator: MetaTxValidator<N>,
}

impl<N: ForwarderNonces> RelayAdmission<N> {
    /// Admission validating sponsored requests with `validator`
    pub fn new(
        store: Arc<dyn TransactionStore>,
        queue: Arc<dyn QueueChannel>,
        validator: MetaTxValidator<N>,
    ) -> Self {
        Self {
            store,
            queue,
            validator,
        }
    }

    /// The forwarder sponsored requests are executed through
    pub fn forwarder(&self) -> Address {
        self.validator.domain().forwarder
    }

    /// Accept a plain call
    #[instrument(skip_all, fields(to = ?request.to))]
    pub async fn submit_direct(
        &self,
        request: DirectRequest,
    ) -> Result<TransactionId, AdmissionError> {
        self.admit(RelayRequest::Direct(request)).await
    }

    /// Validate and accept a signed forward request. `signature` is the
    /// hex encoded 65-byte EIP-712 signature of `request.from`.
    #[instrument(skip_all, fields(from = ?request.from, nonce = %request.nonce))]
    pub async fn submit_sponsored(
        &self,
        request: ForwardRequest,
        signature: &str,
    ) -> Result<TransactionId, AdmissionError> {
        self.validator.validate(&request, signature).await?;
        let signature = parse_signature(signature).ok_or(ValidationError::InvalidSignature)?;
        self.admit(RelayRequest::Sponsored {
            call: SponsoredRequest {
                request,
                signature: Bytes::from(signature.to_vec()),
            },
            forwarder: self.forwarder(),
        })
        .await
    }

    /// Current record of a transaction
    pub async fn transaction(&self, id: &TransactionId) -> Result<Option<Transaction>, AdmissionError> {
        Ok(self.store.find_by_id(id).await?)
    }

    async fn admit(&self, request: RelayRequest) -> Result<TransactionId, AdmissionError> {
        let tx = Transaction::new(TransactionId::random(), request);
        self.store.insert(&tx).await?;

        let body = MessageBody::from(&tx);
        match self.queue.enqueue(&body).await {
            Ok(message_id) => {
                info!(transaction_id = %tx.id, kind = %tx.kind(), message_id, "Transaction queued");
                Ok(tx.id)
            }
            Err(err) => {
                error!(transaction_id = %tx.id, ?err, "Failed to enqueue transaction, marking it failed");
                let result = serde_json::json!({ "error": format!("enqueue failed: {err}") });
                if let Err(store_err) = self
                    .store
                    .update_status(&tx.id, TransactionStatus::Failed, None, Some(result))
                    .await
                {
                    error!(transaction_id = %tx.id, ?store_err, "Failed to mark unqueued transaction failed");
                }
                Err(AdmissionError::QueueUnavailable(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use relay_base::{MemoryQueue, MemoryTransactionStore};
    use relay_core::{ChannelPolicy, QueueMessage, QueueResult, ReceiptHandle, U256};

    use super::*;
    use crate::test_utils::*;

    struct BrokenQueue;

    #[async_trait]
    impl QueueChannel for BrokenQueue {
        async fn enqueue(&self, _body: &MessageBody) -> QueueResult<String> {
            Err(QueueError::Transport("broker down".into()))
        }

        async fn receive(&self, _: u32, _: Duration) -> QueueResult<Vec<QueueMessage>> {
            Ok(vec![])
        }

        async fn acknowledge(&self, _: &ReceiptHandle) -> QueueResult<()> {
            Err(QueueError::HandleNotFound)
        }
    }

    fn admission(
        nonce: u64,
        queue: Arc<dyn QueueChannel>,
    ) -> (RelayAdmission<MockNonces>, Arc<MemoryTransactionStore>) {
        let store = Arc::new(MemoryTransactionStore::new());
        let validator = MetaTxValidator::new(nonces_returning(nonce), domain());
        (RelayAdmission::new(store.clone(), queue, validator), store)
    }

    #[tokio::test]
    async fn sponsored_request_is_stored_and_queued() {
        let queue = Arc::new(MemoryQueue::new(ChannelPolicy::default()));
        let (admission, store) = admission(0, queue.clone());
        let request = forward_request(U256::zero(), future_deadline());
        let signature = sign(&request).await;

        let id = admission.submit_sponsored(request.clone(), &signature).await.unwrap();

        let stored = admission.transaction(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Queued);
        assert_eq!(store.len().await, 1);

        let message = queue.receive(10, Duration::ZERO).await.unwrap().remove(0);
        let body = MessageBody::parse(&message.body).unwrap();
        assert_eq!(body.transaction_id, id);
        match body.request {
            RelayRequest::Sponsored { call, forwarder } => {
                assert_eq!(call.request, request);
                assert_eq!(call.signature.len(), 65);
                assert_eq!(forwarder, domain().forwarder);
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[tokio::test]
    async fn expired_deadline_is_rejected_before_anything_is_stored() {
        let queue = Arc::new(MemoryQueue::new(ChannelPolicy::default()));
        let store = Arc::new(MemoryTransactionStore::new());
        // the nonce must not even be queried
        let validator = MetaTxValidator::new(MockNonces::new(), domain());
        let admission = RelayAdmission::new(store.clone(), queue.clone(), validator);
        let request = forward_request(U256::zero(), 1);
        let signature = sign(&request).await;

        let err = admission.submit_sponsored(request, &signature).await.unwrap_err();
        assert!(matches!(
            err,
            AdmissionError::Rejected(ValidationError::DeadlineExpired { .. })
        ));
        assert!(err.is_client_error());
        assert!(store.is_empty().await);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn nonce_mismatch_is_rejected() {
        let queue = Arc::new(MemoryQueue::new(ChannelPolicy::default()));
        let (admission, store) = admission(5, queue.clone());
        let request = forward_request(U256::from(4), future_deadline());
        let signature = sign(&request).await;

        let err = admission.submit_sponsored(request, &signature).await.unwrap_err();
        assert!(matches!(
            err,
            AdmissionError::Rejected(ValidationError::NonceMismatch { .. })
        ));
        assert!(store.is_empty().await);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn bad_signature_is_rejected() {
        let queue = Arc::new(MemoryQueue::new(ChannelPolicy::default()));
        let (admission, store) = admission(0, queue.clone());
        let request = forward_request(U256::zero(), future_deadline());

        let err = admission.submit_sponsored(request, "0xdeadbeef").await.unwrap_err();
        assert!(matches!(
            err,
            AdmissionError::Rejected(ValidationError::InvalidSignature)
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn direct_request_is_queued_without_validation() {
        let queue = Arc::new(MemoryQueue::new(ChannelPolicy::default()));
        let (admission, _store) = admission(0, queue.clone());
        let id = admission.submit_direct(direct_request()).await.unwrap();

        let message = queue.receive(10, Duration::ZERO).await.unwrap().remove(0);
        let body = MessageBody::parse(&message.body).unwrap();
        assert_eq!(body.transaction_id, id);
        assert_eq!(body.request, RelayRequest::Direct(direct_request()));
    }

    #[tokio::test]
    async fn enqueue_failure_marks_transaction_failed() {
        let (admission, store) = admission(0, Arc::new(BrokenQueue));
        let err = admission.submit_direct(direct_request()).await.unwrap_err();
        assert!(matches!(err, AdmissionError::QueueUnavailable(_)));
        assert!(!err.is_client_error());

        assert_eq!(store.len().await, 1);
        let all = store.snapshot().await;
        assert_eq!(all[0].status, TransactionStatus::Failed);
        assert!(all[0].result.is_some());
    }
}
