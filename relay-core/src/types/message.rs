use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{MessageParseError, RelayRequest, Transaction, TransactionId};

/// The JSON body carried by a queue message:
/// `{transactionId, kind, request, forwarderAddress?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    /// The transaction this message settles
    pub transaction_id: TransactionId,
    /// Kind-tagged payload
    #[serde(flatten)]
    pub request: RelayRequest,
}

impl MessageBody {
    /// Parse a raw queue message body. Unknown kinds, missing forwarder
    /// addresses and malformed payloads are all permanent errors.
    pub fn parse(body: &str) -> Result<Self, MessageParseError> {
        Ok(serde_json::from_str(body)?)
    }

    /// Serialize to the wire form
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// A fresh `queued` transaction record for this message
    pub fn to_transaction(&self) -> Transaction {
        Transaction::new(self.transaction_id.clone(), self.request.clone())
    }
}

impl From<&Transaction> for MessageBody {
    fn from(tx: &Transaction) -> Self {
        Self {
            transaction_id: tx.id.clone(),
            request: tx.request.clone(),
        }
    }
}

/// Opaque token that acknowledges one specific delivery of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    /// Wrap a broker-issued handle
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// The handle as issued by the broker
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One delivery of a queue message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Broker-assigned message id
    pub message_id: String,
    /// Raw body, parsed by the consumer
    pub body: String,
    /// Handle for acknowledging this delivery
    pub receipt_handle: ReceiptHandle,
    /// Approximate number of deliveries so far, including this one
    pub receive_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Address, RequestShapeError, TransactionKind, U256};

    const FORWARDER: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

    #[test]
    fn parses_direct_body_with_defaults() {
        let body = MessageBody::parse(
            r#"{
                "transactionId": "tx-1",
                "kind": "direct",
                "request": {"to": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "data": "0x1234"}
            }"#,
        )
        .unwrap();
        assert_eq!(body.transaction_id, "tx-1".into());
        let RelayRequest::Direct(req) = &body.request else {
            panic!("expected a direct request, got {:?}", body.request);
        };
        assert_eq!(req.to, Address::repeat_byte(0xaa));
        assert_eq!(req.data.to_vec(), vec![0x12u8, 0x34]);
        assert_eq!(req.value, None);
        assert_eq!(req.gas_limit, None);
        assert_eq!(req.speed, None);
    }

    #[test]
    fn parses_sponsored_body_and_legacy_kind_name() {
        let raw = format!(
            r#"{{
                "transactionId": "tx-2",
                "kind": "gasless",
                "request": {{
                    "request": {{
                        "from": "0x0101010101010101010101010101010101010101",
                        "to": "0x0202020202020202020202020202020202020202",
                        "value": "0",
                        "gas": "150000",
                        "nonce": "4",
                        "deadline": 1900000000,
                        "data": "0x"
                    }},
                    "signature": "0x{sig}"
                }},
                "forwarderAddress": "{FORWARDER}"
            }}"#,
            sig = "11".repeat(65)
        );
        let body = MessageBody::parse(&raw).unwrap();
        assert_eq!(body.request.kind(), TransactionKind::Sponsored);
        let RelayRequest::Sponsored { call, forwarder } = &body.request else {
            panic!("expected a sponsored request");
        };
        assert_eq!(*forwarder, FORWARDER.parse::<Address>().unwrap());
        assert_eq!(call.request.gas, U256::from(150_000));
        assert_eq!(call.request.nonce, U256::from(4));
        assert_eq!(call.signature.len(), 65);

        // re-encoding uses the canonical kind name
        let json: serde_json::Value = serde_json::from_str(&body.to_json().unwrap()).unwrap();
        assert_eq!(json["kind"], "sponsored");
        assert_eq!(json["transactionId"], "tx-2");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = MessageBody::parse(
            r#"{"transactionId": "tx-3", "kind": "teleport", "request": {}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("teleport"), "{err}");
    }

    #[test]
    fn sponsored_without_forwarder_is_rejected() {
        let err = MessageBody::parse(
            r#"{"transactionId": "tx-4", "kind": "sponsored", "request": {}}"#,
        )
        .unwrap_err();
        assert!(
            err.to_string()
                .contains(&RequestShapeError::MissingForwarder.to_string()),
            "{err}"
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(MessageBody::parse("not json").is_err());
        assert!(MessageBody::parse(r#"{"kind": "direct"}"#).is_err());
    }
}
