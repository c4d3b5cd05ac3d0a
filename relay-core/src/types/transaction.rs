use std::fmt;

use chrono::{DateTime, Utc};
use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize, Serializer};

use crate::{DirectRequest, SponsoredRequest, StoreError, StoreResult};

/// Unique identifier of a relayed transaction. Assigned once at admission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Wrap an existing id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random (v4 uuid) id
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Which submission path a transaction takes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransactionKind {
    /// Sent by the executor as-is
    Direct,
    /// Wrapped in a forwarder `execute` call, gas paid by the executor
    #[serde(alias = "gasless")]
    Sponsored,
}

/// Lifecycle status of a transaction. `Queued` is the only non-terminal one.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransactionStatus {
    /// Accepted and waiting in the queue
    #[default]
    Queued,
    /// Mined or confirmed on-chain
    Confirmed,
    /// Rejected, reverted or otherwise abandoned by the executor
    Failed,
}

impl TransactionStatus {
    /// True for `Confirmed` and `Failed`
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Queued)
    }
}

/// The immutable payload of a transaction, tagged by kind.
///
/// On the wire this flattens into `kind`, `request` and, for sponsored
/// requests, `forwarderAddress` keys of the surrounding object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "WireRequest")]
pub enum RelayRequest {
    /// A plain call
    Direct(DirectRequest),
    /// A signed forward request executed through `forwarder`
    Sponsored {
        /// The signed request
        call: SponsoredRequest,
        /// The ERC-2771 forwarder that verifies and executes it
        forwarder: Address,
    },
}

impl RelayRequest {
    /// The kind tag of this request
    pub fn kind(&self) -> TransactionKind {
        match self {
            RelayRequest::Direct(_) => TransactionKind::Direct,
            RelayRequest::Sponsored { .. } => TransactionKind::Sponsored,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    kind: TransactionKind,
    request: serde_json::Value,
    #[serde(default)]
    forwarder_address: Option<Address>,
}

/// Why a tagged request couldn't be built from its wire parts.
#[derive(Debug, thiserror::Error)]
pub enum RequestShapeError {
    /// The `request` object doesn't match the declared kind
    #[error("invalid {kind} request: {source}")]
    Payload {
        /// Declared kind
        kind: TransactionKind,
        /// Underlying decoding error
        source: serde_json::Error,
    },
    /// Sponsored requests must name their forwarder
    #[error("sponsored request is missing forwarderAddress")]
    MissingForwarder,
}

impl TryFrom<WireRequest> for RelayRequest {
    type Error = RequestShapeError;

    fn try_from(wire: WireRequest) -> Result<Self, Self::Error> {
        let kind = wire.kind;
        let payload_err = |source| RequestShapeError::Payload { kind, source };
        match kind {
            TransactionKind::Direct => serde_json::from_value(wire.request)
                .map(RelayRequest::Direct)
                .map_err(payload_err),
            TransactionKind::Sponsored => {
                let forwarder = wire
                    .forwarder_address
                    .ok_or(RequestShapeError::MissingForwarder)?;
                let call = serde_json::from_value(wire.request).map_err(payload_err)?;
                Ok(RelayRequest::Sponsored { call, forwarder })
            }
        }
    }
}

impl Serialize for RelayRequest {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Wire<'a, T: Serialize> {
            kind: TransactionKind,
            request: &'a T,
            #[serde(skip_serializing_if = "Option::is_none")]
            forwarder_address: Option<Address>,
        }

        match self {
            RelayRequest::Direct(request) => Wire {
                kind: TransactionKind::Direct,
                request,
                forwarder_address: None,
            }
            .serialize(s),
            RelayRequest::Sponsored { call, forwarder } => Wire {
                kind: TransactionKind::Sponsored,
                request: call,
                forwarder_address: Some(*forwarder),
            }
            .serialize(s),
        }
    }
}

/// A relayed transaction as persisted by the transaction store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Unique id
    pub id: TransactionId,
    /// Kind-tagged payload
    #[serde(flatten)]
    pub request: RelayRequest,
    /// Lifecycle status
    #[serde(default)]
    pub status: TransactionStatus,
    /// On-chain hash, set once the executor reports one
    #[serde(default)]
    pub hash: Option<H256>,
    /// Executor outcome details
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// A new `queued` transaction
    pub fn new(id: TransactionId, request: RelayRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            request,
            status: TransactionStatus::Queued,
            hash: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The kind tag of the payload
    pub fn kind(&self) -> TransactionKind {
        self.request.kind()
    }

    /// Move a queued transaction into a terminal status.
    ///
    /// Stores call this so the queued -> terminal rule holds no matter which
    /// backend persists the record.
    pub fn settle(
        &mut self,
        status: TransactionStatus,
        hash: Option<H256>,
        result: Option<serde_json::Value>,
    ) -> StoreResult<()> {
        if self.status.is_terminal() {
            return Err(StoreError::AlreadyTerminal {
                id: self.id.clone(),
                status: self.status,
            });
        }
        if !status.is_terminal() {
            return Err(StoreError::InvalidTransition {
                id: self.id.clone(),
                status,
            });
        }
        self.status = status;
        self.hash = hash.or(self.hash);
        self.result = result.or_else(|| self.result.take());
        self.updated_at = Utc::now();
        Ok(())
    }
}
