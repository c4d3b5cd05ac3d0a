use std::str::FromStr;

use ethers::types::{Address, Signature, H256, U256};
use relay_core::ForwardRequest;
use tracing::{debug, instrument};

use crate::{ChainError, ForwarderDomain, ForwarderNonces, TypedForwardRequest};

/// Why a sponsored request was refused at admission.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The request's deadline is in the past
    #[error("request deadline {deadline} has passed (now {now})")]
    DeadlineExpired {
        /// Request deadline, unix seconds
        deadline: u64,
        /// Time of the check, unix seconds
        now: u64,
    },
    /// The deadline doesn't fit the forwarder's `uint48` field
    #[error("request deadline {deadline} exceeds uint48")]
    DeadlineOutOfRange {
        /// Request deadline, unix seconds
        deadline: u64,
    },
    /// The request nonce is not the forwarder's next nonce for the sender
    #[error("invalid nonce: expected {expected}, got {provided}")]
    NonceMismatch {
        /// Nonce the forwarder expects
        expected: U256,
        /// Nonce in the request
        provided: U256,
    },
    /// The signature doesn't recover to `from`
    #[error("invalid signature")]
    InvalidSignature,
    /// The forwarder nonce couldn't be read
    #[error("forwarder nonce unavailable: {0}")]
    NonceUnavailable(#[source] ChainError),
}

impl ValidationError {
    /// True when the caller sent a bad request, false when we couldn't check it
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ValidationError::NonceUnavailable(_))
    }
}

/// Largest deadline the forwarder can represent
pub const MAX_DEADLINE: u64 = (1 << 48) - 1;

/// `deadline >= now`. A deadline equal to the current second is still valid.
pub fn deadline_is_valid_at(deadline: u64, now: u64) -> bool {
    deadline >= now
}

fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

/// Parse a hex encoded 65-byte signature. `None` for anything malformed.
pub fn parse_signature(signature: &str) -> Option<Signature> {
    Signature::from_str(signature.trim()).ok()
}

/// Off-chain checks of a sponsored meta-transaction against one forwarder.
///
/// These are advisory; the forwarder checks signature, nonce and deadline
/// again when it executes the request.
pub struct MetaTxValidator<N> {
    nonces: N,
    domain: ForwarderDomain,
}

impl<N: ForwarderNonces> MetaTxValidator<N> {
    /// Validator for requests signed for `domain`
    pub fn new(nonces: N, domain: ForwarderDomain) -> Self {
        Self { nonces, domain }
    }

    /// The forwarder domain requests are checked against
    pub fn domain(&self) -> ForwarderDomain {
        self.domain
    }

    /// Whether `deadline` has not passed yet
    pub fn validate_deadline(&self, deadline: u64) -> bool {
        deadline_is_valid_at(deadline, unix_now())
    }

    /// The forwarder's next nonce for `address`
    pub async fn query_nonce(&self, address: Address) -> Result<U256, ValidationError> {
        self.nonces
            .nonce_of(self.domain.forwarder, address)
            .await
            .map_err(ValidationError::NonceUnavailable)
    }

    /// Exact nonce equality
    pub fn check_nonce_match(provided: U256, expected: U256) -> Result<(), ValidationError> {
        if provided == expected {
            Ok(())
        } else {
            Err(ValidationError::NonceMismatch { expected, provided })
        }
    }

    /// Whether `signature` is `request.from`'s EIP-712 signature over `request`.
    /// Malformed signatures are simply invalid.
    pub fn verify_signature(&self, request: &ForwardRequest, signature: &str) -> bool {
        let Some(signature) = parse_signature(signature) else {
            debug!("signature is not a 65 byte hex string");
            return false;
        };
        let digest = TypedForwardRequest::new(self.domain, request).digest();
        match signature.recover(H256::from(digest)) {
            Ok(signer) => signer == request.from,
            Err(err) => {
                debug!(?err, "failed to recover signer");
                false
            }
        }
    }

    /// Deadline, then nonce, then signature. Stops at the first failure.
    #[instrument(skip_all, fields(from = ?request.from, nonce = %request.nonce))]
    pub async fn validate(
        &self,
        request: &ForwardRequest,
        signature: &str,
    ) -> Result<(), ValidationError> {
        if request.deadline > MAX_DEADLINE {
            return Err(ValidationError::DeadlineOutOfRange {
                deadline: request.deadline,
            });
        }
        let now = unix_now();
        if !deadline_is_valid_at(request.deadline, now) {
            return Err(ValidationError::DeadlineExpired {
                deadline: request.deadline,
                now,
            });
        }
        let expected = self.query_nonce(request.from).await?;
        Self::check_nonce_match(request.nonce, expected)?;
        if !self.verify_signature(request, signature) {
            return Err(ValidationError::InvalidSignature);
        }
        Ok(())
    }
}
