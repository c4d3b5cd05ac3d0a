use std::convert::Infallible;

use ethers::abi::Token;
use ethers::types::transaction::eip712::{EIP712Domain, Eip712};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::{id, keccak256};
use relay_core::ForwardRequest;

// OpenZeppelin ERC2771Forwarder (contracts v5).
const EIP_712_DOMAIN_NAME: &str = "ERC2771Forwarder";
const EIP_712_VERSION: &str = "1";
const EIP_712_TYPE_HASH_STR: &str = concat!(
    "ForwardRequest(address from,address to,uint256 value,uint256 gas,",
    "uint256 nonce,uint48 deadline,bytes data)"
);

/// `execute(ForwardRequestData)`. The on-chain struct has no nonce field, the
/// forwarder reads it from its own storage.
pub const EXECUTE_SIGNATURE: &str = "execute((address,address,uint256,uint256,uint48,bytes,bytes))";

/// Selector of `nonces(address)`
pub const NONCES_SELECTOR: [u8; 4] = [0x7e, 0xce, 0xbe, 0x00];

/// The EIP-712 domain of one forwarder deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwarderDomain {
    /// Chain the forwarder lives on
    pub chain_id: u64,
    /// Forwarder contract address (the verifying contract)
    pub forwarder: Address,
}

/// A forward request bound to the domain it is signed for.
#[derive(Debug, Clone, Copy)]
pub struct TypedForwardRequest<'a> {
    /// Signing domain
    pub domain: ForwarderDomain,
    /// The request being signed
    pub request: &'a ForwardRequest,
}

impl<'a> TypedForwardRequest<'a> {
    /// Bind `request` to `domain`
    pub fn new(domain: ForwarderDomain, request: &'a ForwardRequest) -> Self {
        Self { domain, request }
    }

    /// The EIP-712 digest a user signs for this request
    pub fn digest(&self) -> [u8; 32] {
        match self.encode_eip712() {
            Ok(digest) => digest,
            Err(never) => match never {},
        }
    }
}

impl Eip712 for TypedForwardRequest<'_> {
    type Error = Infallible;

    fn domain(&self) -> Result<EIP712Domain, Self::Error> {
        Ok(EIP712Domain {
            name: Some(String::from(EIP_712_DOMAIN_NAME)),
            version: Some(String::from(EIP_712_VERSION)),
            chain_id: Some(self.domain.chain_id.into()),
            verifying_contract: Some(self.domain.forwarder),
            salt: None,
        })
    }

    fn type_hash() -> Result<[u8; 32], Self::Error> {
        Ok(keccak256(EIP_712_TYPE_HASH_STR))
    }

    fn struct_hash(&self) -> Result<[u8; 32], Self::Error> {
        let req = self.request;
        Ok(keccak256(ethers::abi::encode(&[
            Token::FixedBytes(Self::type_hash()?.to_vec()),
            Token::Address(req.from),
            Token::Address(req.to),
            Token::Uint(req.value),
            Token::Uint(req.gas),
            Token::Uint(req.nonce),
            Token::Uint(U256::from(req.deadline)),
            Token::FixedBytes(keccak256(&req.data).to_vec()),
        ])))
    }
}

/// ABI-encode `execute` on the forwarder for a signed request.
pub fn build_forwarder_calldata(request: &ForwardRequest, signature: &Bytes) -> Bytes {
    let args = ethers::abi::encode(&[Token::Tuple(vec![
        Token::Address(request.from),
        Token::Address(request.to),
        Token::Uint(request.value),
        Token::Uint(request.gas),
        Token::Uint(U256::from(request.deadline)),
        Token::Bytes(request.data.to_vec()),
        Token::Bytes(signature.to_vec()),
    ])]);
    let mut calldata = id(EXECUTE_SIGNATURE).to_vec();
    calldata.extend(args);
    calldata.into()
}

/// ABI-encode `nonces(owner)`
pub fn nonces_calldata(owner: Address) -> Bytes {
    let mut calldata = NONCES_SELECTOR.to_vec();
    calldata.extend(ethers::abi::encode(&[Token::Address(owner)]));
    calldata.into()
}

#[cfg(test)]
pub(crate) mod test_utils {
    use ethers::signers::{LocalWallet, Signer};

    use super::*;

    // anvil / hardhat account #0
    pub const WALLET_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    pub fn wallet() -> LocalWallet {
        WALLET_KEY.parse::<LocalWallet>().unwrap()
    }

    pub fn domain() -> ForwarderDomain {
        ForwarderDomain {
            chain_id: 31337,
            forwarder: "0x5FbDB2315678afecb367f032d93F642f64180aa3"
                .parse()
                .unwrap(),
        }
    }

    pub fn request_from(from: Address) -> ForwardRequest {
        ForwardRequest {
            from,
            to: "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512".parse().unwrap(),
            value: U256::zero(),
            gas: U256::from(100_000),
            nonce: U256::zero(),
            deadline: 1_900_000_000,
            data: hex::decode("a9059cbb0000000000000000000000000000000000000000000000000000000000000001")
                .unwrap()
                .into(),
        }
    }

    pub async fn sign(request: &ForwardRequest) -> String {
        let sig = wallet()
            .sign_typed_data(&TypedForwardRequest::new(domain(), request))
            .await
            .unwrap();
        format!("0x{sig}")
    }
}

#[cfg(test)]
mod tests {
    use ethers::abi::ParamType;
    use ethers::signers::Signer;
    use ethers::types::transaction::eip712::TypedData;

    use super::test_utils::*;
    use super::*;

    #[test]
    fn nonces_selector_matches_signature() {
        assert_eq!(id("nonces(address)"), NONCES_SELECTOR);
    }

    #[test]
    fn nonces_calldata_left_pads_owner() {
        let owner = Address::repeat_byte(0xab);
        let calldata = nonces_calldata(owner);
        assert_eq!(calldata.len(), 36);
        assert_eq!(&calldata[..4], &NONCES_SELECTOR);
        assert_eq!(&calldata[4..16], &[0u8; 12]);
        assert_eq!(&calldata[16..], owner.as_bytes());
    }

    // Cross-check the hand-written struct hash against ethers' generic
    // EIP-712 JSON encoder.
    #[test]
    fn digest_matches_generic_typed_data_encoding() {
        let request = request_from(wallet().address());
        let domain = domain();
        let typed: TypedData = serde_json::from_value(serde_json::json!({
            "types": {
                "EIP712Domain": [
                    {"name": "name", "type": "string"},
                    {"name": "version", "type": "string"},
                    {"name": "chainId", "type": "uint256"},
                    {"name": "verifyingContract", "type": "address"}
                ],
                "ForwardRequest": [
                    {"name": "from", "type": "address"},
                    {"name": "to", "type": "address"},
                    {"name": "value", "type": "uint256"},
                    {"name": "gas", "type": "uint256"},
                    {"name": "nonce", "type": "uint256"},
                    {"name": "deadline", "type": "uint48"},
                    {"name": "data", "type": "bytes"}
                ]
            },
            "primaryType": "ForwardRequest",
            "domain": {
                "name": "ERC2771Forwarder",
                "version": "1",
                "chainId": domain.chain_id,
                "verifyingContract": format!("{:?}", domain.forwarder)
            },
            "message": {
                "from": format!("{:?}", request.from),
                "to": format!("{:?}", request.to),
                "value": "0",
                "gas": "100000",
                "nonce": "0",
                "deadline": request.deadline,
                "data": format!("0x{}", hex::encode(&request.data))
            }
        }))
        .unwrap();

        assert_eq!(
            TypedForwardRequest::new(domain, &request).digest(),
            typed.encode_eip712().unwrap()
        );
    }

    #[test]
    fn digest_depends_on_domain() {
        let request = request_from(Address::repeat_byte(1));
        let a = TypedForwardRequest::new(domain(), &request).digest();
        let other_chain = ForwarderDomain {
            chain_id: 1,
            ..domain()
        };
        let b = TypedForwardRequest::new(other_chain, &request).digest();
        assert_ne!(a, b);
    }

    #[test]
    fn execute_calldata_layout() {
        let request = request_from(Address::repeat_byte(0x11));
        let signature: Bytes = vec![0x22; 65].into();
        let calldata = build_forwarder_calldata(&request, &signature);

        assert_eq!(&calldata[..4], &id(EXECUTE_SIGNATURE));
        let decoded = ethers::abi::decode(
            &[ParamType::Tuple(vec![
                ParamType::Address,
                ParamType::Address,
                ParamType::Uint(256),
                ParamType::Uint(256),
                ParamType::Uint(48),
                ParamType::Bytes,
                ParamType::Bytes,
            ])],
            &calldata[4..],
        )
        .unwrap();
        let Token::Tuple(fields) = &decoded[0] else {
            panic!("expected a tuple");
        };
        assert_eq!(fields[0], Token::Address(request.from));
        assert_eq!(fields[1], Token::Address(request.to));
        assert_eq!(fields[3], Token::Uint(request.gas));
        assert_eq!(fields[4], Token::Uint(request.deadline.into()));
        assert_eq!(fields[5], Token::Bytes(request.data.to_vec()));
        assert_eq!(fields[6], Token::Bytes(signature.to_vec()));

        // deterministic
        assert_eq!(calldata, build_forwarder_calldata(&request, &signature));
    }
}
