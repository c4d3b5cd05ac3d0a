use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use relay_core::{Address, DirectRequest, ForwardRequest, U256};
use relay_ethereum::{ChainResult, ForwarderDomain, ForwarderNonces, TypedForwardRequest};

mockall::mock! {
    pub Nonces {}

    #[async_trait]
    impl ForwarderNonces for Nonces {
        async fn nonce_of(&self, forwarder: Address, owner: Address) -> ChainResult<U256>;
    }
}

pub fn nonces_returning(nonce: u64) -> MockNonces {
    let mut nonces = MockNonces::new();
    nonces
        .expect_nonce_of()
        .returning(move |_, _| Ok(U256::from(nonce)));
    nonces
}

// anvil account #0
pub fn wallet() -> LocalWallet {
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
        .parse()
        .unwrap()
}

pub fn domain() -> ForwarderDomain {
    ForwarderDomain {
        chain_id: 31337,
        forwarder: "0x5FbDB2315678afecb367f032d93F642f64180aa3"
            .parse()
            .unwrap(),
    }
}

pub fn future_deadline() -> u64 {
    chrono::Utc::now().timestamp() as u64 + 3600
}

pub fn forward_request(nonce: U256, deadline: u64) -> ForwardRequest {
    ForwardRequest {
        from: wallet().address(),
        to: "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512".parse().unwrap(),
        value: U256::zero(),
        gas: U256::from(80_000),
        nonce,
        deadline,
        data: vec![0xa9, 0x05, 0x9c, 0xbb].into(),
    }
}

pub async fn sign(request: &ForwardRequest) -> String {
    let signature = wallet()
        .sign_typed_data(&TypedForwardRequest::new(domain(), request))
        .await
        .unwrap();
    format!("0x{signature}")
}

pub fn direct_request() -> DirectRequest {
    DirectRequest {
        to: Address::repeat_byte(0x11),
        data: vec![0xde, 0xad].into(),
        value: Some(U256::from(7)),
        gas_limit: None,
        speed: None,
    }
}
