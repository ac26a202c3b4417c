//! Shared fixtures for the cross-crate flows under `tests/`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Bytes, U256};
use sponsorkit_aa::{AccountFactory, InMemoryRelay, SolCounterAbi};
use sponsorkit_auth::{LocalKeyProvider, LocalSigner};
use sponsorkit_chain::{ChainConfig, ConfigError, EnvConfig, InMemoryChain};
use sponsorkit_common::{Result, SecretBytes, UserInfo};
use sponsorkit_session::{CounterApp, SessionOptions, WalletSession};

pub const POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Environment as the gateway would read it, with an optional `CHAIN_ID`.
pub fn env_config(chain_id: Option<&str>) -> std::result::Result<EnvConfig, ConfigError> {
    let mut env: HashMap<&str, String> = HashMap::from([
        ("SPONSOR_API_KEY", "testnet-key".to_string()),
        ("SPONSOR_API_KEY_MAINNET", "mainnet-key".to_string()),
        ("MUMBAI_RPC_URL", "https://mumbai.example".to_string()),
        ("BASEGOERLI_RPC_URL", "https://base-goerli.example".to_string()),
        ("GNOSIS_RPC_URL", "https://gnosis.example".to_string()),
        ("IDENTITY_CLIENT_ID", "client-e2e".to_string()),
        (
            "WALLET_FACTORY_ADDRESS",
            "0x00000000000000000000000000000000000000fa".to_string(),
        ),
        ("WALLET_INIT_CODE_HASH", format!("0x{}", "ab".repeat(32))),
        ("POLL_INTERVAL_MS", POLL_INTERVAL.as_millis().to_string()),
    ]);
    if let Some(id) = chain_id {
        env.insert("CHAIN_ID", id.to_string());
    }
    EnvConfig::from_lookup(|k| env.get(k).cloned())
}

/// Deterministic development identity.
pub fn local_provider() -> LocalKeyProvider {
    let signer = match LocalSigner::from_secret(&SecretBytes(vec![0x11; 32])) {
        Ok(signer) => signer,
        Err(_) => LocalSigner::random(),
    };
    LocalKeyProvider::new(
        signer,
        UserInfo {
            email: Some("e2e@example.com".into()),
            name: Some("End To End".into()),
            type_of_login: Some("google".into()),
            ..Default::default()
        },
    )
}

/// Wallet session wired to in-memory chain and relay for the configured chain.
pub struct Harness {
    pub chain_config: ChainConfig,
    pub chain: Arc<InMemoryChain>,
    pub relay: Arc<InMemoryRelay>,
    pub provider: Arc<LocalKeyProvider>,
    pub app: CounterApp,
}

impl Harness {
    pub fn new(config: &EnvConfig, provider: LocalKeyProvider) -> Self {
        let chain_config = config.chain_config();
        let chain = Arc::new(InMemoryChain::new(chain_config.chain_id));
        let relay = Arc::new(InMemoryRelay::new());
        let provider = Arc::new(provider);
        let options = SessionOptions::new(
            config.identity_client_id.clone(),
            AccountFactory::new(config.wallet_factory, config.wallet_init_code_hash),
            Arc::new(SolCounterAbi),
        )
        .with_poll_interval(config.poll_interval);
        let session = WalletSession::new(provider.clone(), relay.clone(), options);
        Self {
            chain_config,
            chain,
            relay,
            provider,
            app: CounterApp::new(Arc::new(session)),
        }
    }

    pub fn session(&self) -> &Arc<WalletSession> {
        self.app.session()
    }

    pub async fn init(&self) -> Result<()> {
        self.session()
            .init(self.chain_config.clone(), self.chain.clone())
            .await
    }

    /// Value the counter contract reports from now on.
    pub fn set_counter(&self, value: u64) {
        self.chain.set_call_result(
            self.chain_config.target,
            SolCounterAbi::COUNTER_SELECTOR,
            Bytes::from(U256::from(value).to_be_bytes::<32>().to_vec()),
        );
    }
}
