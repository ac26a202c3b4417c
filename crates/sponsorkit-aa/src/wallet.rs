use std::sync::Arc;

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall, SolValue};
use serde::Serialize;
use sponsorkit_chain::{ChainConfig, ChainReader};
use sponsorkit_common::{Result, SigningProvider, SponsorError, TaskId, TaskStatus};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::relay::{RelayClient, SponsoredCallRequest};

sol! {
    interface ISmartWallet {
        function execute(address target, uint256 value, bytes data, uint256 nonce, bytes signature) external;
        function nonce() external view returns (uint256);
    }

    interface IWalletFactory {
        function deployAndExecute(address owner, bytes32 salt, address target, uint256 value, bytes data, bytes signature) external returns (address);
    }
}

// ---------------------------------------------------------------------------
// AccountFactory: deterministic CREATE2 address computation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountFactory {
    pub factory_address: Address,
    pub init_code_hash: B256,
}

impl AccountFactory {
    pub fn new(factory_address: Address, init_code_hash: B256) -> Self {
        Self {
            factory_address,
            init_code_hash,
        }
    }

    /// `keccak256(owner ++ index)`
    pub fn salt(owner: &Address, index: u64) -> B256 {
        let mut preimage = Vec::with_capacity(28);
        preimage.extend_from_slice(owner.as_slice());
        preimage.extend_from_slice(&index.to_be_bytes());
        keccak256(preimage)
    }

    /// Counterfactual wallet address; identical before and after deployment.
    pub fn compute_address(&self, owner: &Address, index: u64) -> Address {
        self.factory_address
            .create2(Self::salt(owner, index), self.init_code_hash)
    }
}

// ---------------------------------------------------------------------------
// Meta-transactions
// ---------------------------------------------------------------------------

/// Call the wallet executes on behalf of its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaTransaction {
    pub chain_id: u64,
    pub wallet: Address,
    pub target: Address,
    pub value: U256,
    pub data: Bytes,
    pub nonce: U256,
}

impl MetaTransaction {
    /// Digest the owner signs. Binds chain, wallet and nonce so a signature
    /// cannot be replayed elsewhere.
    pub fn signing_hash(&self) -> B256 {
        let encoded = (
            U256::from(self.chain_id),
            self.wallet,
            self.target,
            self.value,
            self.data.clone(),
            self.nonce,
        )
            .abi_encode();
        keccak256(encoded)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendTransactionResponse {
    pub task_id: TaskId,
}

// ---------------------------------------------------------------------------
// SmartWalletSession
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct WalletBinding {
    owner: Address,
    address: Address,
}

/// Next nonce to sign and the submissions signed with earlier ones that the
/// relay has not settled yet.
#[derive(Debug, Default)]
struct NonceState {
    next: U256,
    inflight: Vec<TaskId>,
}

/// Relayer-backed smart wallet bound to one signing provider.
///
/// [`init`](Self::init) must complete before any other operation. Sends are
/// serialized so each submission signs a distinct nonce.
pub struct SmartWalletSession {
    signer: Arc<dyn SigningProvider>,
    api_key: String,
    chain_id: u64,
    factory: AccountFactory,
    reader: Arc<dyn ChainReader>,
    relay: Arc<dyn RelayClient>,
    binding: Option<WalletBinding>,
    nonce: Mutex<NonceState>,
}

impl SmartWalletSession {
    pub fn new(
        signer: Arc<dyn SigningProvider>,
        chain: &ChainConfig,
        factory: AccountFactory,
        reader: Arc<dyn ChainReader>,
        relay: Arc<dyn RelayClient>,
    ) -> Self {
        Self {
            signer,
            api_key: chain.api_key.clone(),
            chain_id: chain.chain_id,
            factory,
            reader,
            relay,
            binding: None,
            nonce: Mutex::new(NonceState::default()),
        }
    }

    /// Handshake: bind the signer's address, derive the wallet address and
    /// load the wallet nonce. Idempotent once it has succeeded.
    pub async fn init(&mut self) -> Result<()> {
        if self.binding.is_some() {
            return Ok(());
        }

        let owner = self.signer.address().await?;
        let remote_chain = self.reader.chain_id().await?;
        if remote_chain != self.chain_id {
            return Err(SponsorError::Config(format!(
                "RPC endpoint serves chain {remote_chain}, expected {}",
                self.chain_id
            )));
        }

        let address = self.factory.compute_address(&owner, 0);
        let deployed = !self.reader.get_code(address).await?.is_empty();
        let nonce = if deployed {
            self.read_nonce(address).await?
        } else {
            U256::ZERO
        };

        *self.nonce.get_mut() = NonceState {
            next: nonce,
            inflight: Vec::new(),
        };
        self.binding = Some(WalletBinding { owner, address });
        info!(%owner, wallet = %address, deployed, %nonce, "Smart wallet initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.binding.is_some()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn binding(&self) -> Result<WalletBinding> {
        self.binding.ok_or(SponsorError::NotInitialized("smart wallet"))
    }

    pub fn get_address(&self) -> Result<Address> {
        Ok(self.binding()?.address)
    }

    pub fn owner(&self) -> Result<Address> {
        Ok(self.binding()?.owner)
    }

    /// Live check: wallet code present on chain.
    pub async fn is_deployed(&self) -> Result<bool> {
        let address = self.binding()?.address;
        Ok(!self.reader.get_code(address).await?.is_empty())
    }

    async fn read_nonce(&self, wallet: Address) -> Result<U256> {
        let output = self
            .reader
            .call(wallet, ISmartWallet::nonceCall {}.abi_encode().into())
            .await?;
        ISmartWallet::nonceCall::abi_decode_returns(&output)
            .map_err(|e| SponsorError::Rpc(format!("invalid nonce() return data: {e}")))
    }

    /// Drop settled submissions and realign the local nonce with the chain.
    ///
    /// While earlier submissions are still in flight the local nonce may run
    /// ahead of the chain. Once they have all settled, or one of them failed
    /// and left its nonce unused, the chain value is authoritative.
    async fn sync_nonce(
        &self,
        state: &mut NonceState,
        wallet: Address,
        deployed: bool,
    ) -> Result<()> {
        let on_chain = if deployed {
            self.read_nonce(wallet).await?
        } else {
            U256::ZERO
        };

        let mut failed = false;
        let mut still_inflight = Vec::with_capacity(state.inflight.len());
        for task_id in state.inflight.drain(..) {
            match self.relay.task_state(&task_id).await {
                Ok(s) if s.is_terminal() => {
                    if s.task_status() == TaskStatus::Failed {
                        debug!(%task_id, ?s, "Submission failed on chain; nonce left unused");
                        failed = true;
                    }
                }
                Ok(_) => still_inflight.push(task_id),
                Err(e) => {
                    warn!(%task_id, error = %e, "Submission status unknown; treating as in flight");
                    still_inflight.push(task_id);
                }
            }
        }
        state.inflight = still_inflight;

        let next = if failed || state.inflight.is_empty() {
            on_chain
        } else {
            state.next.max(on_chain)
        };
        if next != state.next {
            info!(wallet = %wallet, from = %state.next, to = %next, "Wallet nonce resynchronized");
            state.next = next;
        }
        Ok(())
    }

    /// Sign `data` for `target` and hand it to the relay. Deploys the wallet
    /// in the same sponsored call when it has no code yet.
    pub async fn send_transaction(
        &self,
        target: Address,
        data: Bytes,
    ) -> Result<SendTransactionResponse> {
        let binding = self.binding()?;
        let mut nonce = self.nonce.lock().await;
        let deployed = self.is_deployed().await?;
        self.sync_nonce(&mut nonce, binding.address, deployed).await?;

        let meta = MetaTransaction {
            chain_id: self.chain_id,
            wallet: binding.address,
            target,
            value: U256::ZERO,
            data,
            nonce: nonce.next,
        };
        let signature: Bytes = self.signer.sign_hash(meta.signing_hash()).await?.into();

        let (relay_target, call_data) = if deployed {
            let call = ISmartWallet::executeCall {
                target,
                value: meta.value,
                data: meta.data.clone(),
                nonce: meta.nonce,
                signature,
            };
            (binding.address, call.abi_encode())
        } else {
            debug!(wallet = %binding.address, "Wallet not deployed; bundling deployment");
            let call = IWalletFactory::deployAndExecuteCall {
                owner: binding.owner,
                salt: AccountFactory::salt(&binding.owner, 0),
                target,
                value: meta.value,
                data: meta.data.clone(),
                signature,
            };
            (self.factory.factory_address, call.abi_encode())
        };

        let request = SponsoredCallRequest {
            chain_id: self.chain_id,
            target: relay_target,
            data: call_data.into(),
            sponsor_api_key: self.api_key.clone(),
        };
        let task_id = self
            .relay
            .sponsored_call(&request)
            .await
            .map_err(|e| SponsorError::TransactionSubmission(e.to_string()))?;

        nonce.next += U256::from(1);
        nonce.inflight.push(task_id.clone());
        info!(%task_id, wallet = %binding.address, %target, "Sponsored call submitted");
        Ok(SendTransactionResponse { task_id })
    }
}

impl std::fmt::Debug for SmartWalletSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartWalletSession")
            .field("chain_id", &self.chain_id)
            .field("binding", &self.binding)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{InMemoryRelay, RelayTaskState};
    use alloy_primitives::address;
    use sponsorkit_auth::LocalSigner;
    use sponsorkit_chain::{InMemoryChain, Network};

    const CHAIN_ID: u64 = 80001;

    fn chain_config() -> ChainConfig {
        ChainConfig {
            network: Network::Mumbai,
            name: "Mumbai".into(),
            chain_id: CHAIN_ID,
            target: Network::Mumbai.target(),
            api_key: "sponsor-key".into(),
            rpc_url: "https://mumbai.example".parse().unwrap(),
        }
    }

    fn factory() -> AccountFactory {
        AccountFactory::new(
            address!("00000000000000000000000000000000000000fa"),
            B256::repeat_byte(0xab),
        )
    }

    struct Fixture {
        chain: Arc<InMemoryChain>,
        relay: Arc<InMemoryRelay>,
        wallet: SmartWalletSession,
    }

    fn fixture(chain_id: u64) -> Fixture {
        let chain = Arc::new(InMemoryChain::new(chain_id));
        let relay = Arc::new(InMemoryRelay::new());
        let wallet = SmartWalletSession::new(
            Arc::new(LocalSigner::random()),
            &chain_config(),
            factory(),
            chain.clone(),
            relay.clone(),
        );
        Fixture {
            chain,
            relay,
            wallet,
        }
    }

    #[test]
    fn test_address_is_deterministic_per_owner() {
        let f = factory();
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        assert_eq!(f.compute_address(&a, 0), f.compute_address(&a, 0));
        assert_ne!(f.compute_address(&a, 0), f.compute_address(&b, 0));
        assert_ne!(f.compute_address(&a, 0), f.compute_address(&a, 1));
    }

    #[test]
    fn test_signing_hash_binds_nonce_and_chain() {
        let meta = MetaTransaction {
            chain_id: CHAIN_ID,
            wallet: Address::repeat_byte(1),
            target: Address::repeat_byte(2),
            value: U256::ZERO,
            data: Bytes::from(vec![0xd0, 0x9d, 0xe0, 0x8a]),
            nonce: U256::ZERO,
        };
        let mut next = meta.clone();
        next.nonce = U256::from(1);
        let mut other_chain = meta.clone();
        other_chain.chain_id = 100;
        assert_ne!(meta.signing_hash(), next.signing_hash());
        assert_ne!(meta.signing_hash(), other_chain.signing_hash());
    }

    #[tokio::test]
    async fn test_operations_require_init() {
        let f = fixture(CHAIN_ID);
        assert!(!f.wallet.is_initialized());
        assert!(matches!(
            f.wallet.get_address(),
            Err(SponsorError::NotInitialized("smart wallet"))
        ));
        assert!(matches!(
            f.wallet.is_deployed().await,
            Err(SponsorError::NotInitialized(_))
        ));
        assert!(f
            .wallet
            .send_transaction(Address::repeat_byte(2), Bytes::new())
            .await
            .is_err());
        assert!(f.relay.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_init_derives_address() {
        let mut f = fixture(CHAIN_ID);
        f.wallet.init().await.unwrap();
        let owner = f.wallet.owner().unwrap();
        assert_eq!(
            f.wallet.get_address().unwrap(),
            factory().compute_address(&owner, 0)
        );
        assert!(!f.wallet.is_deployed().await.unwrap());
    }

    #[tokio::test]
    async fn test_init_rejects_chain_mismatch() {
        let mut f = fixture(100);
        assert!(matches!(f.wallet.init().await, Err(SponsorError::Config(_))));
        assert!(!f.wallet.is_initialized());
    }

    #[tokio::test]
    async fn test_init_loads_nonce_of_deployed_wallet() {
        let mut f = fixture(CHAIN_ID);
        // Derive the address first, then mark it deployed with nonce 7.
        f.wallet.init().await.unwrap();
        let wallet = f.wallet.get_address().unwrap();
        f.chain.set_code(wallet, Bytes::from(vec![0x60, 0x80]));
        f.chain.set_call_result(
            wallet,
            ISmartWallet::nonceCall::SELECTOR,
            Bytes::from(U256::from(7).to_be_bytes::<32>().to_vec()),
        );
        f.wallet.binding = None;
        f.wallet.init().await.unwrap();

        f.wallet
            .send_transaction(Address::repeat_byte(2), Bytes::from(vec![1, 2, 3, 4]))
            .await
            .unwrap();
        let sent = &f.relay.submissions()[0];
        let call = ISmartWallet::executeCall::abi_decode(&sent.data).unwrap();
        assert_eq!(call.nonce, U256::from(7));
    }

    #[tokio::test]
    async fn test_first_send_deploys_through_factory() {
        let mut f = fixture(CHAIN_ID);
        f.wallet.init().await.unwrap();
        let resp = f
            .wallet
            .send_transaction(Network::Mumbai.target(), Bytes::from(vec![0xd0, 0x9d, 0xe0, 0x8a]))
            .await
            .unwrap();
        assert!(resp.task_id.starts_with("0x"));

        let sent = &f.relay.submissions()[0];
        assert_eq!(sent.chain_id, CHAIN_ID);
        assert_eq!(sent.target, factory().factory_address);
        assert_eq!(sent.sponsor_api_key, "sponsor-key");
        let call = IWalletFactory::deployAndExecuteCall::abi_decode(&sent.data).unwrap();
        assert_eq!(call.owner, f.wallet.owner().unwrap());
        assert_eq!(call.target, Network::Mumbai.target());
        assert_eq!(call.signature.len(), 65);
    }

    /// Give the bound wallet code and an on-chain `nonce()`.
    fn deploy(f: &Fixture, nonce: u64) -> Address {
        let wallet = f.wallet.get_address().unwrap();
        f.chain.set_code(wallet, Bytes::from(vec![0x60, 0x80]));
        f.chain.set_call_result(
            wallet,
            ISmartWallet::nonceCall::SELECTOR,
            Bytes::from(U256::from(nonce).to_be_bytes::<32>().to_vec()),
        );
        wallet
    }

    fn signed_nonce(f: &Fixture, index: usize) -> U256 {
        let sent = &f.relay.submissions()[index];
        ISmartWallet::executeCall::abi_decode(&sent.data).unwrap().nonce
    }

    #[tokio::test]
    async fn test_deployed_wallet_executes_with_increasing_nonce() {
        let mut f = fixture(CHAIN_ID);
        f.wallet.init().await.unwrap();
        let wallet = deploy(&f, 0);

        for _ in 0..2 {
            f.wallet
                .send_transaction(Address::repeat_byte(2), Bytes::from(vec![1, 2, 3, 4]))
                .await
                .unwrap();
        }
        let sent = f.relay.submissions();
        assert_eq!(sent[0].target, wallet);
        let first = ISmartWallet::executeCall::abi_decode(&sent[0].data).unwrap();
        let second = ISmartWallet::executeCall::abi_decode(&sent[1].data).unwrap();
        assert_eq!(first.nonce, U256::ZERO);
        assert_eq!(second.nonce, U256::from(1));
    }

    #[tokio::test]
    async fn test_relay_rejection_is_submission_error() {
        let mut f = fixture(CHAIN_ID);
        f.wallet.init().await.unwrap();
        f.relay.set_rejection(Some("sponsor balance too low".into()));
        let err = f
            .wallet
            .send_transaction(Address::repeat_byte(2), Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SponsorError::TransactionSubmission(_)));

        // A rejected submission does not consume the nonce.
        f.relay.set_rejection(None);
        deploy(&f, 0);
        f.wallet
            .send_transaction(Address::repeat_byte(2), Bytes::new())
            .await
            .unwrap();
        assert_eq!(signed_nonce(&f, 0), U256::ZERO);
    }

    #[tokio::test]
    async fn test_reverted_submission_releases_its_nonce() {
        let mut f = fixture(CHAIN_ID);
        f.wallet.init().await.unwrap();
        deploy(&f, 0);

        let first = f
            .wallet
            .send_transaction(Address::repeat_byte(2), Bytes::from(vec![1, 2, 3, 4]))
            .await
            .unwrap();
        // Accepted by the relay, reverted on chain: nonce() is still 0.
        f.relay.set_state(&first.task_id, RelayTaskState::ExecReverted);

        f.wallet
            .send_transaction(Address::repeat_byte(2), Bytes::from(vec![1, 2, 3, 4]))
            .await
            .unwrap();
        assert_eq!(signed_nonce(&f, 0), U256::ZERO);
        assert_eq!(signed_nonce(&f, 1), U256::ZERO);
    }

    #[tokio::test]
    async fn test_settled_submissions_follow_chain_nonce() {
        let mut f = fixture(CHAIN_ID);
        f.wallet.init().await.unwrap();
        deploy(&f, 0);

        let first = f
            .wallet
            .send_transaction(Address::repeat_byte(2), Bytes::new())
            .await
            .unwrap();
        f.relay.set_state(&first.task_id, RelayTaskState::ExecSuccess);
        // Executed elsewhere too: the chain moved further than we did.
        deploy(&f, 5);

        f.wallet
            .send_transaction(Address::repeat_byte(2), Bytes::new())
            .await
            .unwrap();
        assert_eq!(signed_nonce(&f, 1), U256::from(5));
    }

    #[tokio::test]
    async fn test_unknown_status_keeps_local_nonce_ahead() {
        let mut f = fixture(CHAIN_ID);
        f.wallet.init().await.unwrap();
        deploy(&f, 0);

        f.wallet
            .send_transaction(Address::repeat_byte(2), Bytes::new())
            .await
            .unwrap();
        f.relay.set_status_unavailable(true);
        f.wallet
            .send_transaction(Address::repeat_byte(2), Bytes::new())
            .await
            .unwrap();
        assert_eq!(signed_nonce(&f, 1), U256::from(1));
    }
}
