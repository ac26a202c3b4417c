use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use serde::Serialize;
use sponsorkit_aa::{
    AccountFactory, CounterAbi, CounterContract, CounterStatusSource, RelayClient,
    SmartWalletSession, StatusPoller, StatusSnapshot, TransactionTracker,
};
use sponsorkit_auth::{IdentityProvider, IdentitySettings};
use sponsorkit_chain::{ChainConfig, ChainReader, DEFAULT_POLL_INTERVAL_MS};
use sponsorkit_common::{
    Result, SessionEpoch, SessionTicket, SigningProvider, SponsorError, UserInfo, WalletAccount,
};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle of a [`WalletSession`].
///
/// `Unauthenticated → Initializing → Idle → Connecting → Authenticated →
/// Disconnecting → Idle`. `Initializing` is entered at most once.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    Initializing,
    Idle,
    Connecting,
    Authenticated,
    Disconnecting,
}

pub struct SessionOptions {
    pub client_id: String,
    pub factory: AccountFactory,
    pub counter_abi: Arc<dyn CounterAbi>,
    pub poll_interval: Duration,
}

impl SessionOptions {
    pub fn new(
        client_id: impl Into<String>,
        factory: AccountFactory,
        counter_abi: Arc<dyn CounterAbi>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            factory,
            counter_abi,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// What a submission needs, captured at one instant.
pub struct SubmissionContext {
    pub contract: Option<CounterContract>,
    pub wallet: Option<Arc<SmartWalletSession>>,
    pub ticket: SessionTicket,
}

/// Chain binding fixed by `init`.
struct ChainContext {
    config: Arc<ChainConfig>,
    reader: Arc<dyn ChainReader>,
    contract: CounterContract,
}

/// One authenticated session. Dropping it stops its poller.
struct Session {
    id: Uuid,
    ticket: SessionTicket,
    signer: Arc<dyn SigningProvider>,
    wallet: Option<Arc<SmartWalletSession>>,
    poller: Option<StatusPoller>,
    cancel: CancellationToken,
}

struct Inner {
    state: SessionState,
    chain: Option<ChainContext>,
    session: Option<Session>,
    connect_cancel: Option<CancellationToken>,
}

/// Orchestrates identity provider, smart wallet, task tracking and status
/// polling for a single user.
///
/// Every login and logout advances the session epoch; completions that
/// captured an older ticket are discarded instead of applied.
pub struct WalletSession {
    provider: Arc<dyn IdentityProvider>,
    relay: Arc<dyn RelayClient>,
    options: SessionOptions,
    epoch: SessionEpoch,
    tracker: Arc<TransactionTracker>,
    shutdown: CancellationToken,
    inner: Mutex<Inner>,
}

impl WalletSession {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        relay: Arc<dyn RelayClient>,
        options: SessionOptions,
    ) -> Self {
        let epoch = SessionEpoch::new();
        Self {
            tracker: Arc::new(TransactionTracker::new(relay.clone(), epoch.clone())),
            provider,
            relay,
            options,
            epoch,
            shutdown: CancellationToken::new(),
            inner: Mutex::new(Inner {
                state: SessionState::Unauthenticated,
                chain: None,
                session: None,
                connect_cancel: None,
            }),
        }
    }

    /// Configure the identity provider for `chain`. Runs once; a rejected
    /// configuration is final.
    ///
    /// When the provider restores a cached credential the session goes
    /// straight to `Authenticated`.
    pub async fn init(&self, chain: ChainConfig, reader: Arc<dyn ChainReader>) -> Result<()> {
        {
            let mut inner = self.inner.lock().await;
            if inner.state != SessionState::Unauthenticated {
                return Err(SponsorError::AlreadyInitialized);
            }
            inner.state = SessionState::Initializing;
        }

        let settings = IdentitySettings::for_chain(self.options.client_id.clone(), &chain);
        let restored = self.provider.init(&settings).await.map_err(|e| match e {
            SponsorError::ProviderInit(_) => e,
            other => SponsorError::ProviderInit(other.to_string()),
        });
        let restored = match restored {
            Ok(restored) => restored,
            Err(e) => {
                warn!(chain_id = chain.chain_id, error = %e, "Identity provider rejected configuration");
                return Err(e);
            }
        };

        let mut inner = self.inner.lock().await;
        let config = Arc::new(chain);
        let contract = CounterContract::new(
            config.target,
            self.options.counter_abi.clone(),
            reader.clone(),
        );
        info!(chain_id = config.chain_id, network = %config.name, "Wallet session initialized");
        inner.chain = Some(ChainContext {
            config,
            reader,
            contract,
        });
        inner.state = SessionState::Idle;

        if let Some(signer) = restored {
            let ticket = self.open_session(&mut inner, signer.clone());
            drop(inner);
            if let Err(e) = self.attach_wallet(ticket, signer).await {
                warn!(error = %e, "Restored session has no smart wallet");
            }
        }
        Ok(())
    }

    /// Connect through the identity provider and bind a smart wallet.
    ///
    /// A second login while authenticated is rejected. If the connection
    /// succeeds but wallet initialization fails, the session stays
    /// authenticated and the error is returned; see
    /// [`init_smart_wallet`](Self::init_smart_wallet).
    pub async fn login(&self) -> Result<()> {
        let cancel = {
            let mut inner = self.inner.lock().await;
            match inner.state {
                SessionState::Unauthenticated | SessionState::Initializing => {
                    return Err(SponsorError::NotInitialized("identity provider"));
                }
                SessionState::Connecting
                | SessionState::Authenticated
                | SessionState::Disconnecting => return Err(SponsorError::AlreadyConnected),
                SessionState::Idle => {}
            }
            let cancel = self.shutdown.child_token();
            inner.state = SessionState::Connecting;
            inner.connect_cancel = Some(cancel.clone());
            cancel
        };

        debug!("Connecting identity provider");
        let connected = self.provider.connect(cancel.clone()).await;

        let mut inner = self.inner.lock().await;
        inner.connect_cancel = None;
        let signer = match connected {
            Ok(_) if cancel.is_cancelled() => {
                inner.state = SessionState::Idle;
                drop(inner);
                if let Err(e) = self.provider.disconnect().await {
                    warn!(error = %e, "Failed to drop connection completed after cancellation");
                }
                return Err(SponsorError::Identity("login cancelled".into()));
            }
            Ok(signer) => signer,
            Err(e) => {
                inner.state = SessionState::Idle;
                warn!(error = %e, "Identity provider connection failed");
                return Err(e);
            }
        };

        let ticket = self.open_session(&mut inner, signer.clone());
        drop(inner);
        self.attach_wallet(ticket, signer).await.map(|_| ())
    }

    /// Retry smart-wallet initialization for the current session.
    pub async fn init_smart_wallet(&self) -> Result<Address> {
        let (ticket, signer) = {
            let inner = self.inner.lock().await;
            let session = inner.session.as_ref().ok_or(SponsorError::NotConnected)?;
            if let Some(wallet) = &session.wallet {
                return wallet.get_address();
            }
            (session.ticket.clone(), session.signer.clone())
        };
        self.attach_wallet(ticket, signer).await
    }

    /// Tear down the current session. Always succeeds locally; a failed
    /// remote disconnect is only logged. Returns whether a session was
    /// closed. A login still waiting on the provider is cancelled instead.
    pub async fn logout(&self) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.state {
            SessionState::Authenticated => {}
            SessionState::Connecting => {
                if let Some(cancel) = inner.connect_cancel.take() {
                    cancel.cancel();
                }
                debug!("Logout cancelled a pending login");
                return false;
            }
            _ => {
                debug!("Logout without an active session");
                return false;
            }
        }

        self.epoch.advance();
        inner.state = SessionState::Disconnecting;
        let session = inner.session.take();
        if let Some(session) = &session {
            session.cancel.cancel();
            if let Some(poller) = &session.poller {
                poller.cancel();
            }
        }
        self.tracker.clear();
        drop(inner);

        // Local teardown is complete; the remote round trip runs unlocked
        // while the state reads Disconnecting.
        if let Err(e) = self.provider.disconnect().await {
            warn!(error = %e, "Remote disconnect failed; session cleared locally");
        }
        self.provider.clear_cache().await;

        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Disconnecting {
            inner.state = SessionState::Idle;
        }
        if let Some(session) = session {
            info!(session_id = %session.id, "Session closed");
        }
        true
    }

    pub async fn user_info(&self) -> Result<UserInfo> {
        self.require_authenticated().await?;
        self.provider.user_info().await
    }

    /// Signing account view: address, native balance and chain id.
    pub async fn wallet_account(&self) -> Result<WalletAccount> {
        let (signer, reader, chain_id) = {
            let inner = self.inner.lock().await;
            let session = inner.session.as_ref().ok_or(SponsorError::NotConnected)?;
            let chain = inner
                .chain
                .as_ref()
                .ok_or(SponsorError::NotInitialized("wallet session"))?;
            (
                session.signer.clone(),
                chain.reader.clone(),
                chain.config.chain_id,
            )
        };
        let address = signer.address().await?;
        let balance = reader.get_balance(address).await?;
        Ok(WalletAccount {
            address,
            balance,
            chain_id,
        })
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    pub async fn session_id(&self) -> Option<Uuid> {
        self.inner.lock().await.session.as_ref().map(|s| s.id)
    }

    pub async fn chain(&self) -> Option<Arc<ChainConfig>> {
        self.inner
            .lock()
            .await
            .chain
            .as_ref()
            .map(|c| c.config.clone())
    }

    pub async fn smart_wallet(&self) -> Option<Arc<SmartWalletSession>> {
        self.inner
            .lock()
            .await
            .session
            .as_ref()
            .and_then(|s| s.wallet.clone())
    }

    /// Latest status published for the current session.
    pub async fn status(&self) -> Option<StatusSnapshot> {
        self.inner
            .lock()
            .await
            .session
            .as_ref()
            .and_then(|s| s.poller.as_ref())
            .and_then(|p| p.latest())
    }

    pub async fn subscribe_status(&self) -> Option<watch::Receiver<Option<StatusSnapshot>>> {
        self.inner
            .lock()
            .await
            .session
            .as_ref()
            .and_then(|s| s.poller.as_ref())
            .map(|p| p.subscribe())
    }

    pub fn tracker(&self) -> &Arc<TransactionTracker> {
        &self.tracker
    }

    pub async fn submission_context(&self) -> SubmissionContext {
        let inner = self.inner.lock().await;
        let session = inner.session.as_ref();
        SubmissionContext {
            contract: inner.chain.as_ref().map(|c| c.contract.clone()),
            wallet: session.and_then(|s| s.wallet.clone()),
            ticket: session
                .map(|s| s.ticket.clone())
                .unwrap_or_else(|| self.epoch.ticket()),
        }
    }

    /// Parent of every session-scoped task; cancelled by [`shutdown`](Self::shutdown).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn require_authenticated(&self) -> Result<()> {
        match self.inner.lock().await.state {
            SessionState::Authenticated => Ok(()),
            _ => Err(SponsorError::NotConnected),
        }
    }

    fn open_session(&self, inner: &mut Inner, signer: Arc<dyn SigningProvider>) -> SessionTicket {
        self.epoch.advance();
        let ticket = self.epoch.ticket();
        let id = Uuid::new_v4();
        inner.session = Some(Session {
            id,
            ticket: ticket.clone(),
            signer,
            wallet: None,
            poller: None,
            cancel: self.shutdown.child_token(),
        });
        inner.state = SessionState::Authenticated;
        info!(session_id = %id, version = ticket.version(), "Session authenticated");
        ticket
    }

    /// Initialize the smart wallet outside the lock, then install it with
    /// its poller unless the session ended meanwhile.
    async fn attach_wallet(
        &self,
        ticket: SessionTicket,
        signer: Arc<dyn SigningProvider>,
    ) -> Result<Address> {
        let (config, reader, contract) = {
            let inner = self.inner.lock().await;
            let chain = inner
                .chain
                .as_ref()
                .ok_or(SponsorError::NotInitialized("wallet session"))?;
            (
                chain.config.clone(),
                chain.reader.clone(),
                chain.contract.clone(),
            )
        };

        let mut wallet = SmartWalletSession::new(
            signer,
            &config,
            self.options.factory,
            reader,
            self.relay.clone(),
        );
        if let Err(e) = wallet.init().await {
            warn!(chain_id = config.chain_id, error = %e, "Smart wallet initialization failed");
            return Err(e);
        }
        let address = wallet.get_address()?;
        let wallet = Arc::new(wallet);

        let mut inner = self.inner.lock().await;
        if !ticket.is_current() {
            debug!(wallet = %address, "Discarding smart wallet of an ended session");
            return Err(SponsorError::SessionExpired);
        }
        let session = inner.session.as_mut().ok_or(SponsorError::SessionExpired)?;
        if let Some(existing) = &session.wallet {
            return existing.get_address();
        }

        let source = Arc::new(CounterStatusSource::new(contract, wallet.clone()));
        let poller = StatusPoller::spawn(
            source,
            self.options.poll_interval,
            ticket,
            session.cancel.child_token(),
        );
        session.wallet = Some(wallet);
        session.poller = Some(poller);
        info!(session_id = %session.id, wallet = %address, "Smart wallet ready");
        Ok(address)
    }
}
