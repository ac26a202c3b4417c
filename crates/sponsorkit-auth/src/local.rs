use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sponsorkit_common::{Result, SigningProvider, SponsorError, UserInfo};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::providers::{IdentityProvider, IdentitySettings};
use crate::signer::LocalSigner;

#[derive(Debug, Default)]
struct LocalState {
    settings: Option<IdentitySettings>,
    connected: bool,
    cached: bool,
}

/// Identity provider backed by a locally held key (for development/testing).
///
/// Connecting always yields the same [`LocalSigner`]; `connect_delay`
/// emulates the user-interaction round trip of a real adapter.
pub struct LocalKeyProvider {
    signer: Arc<LocalSigner>,
    user: UserInfo,
    state: RwLock<LocalState>,
    connect_delay: Duration,
    disconnect_delay: Duration,
    reject_connect: AtomicBool,
    fail_disconnect: AtomicBool,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

impl LocalKeyProvider {
    pub fn new(signer: LocalSigner, user: UserInfo) -> Self {
        Self {
            signer: Arc::new(signer),
            user,
            state: RwLock::new(LocalState::default()),
            connect_delay: Duration::ZERO,
            disconnect_delay: Duration::ZERO,
            reject_connect: AtomicBool::new(false),
            fail_disconnect: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        }
    }

    /// Start with a cached credential, as if a previous login survived a restart.
    pub fn with_cached_session(mut self) -> Self {
        self.state.get_mut().cached = true;
        self
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    /// Remote round trip of `disconnect`, e.g. a logout redirect.
    pub fn with_disconnect_delay(mut self, delay: Duration) -> Self {
        self.disconnect_delay = delay;
        self
    }

    /// Make `connect` fail as if the user dismissed the login prompt.
    pub fn set_reject_connect(&self, reject: bool) {
        self.reject_connect.store(reject, Ordering::SeqCst);
    }

    /// Make `disconnect` fail remotely. Local state is still cleared.
    pub fn set_fail_disconnect(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.connected
    }

    pub async fn has_cached_credential(&self) -> bool {
        self.state.read().await.cached
    }

    fn handle(&self) -> Arc<dyn SigningProvider> {
        self.signer.clone()
    }
}

#[async_trait::async_trait]
impl IdentityProvider for LocalKeyProvider {
    async fn init(&self, settings: &IdentitySettings) -> Result<Option<Arc<dyn SigningProvider>>> {
        settings.validate()?;
        let mut state = self.state.write().await;
        state.settings = Some(settings.clone());
        if state.cached {
            state.connected = true;
            info!(chain_id = settings.chain_id, "Restored cached local identity");
            return Ok(Some(self.handle()));
        }
        Ok(None)
    }

    async fn connect(&self, cancel: CancellationToken) -> Result<Arc<dyn SigningProvider>> {
        if self.state.read().await.settings.is_none() {
            return Err(SponsorError::Identity("adapter not initialized".into()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(SponsorError::Identity("connection cancelled".into()));
            }
            _ = tokio::time::sleep(self.connect_delay) => {}
        }

        if self.reject_connect.load(Ordering::SeqCst) {
            return Err(SponsorError::Identity("user closed the login prompt".into()));
        }

        let mut state = self.state.write().await;
        state.connected = true;
        state.cached = true;
        Ok(self.handle())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        if !self.disconnect_delay.is_zero() {
            tokio::time::sleep(self.disconnect_delay).await;
        }
        self.state.write().await.connected = false;
        if self.fail_disconnect.load(Ordering::SeqCst) {
            warn!("Local identity disconnect configured to fail");
            return Err(SponsorError::Identity("remote disconnect failed".into()));
        }
        Ok(())
    }

    async fn clear_cache(&self) {
        self.state.write().await.cached = false;
    }

    async fn user_info(&self) -> Result<UserInfo> {
        if !self.state.read().await.connected {
            return Err(SponsorError::NotConnected);
        }
        Ok(self.user.clone())
    }
}
