use std::sync::Arc;
use std::time::Duration;

use sponsorkit_aa::{AccountFactory, HttpRelayClient, SolCounterAbi};
use sponsorkit_auth::{LocalKeyProvider, LocalSigner};
use sponsorkit_chain::{ChainReader, EnvConfig, EvmRpcClient};
use sponsorkit_common::{Result, UserInfo};
use sponsorkit_session::{CounterApp, SessionOptions, WalletSession};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub app: Arc<CounterApp>,
    pub poll_interval: Duration,
}

impl AppState {
    pub fn new(app: Arc<CounterApp>, poll_interval: Duration) -> Self {
        Self { app, poll_interval }
    }

    /// Wire the live RPC and relay clients and initialize the session for
    /// the configured chain.
    pub async fn from_config(config: &EnvConfig, signer: LocalSigner) -> Result<Self> {
        let chain = config.chain_config();
        let reader: Arc<dyn ChainReader> = Arc::new(EvmRpcClient::from_config(&chain));
        let relay = Arc::new(HttpRelayClient::new(config.relay_url.clone()));
        let provider = Arc::new(LocalKeyProvider::new(
            signer,
            UserInfo {
                name: Some("Local developer".into()),
                type_of_login: Some("local_key".into()),
                ..Default::default()
            },
        ));

        let options = SessionOptions::new(
            config.identity_client_id.clone(),
            AccountFactory::new(config.wallet_factory, config.wallet_init_code_hash),
            Arc::new(SolCounterAbi),
        )
        .with_poll_interval(config.poll_interval);

        let session = Arc::new(WalletSession::new(provider, relay, options));
        let app = Arc::new(CounterApp::new(session));
        app.init(chain, reader).await?;
        Ok(Self::new(app, config.poll_interval))
    }

    pub fn session(&self) -> &Arc<WalletSession> {
        self.app.session()
    }
}

/// Refresh tracked tasks every `interval` until `shutdown` fires.
pub fn spawn_task_refresh(
    app: Arc<CounterApp>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let settled = app.refresh_tasks().await;
                    if settled > 0 {
                        info!(settled, "Relay tasks settled");
                    }
                }
            }
        }
        debug!("Task refresh loop stopped");
    })
}


#[cfg(test)]
mod tests {
    use super::testing::test_app;
    use super::*;
    use sponsorkit_aa::RelayTaskState;
    use sponsorkit_common::TaskStatus;

    #[tokio::test(start_paused = true)]
    async fn test_refresh_loop_settles_tasks_until_shutdown() {
        let t = test_app().await;
        t.state.session().login().await.unwrap();
        let task_id = t.state.app.increment().await.unwrap();
        t.relay.set_state(&task_id, RelayTaskState::ExecSuccess);

        let shutdown = CancellationToken::new();
        let handle = spawn_task_refresh(
            t.state.app.clone(),
            Duration::from_millis(5000),
            shutdown.clone(),
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(t.state.app.tasks()[0].status, TaskStatus::Successful);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
