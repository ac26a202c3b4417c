use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sponsorkit_common::{Result, SessionTicket};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::contract::CounterContract;
use crate::wallet::SmartWalletSession;

/// On-chain view refreshed by the poller.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub counter: U256,
    pub is_deployed: bool,
    pub refreshed_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait StatusSource: Send + Sync {
    async fn read(&self) -> Result<StatusSnapshot>;
}

/// Reads the counter value and the wallet deployment flag.
pub struct CounterStatusSource {
    contract: CounterContract,
    wallet: Arc<SmartWalletSession>,
}

impl CounterStatusSource {
    pub fn new(contract: CounterContract, wallet: Arc<SmartWalletSession>) -> Self {
        Self { contract, wallet }
    }
}

#[async_trait::async_trait]
impl StatusSource for CounterStatusSource {
    async fn read(&self) -> Result<StatusSnapshot> {
        let counter = self.contract.counter().await?;
        let is_deployed = self.wallet.is_deployed().await?;
        Ok(StatusSnapshot {
            counter,
            is_deployed,
            refreshed_at: Utc::now(),
        })
    }
}

/// Periodic status refresh bound to one authenticated session.
///
/// Reads once immediately, then every `interval`. Nothing is published after
/// [`cancel`](Self::cancel) returns or once the session ticket goes stale.
/// Dropping the poller cancels it.
pub struct StatusPoller {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    updates: watch::Receiver<Option<StatusSnapshot>>,
    publications: Arc<AtomicU64>,
}

impl StatusPoller {
    pub fn spawn(
        source: Arc<dyn StatusSource>,
        interval: Duration,
        ticket: SessionTicket,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, updates) = watch::channel(None);
        let publications = Arc::new(AtomicU64::new(0));
        let handle = tokio::spawn(run(
            source,
            interval,
            ticket,
            cancel.clone(),
            tx,
            publications.clone(),
        ));
        Self {
            cancel,
            handle,
            updates,
            publications,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<StatusSnapshot>> {
        self.updates.clone()
    }

    pub fn latest(&self) -> Option<StatusSnapshot> {
        self.updates.borrow().clone()
    }

    pub fn publications(&self) -> u64 {
        self.publications.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
        self.handle.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run(
    source: Arc<dyn StatusSource>,
    interval: Duration,
    ticket: SessionTicket,
    cancel: CancellationToken,
    tx: watch::Sender<Option<StatusSnapshot>>,
    publications: Arc<AtomicU64>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = source.read() => result,
        };

        match result {
            Ok(snapshot) => {
                // Checked under the channel lock so a cancel that has
                // returned can never be followed by a publication.
                let published = tx.send_if_modified(|slot| {
                    if cancel.is_cancelled() || !ticket.is_current() {
                        return false;
                    }
                    *slot = Some(snapshot);
                    true
                });
                if !published {
                    debug!(version = ticket.version(), "Discarding status read from an ended session");
                    break;
                }
                publications.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                if !ticket.is_current() {
                    break;
                }
                warn!(error = %e, "Status refresh failed");
            }
        }
    }
    debug!(version = ticket.version(), "Status poller stopped");
}
