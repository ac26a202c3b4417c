use std::sync::Arc;

use sponsorkit_aa::StatusSnapshot;
use sponsorkit_chain::{ChainConfig, ChainReader};
use sponsorkit_common::{Result, SponsorError, Task, TaskId};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::session::WalletSession;

/// Latest user-visible error. Readable and clearable; a new report replaces
/// the previous one.
#[derive(Clone)]
pub struct ErrorSink {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl ErrorSink {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn report(&self, err: &SponsorError) {
        warn!(error = %err, "Reporting error to user");
        self.tx.send_replace(Some(err.to_string()));
    }

    pub fn latest(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}

impl Default for ErrorSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Application actions on the counter contract, run through the wallet
/// session. Failures surface through the [`ErrorSink`].
pub struct CounterApp {
    session: Arc<WalletSession>,
    errors: ErrorSink,
}

impl CounterApp {
    pub fn new(session: Arc<WalletSession>) -> Self {
        Self {
            session,
            errors: ErrorSink::new(),
        }
    }

    pub fn session(&self) -> &Arc<WalletSession> {
        &self.session
    }

    pub fn errors(&self) -> &ErrorSink {
        &self.errors
    }

    fn reported<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.errors.report(e);
        }
        result
    }

    /// [`WalletSession::init`], reporting a rejected configuration.
    pub async fn init(&self, chain: ChainConfig, reader: Arc<dyn ChainReader>) -> Result<()> {
        self.reported(self.session.init(chain, reader).await)
    }

    /// [`WalletSession::login`], reporting connection and wallet failures.
    pub async fn login(&self) -> Result<()> {
        self.reported(self.session.login().await)
    }

    /// Submit `increment()` as a sponsored call and track the resulting task.
    /// Every failure is also reported to the error sink.
    pub async fn increment(&self) -> Result<TaskId> {
        self.reported(self.submit_increment().await)
    }

    async fn submit_increment(&self) -> Result<TaskId> {
        let ctx = self.session.submission_context().await;
        let contract = ctx.contract.ok_or(SponsorError::ContractNotInitialized)?;
        let wallet = ctx.wallet.ok_or(SponsorError::WalletNotInitialized)?;

        let data = contract.populate_increment()?;
        let resp = wallet.send_transaction(contract.address(), data).await?;
        self.session
            .tracker()
            .record(&ctx.ticket, resp.task_id.clone())?;
        info!(task_id = %resp.task_id, "Increment submitted");
        Ok(resp.task_id)
    }

    pub async fn status(&self) -> Option<StatusSnapshot> {
        self.session.status().await
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.session.tracker().tasks()
    }

    pub async fn refresh_tasks(&self) -> usize {
        self.session.tracker().refresh().await
    }
}
