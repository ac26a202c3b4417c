use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};
use sponsorkit_common::{SponsorError, TaskId, TaskStatus};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("relay rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("deserialization error: {0}")]
    Deserialize(String),
    #[error("unknown task: {0}")]
    UnknownTask(String),
}

impl From<RelayError> for SponsorError {
    fn from(err: RelayError) -> Self {
        SponsorError::Relay(err.to_string())
    }
}

/// Sponsored call: the relay pays gas for `data` executed against `target`.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SponsoredCallRequest {
    pub chain_id: u64,
    pub target: Address,
    pub data: Bytes,
    pub sponsor_api_key: String,
}

impl fmt::Debug for SponsoredCallRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SponsoredCallRequest")
            .field("chain_id", &self.chain_id)
            .field("target", &self.target)
            .field("data", &self.data)
            .field("sponsor_api_key", &"[REDACTED]")
            .finish()
    }
}

/// Task lifecycle as reported by the relay.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RelayTaskState {
    CheckPending,
    ExecPending,
    WaitingForConfirmation,
    ExecSuccess,
    ExecReverted,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl RelayTaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ExecSuccess | Self::ExecReverted | Self::Cancelled
        )
    }

    pub fn task_status(&self) -> TaskStatus {
        match self {
            Self::ExecSuccess => TaskStatus::Successful,
            Self::ExecReverted | Self::Cancelled => TaskStatus::Failed,
            _ => TaskStatus::Pending,
        }
    }
}

/// Meta-transaction relay.
#[async_trait::async_trait]
pub trait RelayClient: Send + Sync {
    /// Submit a sponsored call. A returned task id means the relay accepted it.
    async fn sponsored_call(&self, request: &SponsoredCallRequest) -> Result<TaskId, RelayError>;

    async fn task_state(&self, task_id: &str) -> Result<RelayTaskState, RelayError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SponsoredCallResponse {
    task_id: String,
}

#[derive(Deserialize)]
struct TaskStatusResponse {
    task: TaskStatusBody,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskStatusBody {
    task_state: RelayTaskState,
    #[allow(dead_code)]
    last_check_message: Option<String>,
}

#[derive(Deserialize)]
struct RelayErrorBody {
    message: Option<String>,
}

/// Relay client speaking the Gelato relay HTTP API.
pub struct HttpRelayClient {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpRelayClient {
    /// `base_url` must end in `/` when it carries a path.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, RelayError> {
        self.base_url
            .join(path)
            .map_err(|e| RelayError::Http(format!("invalid relay endpoint {path}: {e}")))
    }

    async fn rejection(resp: reqwest::Response) -> RelayError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<RelayErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or(body);
        RelayError::Rejected { status, message }
    }
}

#[async_trait::async_trait]
impl RelayClient for HttpRelayClient {
    async fn sponsored_call(&self, request: &SponsoredCallRequest) -> Result<TaskId, RelayError> {
        let url = self.endpoint("relays/v2/sponsored-call")?;
        debug!(chain_id = request.chain_id, target = %request.target, "Relay sponsored call");
        let resp = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| RelayError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::rejection(resp).await);
        }

        let body: SponsoredCallResponse = resp
            .json()
            .await
            .map_err(|e| RelayError::Deserialize(e.to_string()))?;
        Ok(body.task_id)
    }

    async fn task_state(&self, task_id: &str) -> Result<RelayTaskState, RelayError> {
        let url = self.endpoint(&format!("tasks/status/{task_id}"))?;
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| RelayError::Http(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RelayError::UnknownTask(task_id.to_string()));
        }
        if !resp.status().is_success() {
            return Err(Self::rejection(resp).await);
        }

        let body: TaskStatusResponse = resp
            .json()
            .await
            .map_err(|e| RelayError::Deserialize(e.to_string()))?;
        Ok(body.task.task_state)
    }
}

/// In-memory relay (for development/testing).
pub struct InMemoryRelay {
    next_id: AtomicU64,
    tasks: Mutex<HashMap<TaskId, RelayTaskState>>,
    submissions: Mutex<Vec<SponsoredCallRequest>>,
    rejection: Mutex<Option<String>>,
    status_unavailable: AtomicBool,
    status_queries: AtomicUsize,
}

impl InMemoryRelay {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            tasks: Mutex::new(HashMap::new()),
            submissions: Mutex::new(Vec::new()),
            rejection: Mutex::new(None),
            status_unavailable: AtomicBool::new(false),
            status_queries: AtomicUsize::new(0),
        }
    }

    /// Reject every subsequent submission with `message`; `None` accepts again.
    pub fn set_rejection(&self, message: Option<String>) {
        *self.rejection.lock().unwrap_or_else(|e| e.into_inner()) = message;
    }

    pub fn set_status_unavailable(&self, unavailable: bool) {
        self.status_unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_state(&self, task_id: &str, state: RelayTaskState) {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).insert(task_id.to_string(), state);
    }

    pub fn submissions(&self) -> Vec<SponsoredCallRequest> {
        self.submissions.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn status_query_count(&self) -> usize {
        self.status_queries.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RelayClient for InMemoryRelay {
    async fn sponsored_call(&self, request: &SponsoredCallRequest) -> Result<TaskId, RelayError> {
        if let Some(message) = self.rejection.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(RelayError::Rejected {
                status: 400,
                message,
            });
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let task_id = format!("0x{n:064x}");
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(task_id.clone(), RelayTaskState::CheckPending);
        self.submissions.lock().unwrap_or_else(|e| e.into_inner()).push(request.clone());
        Ok(task_id)
    }

    async fn task_state(&self, task_id: &str) -> Result<RelayTaskState, RelayError> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        if self.status_unavailable.load(Ordering::SeqCst) {
            return Err(RelayError::Http("relay unavailable".into()));
        }
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(task_id)
            .copied()
            .ok_or_else(|| RelayError::UnknownTask(task_id.to_string()))
    }
}
