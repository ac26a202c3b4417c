use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Opaque identifier returned by the relay for one submitted meta-transaction.
pub type TaskId = String;

/// Lifecycle of a relay task as tracked locally.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Successful,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A submitted meta-transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub status: TaskStatus,
    pub submitted_at: DateTime<Utc>,
}

impl Task {
    pub fn pending(id: TaskId) -> Self {
        Self {
            id,
            status: TaskStatus::Pending,
            submitted_at: Utc::now(),
        }
    }
}

/// Partial user record from the identity layer. Every field is optional
/// because providers disclose different subsets.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub email: Option<String>,
    pub name: Option<String>,
    pub profile_image: Option<String>,
    pub verifier: Option<String>,
    pub verifier_id: Option<String>,
    pub type_of_login: Option<String>,
}

/// Read-only projection of the signing account on the active chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletAccount {
    pub address: Address,
    pub balance: U256,
    pub chain_id: u64,
}

/// Monotonic session version shared by everything that completes
/// asynchronously on behalf of a session.
///
/// Each login and each logout advances the epoch. Work started under an older
/// version holds a [`SessionTicket`] that no longer matches and must discard
/// its result instead of publishing it.
#[derive(Debug, Clone, Default)]
pub struct SessionEpoch(Arc<AtomicU64>);

impl SessionEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Invalidate every outstanding ticket and return the new version.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn ticket(&self) -> SessionTicket {
        SessionTicket {
            epoch: self.clone(),
            version: self.current(),
        }
    }
}

/// Captured session version.
#[derive(Debug, Clone)]
pub struct SessionTicket {
    epoch: SessionEpoch,
    version: u64,
}

impl SessionTicket {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_current(&self) -> bool {
        self.epoch.current() == self.version
    }
}

/// Sensitive bytes that auto-zero on drop
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretBytes(pub Vec<u8>);

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBytes([REDACTED; {} bytes])", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_invalidated_by_advance() {
        let epoch = SessionEpoch::new();
        let ticket = epoch.ticket();
        assert!(ticket.is_current());

        epoch.advance();
        assert!(!ticket.is_current());
        assert!(epoch.ticket().is_current());
    }

    #[test]
    fn test_epoch_clones_share_version() {
        let epoch = SessionEpoch::new();
        let other = epoch.clone();
        let ticket = other.ticket();
        assert_eq!(epoch.advance(), 1);
        assert_eq!(other.current(), 1);
        assert!(!ticket.is_current());
    }

    #[test]
    fn test_task_status_terminal() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(TaskStatus::Successful.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn test_user_info_partial_deserialize() {
        let info: UserInfo =
            serde_json::from_str(r#"{"email":"a@b.c","typeOfLogin":"google"}"#).unwrap();
        assert_eq!(info.email.as_deref(), Some("a@b.c"));
        assert_eq!(info.type_of_login.as_deref(), Some("google"));
        assert!(info.name.is_none());
    }

    #[test]
    fn test_secret_bytes_redacted() {
        let secret = SecretBytes(vec![1, 2, 3]);
        assert_eq!(format!("{secret:?}"), "SecretBytes([REDACTED; 3 bytes])");
    }
}
