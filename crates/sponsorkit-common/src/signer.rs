use std::fmt;

use alloy_primitives::{Address, B256};

use crate::error::Result;

/// Handle able to sign on behalf of the authenticated user.
///
/// Obtained from the identity provider once connected. Every call may suspend
/// (remote key custody, hardware prompts), so the trait is async throughout.
#[async_trait::async_trait]
pub trait SigningProvider: Send + Sync + fmt::Debug {
    /// Address of the externally owned account behind this handle.
    async fn address(&self) -> Result<Address>;

    /// Sign a 32-byte digest, returning the 65-byte `r || s || v` encoding.
    async fn sign_hash(&self, hash: B256) -> Result<Vec<u8>>;
}
