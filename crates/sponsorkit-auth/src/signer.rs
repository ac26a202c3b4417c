use std::fmt;

use alloy_primitives::{Address, B256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use sponsorkit_common::{Result, SecretBytes, SigningProvider, SponsorError};

/// secp256k1 signing provider holding its key in process memory.
pub struct LocalSigner {
    inner: PrivateKeySigner,
}

impl LocalSigner {
    pub fn from_secret(key: &SecretBytes) -> Result<Self> {
        let inner = PrivateKeySigner::from_slice(&key.0)
            .map_err(|e| SponsorError::Signing(format!("invalid private key: {e}")))?;
        Ok(Self { inner })
    }

    pub fn random() -> Self {
        Self {
            inner: PrivateKeySigner::random(),
        }
    }

    pub fn address(&self) -> Address {
        self.inner.address()
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.inner.address())
            .finish()
    }
}

#[async_trait::async_trait]
impl SigningProvider for LocalSigner {
    async fn address(&self) -> Result<Address> {
        Ok(self.inner.address())
    }

    async fn sign_hash(&self, hash: B256) -> Result<Vec<u8>> {
        let signature = self
            .inner
            .sign_hash_sync(&hash)
            .map_err(|e| SponsorError::Signing(e.to_string()))?;
        Ok(signature.as_bytes().to_vec())
    }
}
