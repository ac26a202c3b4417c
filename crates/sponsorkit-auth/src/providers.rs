use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sponsorkit_chain::ChainConfig;
use sponsorkit_common::{Result, SigningProvider, SponsorError, UserInfo};
use tokio_util::sync::CancellationToken;

/// Identity-provider adapter consumed by the wallet session.
///
/// The protocol behind it (OAuth redirects, key reconstruction, wallet
/// connectors) is out of scope; this trait is the seam.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Configure and start the adapter.
    ///
    /// Returns a signing provider when a cached credential restores the
    /// previous connection without user interaction.
    async fn init(&self, settings: &IdentitySettings) -> Result<Option<Arc<dyn SigningProvider>>>;

    /// Request a connection. May suspend on user interaction or a redirect
    /// round trip; must return promptly once `cancel` fires.
    async fn connect(&self, cancel: CancellationToken) -> Result<Arc<dyn SigningProvider>>;

    async fn disconnect(&self) -> Result<()>;

    /// Forget any cached credential so the next `init` does not reconnect.
    async fn clear_cache(&self);

    async fn user_info(&self) -> Result<UserInfo>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdentityNetwork {
    Mainnet,
    Testnet,
    Cyan,
    Aqua,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChainNamespace {
    Eip155,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    Dark,
    Auto,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LoginMethod {
    Google,
    Facebook,
    Twitter,
    Discord,
    Github,
    Apple,
    Reddit,
    Twitch,
    Linkedin,
    EmailPasswordless,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MfaLevel {
    Default,
    Optional,
    Mandatory,
    None,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UxMode {
    Popup,
    Redirect,
}

/// Wallet connectors offered next to social login.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WalletAdapter {
    Openlogin,
    WalletConnectV1,
    Metamask,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UiConfig {
    pub app_name: String,
    pub theme: Theme,
    pub login_methods_order: Vec<LoginMethod>,
    pub default_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WhiteLabel {
    pub name: String,
    pub default_language: String,
    pub dark: bool,
    /// `#rrggbb`
    pub primary_color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpenloginSettings {
    pub mfa_level: MfaLevel,
    pub ux_mode: UxMode,
    pub white_label: WhiteLabel,
}

/// Complete adapter configuration handed to [`IdentityProvider::init`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentitySettings {
    pub client_id: String,
    pub chain_namespace: ChainNamespace,
    pub chain_id: u64,
    pub network: IdentityNetwork,
    pub ui: UiConfig,
    pub openlogin: OpenloginSettings,
    pub adapters: Vec<WalletAdapter>,
}

impl IdentitySettings {
    pub fn new(client_id: impl Into<String>, chain_id: u64) -> Self {
        Self {
            client_id: client_id.into(),
            chain_namespace: ChainNamespace::Eip155,
            chain_id,
            network: IdentityNetwork::Testnet,
            ui: UiConfig {
                app_name: "Sponsorkit".into(),
                theme: Theme::Dark,
                login_methods_order: vec![LoginMethod::Google],
                default_language: "en".into(),
            },
            openlogin: OpenloginSettings {
                mfa_level: MfaLevel::Optional,
                ux_mode: UxMode::Redirect,
                white_label: WhiteLabel {
                    name: "Sponsorkit".into(),
                    default_language: "en".into(),
                    dark: true,
                    primary_color: "#b45f63".into(),
                },
            },
            adapters: vec![
                WalletAdapter::Openlogin,
                WalletAdapter::WalletConnectV1,
                WalletAdapter::Metamask,
            ],
        }
    }

    pub fn for_chain(client_id: impl Into<String>, chain: &ChainConfig) -> Self {
        Self::new(client_id, chain.chain_id)
    }

    /// Chain id as the `0x`-prefixed hex quantity adapters expect.
    pub fn chain_id_hex(&self) -> String {
        format!("0x{:x}", self.chain_id)
    }

    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(SponsorError::ProviderInit("client id is empty".into()));
        }
        if self.chain_id == 0 {
            return Err(SponsorError::ProviderInit("chain id must be non-zero".into()));
        }
        if self.ui.login_methods_order.is_empty() {
            return Err(SponsorError::ProviderInit("no login methods configured".into()));
        }
        if self.adapters.is_empty() {
            return Err(SponsorError::ProviderInit("no wallet adapters configured".into()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.adapters.iter().find(|a| !seen.insert(**a)) {
            return Err(SponsorError::ProviderInit(format!(
                "adapter {dup:?} configured twice"
            )));
        }
        if !is_hex_color(&self.openlogin.white_label.primary_color) {
            return Err(SponsorError::ProviderInit(format!(
                "invalid primary color {}",
                self.openlogin.white_label.primary_color
            )));
        }
        Ok(())
    }
}

fn is_hex_color(s: &str) -> bool {
    s.len() == 7
        && s.starts_with('#')
        && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}
