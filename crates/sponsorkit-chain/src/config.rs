use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::{Address, B256};
use sponsorkit_common::SponsorError;
use thiserror::Error;
use url::Url;

use crate::chains::{ChainConfig, ChainConfigResolver, NetworkSecrets};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_RELAY_URL: &str = "https://api.gelato.digital";
pub const DEFAULT_GATEWAY_ADDR: &str = "0.0.0.0:8080";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required configuration value {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl From<ConfigError> for SponsorError {
    fn from(err: ConfigError) -> Self {
        SponsorError::Config(err.to_string())
    }
}

/// Startup configuration, read once from the environment.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub secrets: NetworkSecrets,
    pub identity_client_id: String,
    pub wallet_factory: Address,
    pub wallet_init_code_hash: B256,
    /// Chain selection identifier; `None` selects the default network.
    pub chain_id: Option<String>,
    pub poll_interval: Duration,
    pub relay_url: Url,
    /// Listen address of the HTTP gateway.
    pub gateway_addr: SocketAddr,
}

impl EnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secrets = NetworkSecrets {
            sponsor_api_key: required(&lookup, "SPONSOR_API_KEY")?,
            sponsor_api_key_mainnet: required(&lookup, "SPONSOR_API_KEY_MAINNET")?,
            mumbai_rpc_url: parse_url("MUMBAI_RPC_URL", &required(&lookup, "MUMBAI_RPC_URL")?)?,
            base_goerli_rpc_url: parse_url(
                "BASEGOERLI_RPC_URL",
                &required(&lookup, "BASEGOERLI_RPC_URL")?,
            )?,
            gnosis_rpc_url: parse_url("GNOSIS_RPC_URL", &required(&lookup, "GNOSIS_RPC_URL")?)?,
        };

        let wallet_factory = parse_value::<Address>(
            "WALLET_FACTORY_ADDRESS",
            &required(&lookup, "WALLET_FACTORY_ADDRESS")?,
        )?;
        let wallet_init_code_hash = parse_value::<B256>(
            "WALLET_INIT_CODE_HASH",
            &required(&lookup, "WALLET_INIT_CODE_HASH")?,
        )?;

        let poll_interval = match optional(&lookup, "POLL_INTERVAL_MS") {
            Some(raw) => {
                let ms = parse_value::<u64>("POLL_INTERVAL_MS", &raw)?;
                if ms == 0 {
                    return Err(ConfigError::Invalid {
                        name: "POLL_INTERVAL_MS",
                        reason: "must be greater than zero".into(),
                    });
                }
                Duration::from_millis(ms)
            }
            None => Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        };

        let relay_url = match optional(&lookup, "RELAY_URL") {
            Some(raw) => parse_url("RELAY_URL", &raw)?,
            None => parse_url("RELAY_URL", DEFAULT_RELAY_URL)?,
        };

        let gateway_addr = match optional(&lookup, "GATEWAY_ADDR") {
            Some(raw) => parse_value::<SocketAddr>("GATEWAY_ADDR", &raw)?,
            None => parse_value::<SocketAddr>("GATEWAY_ADDR", DEFAULT_GATEWAY_ADDR)?,
        };

        Ok(Self {
            secrets,
            identity_client_id: required(&lookup, "IDENTITY_CLIENT_ID")?,
            wallet_factory,
            wallet_init_code_hash,
            chain_id: optional(&lookup, "CHAIN_ID"),
            poll_interval,
            relay_url,
            gateway_addr,
        })
    }

    pub fn resolver(&self) -> ChainConfigResolver {
        ChainConfigResolver::new(self.secrets.clone())
    }

    /// Resolve the configured chain selection.
    pub fn chain_config(&self) -> ChainConfig {
        self.resolver().resolve(self.chain_id.as_deref())
    }
}

fn optional<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, name).ok_or(ConfigError::Missing(name))
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn parse_value<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::Network;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("SPONSOR_API_KEY", "testnet-key".to_string()),
            ("SPONSOR_API_KEY_MAINNET", "mainnet-key".to_string()),
            ("MUMBAI_RPC_URL", "https://mumbai.example".to_string()),
            ("BASEGOERLI_RPC_URL", "https://base-goerli.example".to_string()),
            ("GNOSIS_RPC_URL", "https://gnosis.example".to_string()),
            ("IDENTITY_CLIENT_ID", "client-123".to_string()),
            (
                "WALLET_FACTORY_ADDRESS",
                "0x00000000000000000000000000000000000000fa".to_string(),
            ),
            ("WALLET_INIT_CODE_HASH", format!("0x{}", "ab".repeat(32))),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<EnvConfig, ConfigError> {
        EnvConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn test_load_with_defaults() {
        let cfg = load(&base_env()).unwrap();
        assert_eq!(cfg.identity_client_id, "client-123");
        assert_eq!(cfg.poll_interval, Duration::from_millis(5000));
        assert_eq!(cfg.relay_url.as_str(), "https://api.gelato.digital/");
        assert_eq!(cfg.gateway_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert!(cfg.chain_id.is_none());
        assert_eq!(cfg.chain_config().network, Network::Mumbai);
    }

    #[test]
    fn test_missing_required_value() {
        let mut env = base_env();
        env.remove("SPONSOR_API_KEY_MAINNET");
        assert!(matches!(
            load(&env),
            Err(ConfigError::Missing("SPONSOR_API_KEY_MAINNET"))
        ));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut env = base_env();
        env.insert("IDENTITY_CLIENT_ID", "   ".into());
        assert!(matches!(
            load(&env),
            Err(ConfigError::Missing("IDENTITY_CLIENT_ID"))
        ));
    }

    #[test]
    fn test_invalid_rpc_url() {
        let mut env = base_env();
        env.insert("GNOSIS_RPC_URL", "not a url".into());
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { name: "GNOSIS_RPC_URL", .. })
        ));
    }

    #[test]
    fn test_poll_interval_override_and_zero() {
        let mut env = base_env();
        env.insert("POLL_INTERVAL_MS", "250".into());
        assert_eq!(load(&env).unwrap().poll_interval, Duration::from_millis(250));

        env.insert("POLL_INTERVAL_MS", "0".into());
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { name: "POLL_INTERVAL_MS", .. })
        ));
    }

    #[test]
    fn test_gateway_addr_override_and_invalid() {
        let mut env = base_env();
        env.insert("GATEWAY_ADDR", "127.0.0.1:9090".into());
        assert_eq!(
            load(&env).unwrap().gateway_addr,
            "127.0.0.1:9090".parse::<SocketAddr>().unwrap()
        );

        env.insert("GATEWAY_ADDR", "localhost".into());
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { name: "GATEWAY_ADDR", .. })
        ));
    }

    #[test]
    fn test_chain_selection() {
        let mut env = base_env();
        env.insert("CHAIN_ID", "100".into());
        let cfg = load(&env).unwrap();
        let chain = cfg.chain_config();
        assert_eq!(chain.chain_id, 100);
        assert_eq!(chain.api_key, "mainnet-key");
    }

    #[test]
    fn test_config_error_converts() {
        let err: SponsorError = ConfigError::Missing("SPONSOR_API_KEY").into();
        assert!(matches!(err, SponsorError::Config(_)));
    }
}
