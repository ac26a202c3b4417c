use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use url::Url;

/// Networks the counter application is deployed on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Mumbai,
    BaseGoerli,
    Gnosis,
}

impl Network {
    pub const ALL: [Network; 3] = [Network::Mumbai, Network::BaseGoerli, Network::Gnosis];

    /// Selected for absent or unrecognized identifiers.
    pub const DEFAULT: Network = Network::Mumbai;

    /// Map a chain selection identifier onto a network. Total: anything that is
    /// not an exact known identifier selects [`Network::DEFAULT`].
    pub fn from_identifier(identifier: Option<&str>) -> Self {
        match identifier {
            Some("100") => Network::Gnosis,
            Some("84531") => Network::BaseGoerli,
            _ => Self::DEFAULT,
        }
    }

    pub fn chain_id(self) -> u64 {
        match self {
            Network::Mumbai => 80001,
            Network::BaseGoerli => 84531,
            Network::Gnosis => 100,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Network::Mumbai => "Mumbai",
            Network::BaseGoerli => "Base Goerli",
            Network::Gnosis => "Gnosis",
        }
    }

    /// Counter contract deployed on this network.
    pub fn target(self) -> Address {
        match self {
            Network::Mumbai => address!("Bf17E7a45908F789707cb3d0EBb892647d798b99"),
            Network::BaseGoerli => address!("FeeBbED640df887bE1aD697EC3719EB7205323E9"),
            Network::Gnosis => address!("2dd703a17170C1b03abC26C4D5dc56c9382c5292"),
        }
    }

    /// Mainnets sponsor with a distinct relay key.
    pub fn is_mainnet(self) -> bool {
        matches!(self, Network::Gnosis)
    }
}

/// Relay keys and RPC endpoints read from the configuration surface.
#[derive(Debug, Clone)]
pub struct NetworkSecrets {
    pub sponsor_api_key: String,
    pub sponsor_api_key_mainnet: String,
    pub mumbai_rpc_url: Url,
    pub base_goerli_rpc_url: Url,
    pub gnosis_rpc_url: Url,
}

/// Fully resolved configuration for the active chain.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChainConfig {
    pub network: Network,
    pub name: String,
    pub chain_id: u64,
    pub target: Address,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub rpc_url: Url,
}

/// Pure mapping from a chain selection identifier to a [`ChainConfig`].
#[derive(Debug, Clone)]
pub struct ChainConfigResolver {
    secrets: NetworkSecrets,
}

impl ChainConfigResolver {
    pub fn new(secrets: NetworkSecrets) -> Self {
        Self { secrets }
    }

    pub fn resolve(&self, identifier: Option<&str>) -> ChainConfig {
        self.config_for(Network::from_identifier(identifier))
    }

    pub fn config_for(&self, network: Network) -> ChainConfig {
        let api_key = if network.is_mainnet() {
            self.secrets.sponsor_api_key_mainnet.clone()
        } else {
            self.secrets.sponsor_api_key.clone()
        };
        let rpc_url = match network {
            Network::Mumbai => self.secrets.mumbai_rpc_url.clone(),
            Network::BaseGoerli => self.secrets.base_goerli_rpc_url.clone(),
            Network::Gnosis => self.secrets.gnosis_rpc_url.clone(),
        };
        ChainConfig {
            network,
            name: network.name().into(),
            chain_id: network.chain_id(),
            target: network.target(),
            api_key,
            rpc_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NetworkSummary {
    pub name: &'static str,
    pub chain_id: u64,
}

pub fn supported_networks() -> Vec<NetworkSummary> {
    Network::ALL
        .iter()
        .map(|n| NetworkSummary {
            name: n.name(),
            chain_id: n.chain_id(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ChainConfigResolver {
        ChainConfigResolver::new(NetworkSecrets {
            sponsor_api_key: "testnet-key".into(),
            sponsor_api_key_mainnet: "mainnet-key".into(),
            mumbai_rpc_url: "https://mumbai.example".parse().unwrap(),
            base_goerli_rpc_url: "https://base-goerli.example".parse().unwrap(),
            gnosis_rpc_url: "https://gnosis.example".parse().unwrap(),
        })
    }

    #[test]
    fn test_resolve_gnosis() {
        let cfg = resolver().resolve(Some("100"));
        assert_eq!(cfg.chain_id, 100);
        assert_eq!(cfg.name, "Gnosis");
        assert_eq!(
            cfg.target,
            "0x2dd703a17170C1b03abC26C4D5dc56c9382c5292".parse::<Address>().unwrap()
        );
        assert_eq!(cfg.api_key, "mainnet-key");
        assert_eq!(cfg.rpc_url.as_str(), "https://gnosis.example/");
    }

    #[test]
    fn test_resolve_base_goerli() {
        let cfg = resolver().resolve(Some("84531"));
        assert_eq!(cfg.chain_id, 84531);
        assert_eq!(
            cfg.target,
            "0xFeeBbED640df887bE1aD697EC3719EB7205323E9".parse::<Address>().unwrap()
        );
        assert_eq!(cfg.api_key, "testnet-key");
    }

    #[test]
    fn test_resolve_default_for_absent_and_unknown() {
        let r = resolver();
        let absent = r.resolve(None);
        let unknown = r.resolve(Some("1"));
        let garbage = r.resolve(Some("not-a-chain"));
        let padded = r.resolve(Some(" 100"));

        assert_eq!(absent.network, Network::Mumbai);
        assert_eq!(absent.chain_id, 80001);
        assert_eq!(
            absent.target,
            "0xBf17E7a45908F789707cb3d0EBb892647d798b99".parse::<Address>().unwrap()
        );
        assert_eq!(absent, unknown);
        assert_eq!(absent, garbage);
        assert_eq!(absent, padded);
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let r = resolver();
        for id in ["100", "84531", "80001"] {
            assert_eq!(r.resolve(Some(id)), r.resolve(Some(id)));
        }
    }

    #[test]
    fn test_supported_networks() {
        let nets = supported_networks();
        assert_eq!(nets.len(), 3);
        assert!(nets.iter().any(|n| n.chain_id == 100 && n.name == "Gnosis"));
        assert!(nets.iter().any(|n| n.chain_id == 84531));
        assert!(nets.iter().any(|n| n.chain_id == 80001));
    }

    #[test]
    fn test_api_key_not_serialized() {
        let cfg = resolver().resolve(Some("100"));
        let json = serde_json::to_value(&cfg).unwrap();
        assert!(json.get("api_key").is_none());
        assert_eq!(json["chain_id"], 100);
    }
}
