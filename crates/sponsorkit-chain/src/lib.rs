pub mod chains;
pub mod config;
pub mod rpc;

pub use chains::{supported_networks, ChainConfig, ChainConfigResolver, Network, NetworkSecrets, NetworkSummary};
pub use config::{
    ConfigError, EnvConfig, DEFAULT_GATEWAY_ADDR, DEFAULT_POLL_INTERVAL_MS, DEFAULT_RELAY_URL,
};
pub use rpc::{ChainReader, EvmRpcClient, InMemoryChain, RpcError, RpcPool};
