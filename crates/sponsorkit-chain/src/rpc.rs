use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use sponsorkit_common::SponsorError;
use thiserror::Error;
use tracing::{debug, warn};

use crate::chains::ChainConfig;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("all RPC endpoints failed for chain {chain_id}")]
    AllEndpointsFailed { chain_id: u64 },
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc { code: i64, message: String },
    #[error("deserialization error: {0}")]
    Deserialize(String),
    #[error("no endpoints configured for chain {0}")]
    NoEndpoints(u64),
}

impl From<RpcError> for SponsorError {
    fn from(err: RpcError) -> Self {
        SponsorError::Rpc(err.to_string())
    }
}

/// A raw JSON-RPC request.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: serde_json::Value,
    pub id: u64,
}

/// A raw JSON-RPC response.
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<JsonRpcError>,
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// Health status of an RPC endpoint.
#[derive(Debug, Clone)]
struct EndpointHealth {
    url: String,
    failures: u32,
    last_failure: Option<Instant>,
}

impl EndpointHealth {
    fn new(url: String) -> Self {
        Self {
            url,
            failures: 0,
            last_failure: None,
        }
    }

    fn is_healthy(&self) -> bool {
        // After 3+ consecutive failures, consider unhealthy for 30s
        if self.failures >= 3 {
            if let Some(t) = self.last_failure {
                return t.elapsed() > Duration::from_secs(30);
            }
        }
        true
    }

    fn record_success(&mut self) {
        self.failures = 0;
    }

    fn record_failure(&mut self) {
        self.failures += 1;
        self.last_failure = Some(Instant::now());
    }
}

struct CacheEntry {
    data: serde_json::Value,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_valid(&self) -> bool {
        self.inserted_at.elapsed() < self.ttl
    }
}

/// Read access to the chain the session is bound to.
///
/// Every method is a suspension point; implementations never cache
/// deployment state indefinitely.
#[async_trait::async_trait]
pub trait ChainReader: Send + Sync {
    async fn chain_id(&self) -> Result<u64, RpcError>;
    async fn get_balance(&self, address: Address) -> Result<U256, RpcError>;
    async fn get_code(&self, address: Address) -> Result<Bytes, RpcError>;
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError>;
}

/// Connection pool with failover for a single chain's RPC endpoints.
pub struct RpcPool {
    chain_id: u64,
    endpoints: Arc<RwLock<Vec<EndpointHealth>>>,
    http: reqwest::Client,
    cache: Arc<RwLock<HashMap<String, CacheEntry>>>,
    request_id: AtomicU64,
}

impl RpcPool {
    pub fn new(chain_id: u64, urls: Vec<String>) -> Self {
        let endpoints = urls.into_iter().map(EndpointHealth::new).collect();
        Self {
            chain_id,
            endpoints: Arc::new(RwLock::new(endpoints)),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            cache: Arc::new(RwLock::new(HashMap::new())),
            request_id: AtomicU64::new(1),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    fn get_cached(&self, key: &str) -> Option<serde_json::Value> {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        cache
            .get(key)
            .filter(|e| e.is_valid())
            .map(|e| e.data.clone())
    }

    fn set_cached(&self, key: String, data: serde_json::Value, ttl: Duration) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.retain(|_, e| e.is_valid());
        cache.insert(
            key,
            CacheEntry {
                data,
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Send a JSON-RPC request with automatic failover across endpoints.
    pub async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RpcError> {
        let urls: Vec<(usize, String)> = {
            let eps = self.endpoints.read().unwrap_or_else(|e| e.into_inner());
            if eps.is_empty() {
                return Err(RpcError::NoEndpoints(self.chain_id));
            }
            // Healthy endpoints first, then unhealthy as fallback
            let mut ordered: Vec<(usize, &EndpointHealth)> = eps.iter().enumerate().collect();
            ordered.sort_by_key(|(_, e)| !e.is_healthy());
            ordered.iter().map(|(i, e)| (*i, e.url.clone())).collect()
        };

        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            method: method.to_string(),
            params,
            id: self.next_id(),
        };

        let mut last_err = None;
        for (idx, url) in &urls {
            debug!(chain_id = self.chain_id, url, method, "RPC request");
            let resp = match self.http.post(url).json(&body).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(chain_id = self.chain_id, url, %e, "RPC connection error");
                    self.endpoints.write().unwrap_or_else(|e| e.into_inner())[*idx].record_failure();
                    last_err = Some(RpcError::Http(e.to_string()));
                    continue;
                }
            };

            let status = resp.status();
            if !status.is_success() {
                let msg = format!("HTTP {status}");
                warn!(chain_id = self.chain_id, url, %msg, "RPC HTTP error");
                self.endpoints.write().unwrap_or_else(|e| e.into_inner())[*idx].record_failure();
                last_err = Some(RpcError::Http(msg));
                continue;
            }

            match resp.json::<JsonRpcResponse>().await {
                Ok(rpc_resp) => {
                    // A JSON-RPC level error is a valid answer from a healthy node
                    self.endpoints.write().unwrap_or_else(|e| e.into_inner())[*idx].record_success();
                    if let Some(err) = rpc_resp.error {
                        return Err(RpcError::JsonRpc {
                            code: err.code,
                            message: err.message,
                        });
                    }
                    return Ok(rpc_resp.result.unwrap_or(serde_json::Value::Null));
                }
                Err(e) => {
                    warn!(chain_id = self.chain_id, url, %e, "RPC parse error");
                    self.endpoints.write().unwrap_or_else(|e| e.into_inner())[*idx].record_failure();
                    last_err = Some(RpcError::Deserialize(e.to_string()));
                }
            }
        }

        Err(last_err.unwrap_or(RpcError::AllEndpointsFailed {
            chain_id: self.chain_id,
        }))
    }
}

/// EVM JSON-RPC client built on top of RpcPool.
pub struct EvmRpcClient {
    pool: Arc<RpcPool>,
}

impl EvmRpcClient {
    pub fn new(pool: Arc<RpcPool>) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &ChainConfig) -> Self {
        Self::new(Arc::new(RpcPool::new(
            config.chain_id,
            vec![config.rpc_url.to_string()],
        )))
    }
}

fn expect_str(value: &serde_json::Value, what: &str) -> Result<String, RpcError> {
    value
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| RpcError::Deserialize(format!("expected string {what}")))
}

fn parse_quantity(hex: &str) -> Result<U256, RpcError> {
    U256::from_str_radix(hex.trim_start_matches("0x"), 16)
        .map_err(|e| RpcError::Deserialize(format!("invalid quantity {hex}: {e}")))
}

fn parse_bytes(hex: &str) -> Result<Bytes, RpcError> {
    Bytes::from_str(hex).map_err(|e| RpcError::Deserialize(format!("invalid data {hex}: {e}")))
}

#[async_trait::async_trait]
impl ChainReader for EvmRpcClient {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        let cache_key = format!("chain_id:{}", self.pool.chain_id);
        let result = match self.pool.get_cached(&cache_key) {
            Some(cached) => cached,
            None => {
                let result = self.pool.request("eth_chainId", serde_json::json!([])).await?;
                // A node's chain id never changes
                self.pool
                    .set_cached(cache_key, result.clone(), Duration::from_secs(3600));
                result
            }
        };
        let id = parse_quantity(&expect_str(&result, "chain id")?)?;
        u64::try_from(id).map_err(|_| RpcError::Deserialize(format!("chain id {id} out of range")))
    }

    async fn get_balance(&self, address: Address) -> Result<U256, RpcError> {
        let cache_key = format!("balance:{}:{address}", self.pool.chain_id);
        if let Some(cached) = self.pool.get_cached(&cache_key) {
            return parse_quantity(&expect_str(&cached, "balance")?);
        }
        let result = self
            .pool
            .request("eth_getBalance", serde_json::json!([address, "latest"]))
            .await?;
        // Balance changes with every block
        self.pool
            .set_cached(cache_key, result.clone(), Duration::from_secs(2));
        parse_quantity(&expect_str(&result, "balance")?)
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, RpcError> {
        let result = self
            .pool
            .request("eth_getCode", serde_json::json!([address, "latest"]))
            .await?;
        parse_bytes(&expect_str(&result, "code")?)
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError> {
        let result = self
            .pool
            .request(
                "eth_call",
                serde_json::json!([{"to": to, "data": data}, "latest"]),
            )
            .await?;
        parse_bytes(&expect_str(&result, "call result")?)
    }
}

/// In-memory chain state (for development/testing).
///
/// Calls are answered by `(target, selector)` lookup.
pub struct InMemoryChain {
    chain_id: u64,
    balances: RwLock<HashMap<Address, U256>>,
    code: RwLock<HashMap<Address, Bytes>>,
    calls: RwLock<HashMap<(Address, [u8; 4]), Bytes>>,
    failing: AtomicBool,
    requests: AtomicU64,
}

impl InMemoryChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            balances: RwLock::new(HashMap::new()),
            code: RwLock::new(HashMap::new()),
            calls: RwLock::new(HashMap::new()),
            failing: AtomicBool::new(false),
            requests: AtomicU64::new(0),
        }
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.balances.write().unwrap_or_else(|e| e.into_inner()).insert(address, balance);
    }

    pub fn set_code(&self, address: Address, code: Bytes) {
        self.code.write().unwrap_or_else(|e| e.into_inner()).insert(address, code);
    }

    pub fn set_call_result(&self, to: Address, selector: [u8; 4], result: Bytes) {
        self.calls.write().unwrap_or_else(|e| e.into_inner()).insert((to, selector), result);
    }

    /// Make every subsequent request fail with an HTTP error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of requests served so far.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    fn begin(&self) -> Result<(), RpcError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(RpcError::Http("in-memory chain unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChainReader for InMemoryChain {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        self.begin()?;
        Ok(self.chain_id)
    }

    async fn get_balance(&self, address: Address) -> Result<U256, RpcError> {
        self.begin()?;
        Ok(self
            .balances
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, RpcError> {
        self.begin()?;
        Ok(self
            .code
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError> {
        self.begin()?;
        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| RpcError::JsonRpc {
                code: -32602,
                message: "call data shorter than a selector".into(),
            })?;
        self.calls
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(to, selector))
            .cloned()
            .ok_or_else(|| RpcError::JsonRpc {
                code: 3,
                message: "execution reverted".into(),
            })
    }
}
