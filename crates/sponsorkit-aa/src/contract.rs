use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use sponsorkit_chain::ChainReader;
use sponsorkit_common::{Result, SponsorError};

sol! {
    interface ICounter {
        function increment() external;
        function counter() external view returns (uint256);
    }
}

/// ABI of the counter contract. Supplied by the caller; the session never
/// inspects it beyond these three operations.
pub trait CounterAbi: Send + Sync {
    fn encode_increment(&self) -> Result<Bytes>;
    fn encode_counter(&self) -> Result<Bytes>;
    fn decode_counter(&self, output: &[u8]) -> Result<U256>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SolCounterAbi;

impl SolCounterAbi {
    pub const INCREMENT_SELECTOR: [u8; 4] = ICounter::incrementCall::SELECTOR;
    pub const COUNTER_SELECTOR: [u8; 4] = ICounter::counterCall::SELECTOR;
}

impl CounterAbi for SolCounterAbi {
    fn encode_increment(&self) -> Result<Bytes> {
        Ok(ICounter::incrementCall {}.abi_encode().into())
    }

    fn encode_counter(&self) -> Result<Bytes> {
        Ok(ICounter::counterCall {}.abi_encode().into())
    }

    fn decode_counter(&self, output: &[u8]) -> Result<U256> {
        ICounter::counterCall::abi_decode_returns(output)
            .map_err(|e| SponsorError::Rpc(format!("invalid counter() return data: {e}")))
    }
}

/// Handle on the deployed counter contract.
#[derive(Clone)]
pub struct CounterContract {
    address: Address,
    abi: Arc<dyn CounterAbi>,
    reader: Arc<dyn ChainReader>,
}

impl CounterContract {
    pub fn new(address: Address, abi: Arc<dyn CounterAbi>, reader: Arc<dyn ChainReader>) -> Self {
        Self {
            address,
            abi,
            reader,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Call data for `increment()`.
    pub fn populate_increment(&self) -> Result<Bytes> {
        self.abi
            .encode_increment()
            .map_err(|e| match e {
                SponsorError::TransactionData(_) => e,
                other => SponsorError::TransactionData(other.to_string()),
            })
    }

    pub async fn counter(&self) -> Result<U256> {
        let data = self.abi.encode_counter()?;
        let output = self.reader.call(self.address, data).await?;
        self.abi.decode_counter(&output)
    }
}

impl std::fmt::Debug for CounterContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterContract")
            .field("address", &self.address)
            .finish()
    }
}
