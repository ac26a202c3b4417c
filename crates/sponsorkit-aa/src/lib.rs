pub mod contract;
pub mod poller;
pub mod relay;
pub mod tracker;
pub mod wallet;

pub use contract::{CounterAbi, CounterContract, SolCounterAbi};
pub use poller::{CounterStatusSource, StatusPoller, StatusSnapshot, StatusSource};
pub use relay::{HttpRelayClient, InMemoryRelay, RelayClient, RelayError, RelayTaskState, SponsoredCallRequest};
pub use tracker::TransactionTracker;
pub use wallet::{AccountFactory, MetaTransaction, SendTransactionResponse, SmartWalletSession};
