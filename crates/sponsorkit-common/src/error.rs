use thiserror::Error;

#[derive(Error, Debug)]
pub enum SponsorError {
    #[error("identity provider initialization failed: {0}")]
    ProviderInit(String),

    #[error("{0} is not initialized yet")]
    NotInitialized(&'static str),

    #[error("wallet session is not connected")]
    NotConnected,

    #[error("wallet session is already connected")]
    AlreadyConnected,

    #[error("wallet session is already initialized")]
    AlreadyInitialized,

    #[error("smart wallet is not initialized")]
    WalletNotInitialized,

    #[error("contract is not initialized")]
    ContractNotInitialized,

    #[error("transaction data could not be populated: {0}")]
    TransactionData(String),

    #[error("transaction submission rejected: {0}")]
    TransactionSubmission(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("identity provider error: {0}")]
    Identity(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("relay error: {0}")]
    Relay(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("session ended before the operation completed")]
    SessionExpired,
}

impl SponsorError {
    /// Sequencing violations: an operation was invoked before its prerequisite state.
    pub fn is_sequencing(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized(_)
                | Self::NotConnected
                | Self::AlreadyConnected
                | Self::AlreadyInitialized
        )
    }
}

pub type Result<T> = std::result::Result<T, SponsorError>;
