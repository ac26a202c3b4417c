pub mod error;
pub mod signer;
pub mod types;

pub use error::{Result, SponsorError};
pub use signer::SigningProvider;
pub use types::*;
