pub mod local;
pub mod providers;
pub mod signer;

pub use local::LocalKeyProvider;
pub use providers::{
    ChainNamespace, IdentityNetwork, IdentityProvider, IdentitySettings, LoginMethod, MfaLevel,
    OpenloginSettings, Theme, UiConfig, UxMode, WalletAdapter, WhiteLabel,
};
pub use signer::LocalSigner;
