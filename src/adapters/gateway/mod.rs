//! Payment gateway adapters.
//!
//! - `WalletAGateway` - JSON API with header signatures
//! - `WalletBGateway` - flat-parameter API with a `sign` parameter
//! - `MockGateway` - configurable test double

mod mock_gateway;
mod wallet_a;
mod wallet_b;

pub use mock_gateway::{MethodCall, MockGateway};
pub use wallet_a::{
    WalletAConfig, WalletAGateway, NONCE_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
pub use wallet_b::{format_amount, parse_amount, WalletBConfig, WalletBGateway};
