//! Payment provider configuration
//!
//! A provider without a section is left unregistered; orders on its
//! channels fail with a provider-unavailable error instead of crashing
//! startup.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::gateway::{WalletAConfig, WalletBConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Timeout applied to every provider API call, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub wallet_a: Option<WalletASettings>,

    #[serde(default)]
    pub wallet_b: Option<WalletBSettings>,
}

/// Wallet A merchant credentials
#[derive(Debug, Clone, Deserialize)]
pub struct WalletASettings {
    pub app_id: String,
    pub merchant_id: String,
    pub api_key: SecretString,
    pub notify_url: String,
    pub api_base_url: Option<String>,
}

/// Wallet B merchant credentials
#[derive(Debug, Clone, Deserialize)]
pub struct WalletBSettings {
    pub app_id: String,
    pub sign_key: SecretString,
    pub notify_url: String,
    pub gateway_url: Option<String>,
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Adapter config for Wallet A, if configured.
    pub fn wallet_a_config(&self) -> Option<WalletAConfig> {
        self.wallet_a.as_ref().map(|s| {
            let config = WalletAConfig::new(
                s.app_id.clone(),
                s.merchant_id.clone(),
                s.api_key.expose_secret().clone(),
                s.notify_url.clone(),
            )
            .with_timeout(self.request_timeout());
            match &s.api_base_url {
                Some(url) => config.with_base_url(url.clone()),
                None => config,
            }
        })
    }

    /// Adapter config for Wallet B, if configured.
    pub fn wallet_b_config(&self) -> Option<WalletBConfig> {
        self.wallet_b.as_ref().map(|s| {
            let config = WalletBConfig::new(
                s.app_id.clone(),
                s.sign_key.expose_secret().clone(),
                s.notify_url.clone(),
            )
            .with_timeout(self.request_timeout());
            match &s.gateway_url {
                Some(url) => config.with_gateway_url(url.clone()),
                None => config,
            }
        })
    }

    /// Validate provider configuration
    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 60 {
            return Err(ValidationError::InvalidTimeout);
        }
        if let Some(a) = &self.wallet_a {
            if a.app_id.is_empty() {
                return Err(ValidationError::MissingRequired("GATEWAY__WALLET_A__APP_ID"));
            }
            if a.api_key.expose_secret().is_empty() {
                return Err(ValidationError::MissingRequired("GATEWAY__WALLET_A__API_KEY"));
            }
            if production && !is_https(a.api_base_url.as_deref()) {
                return Err(ValidationError::ProviderUrlMustBeHttps("wallet_a"));
            }
        }
        if let Some(b) = &self.wallet_b {
            if b.app_id.is_empty() {
                return Err(ValidationError::MissingRequired("GATEWAY__WALLET_B__APP_ID"));
            }
            if b.sign_key.expose_secret().is_empty() {
                return Err(ValidationError::MissingRequired("GATEWAY__WALLET_B__SIGN_KEY"));
            }
            if production && !is_https(b.gateway_url.as_deref()) {
                return Err(ValidationError::ProviderUrlMustBeHttps("wallet_b"));
            }
        }
        Ok(())
    }
}

/// Unset URLs fall back to the adapters' HTTPS defaults.
fn is_https(url: Option<&str>) -> bool {
    url.map_or(true, |u| u.starts_with("https://"))
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            wallet_a: None,
            wallet_b: None,
        }
    }
}

fn default_request_timeout() -> u64 {
    10
}
