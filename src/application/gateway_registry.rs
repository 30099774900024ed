//! Provider -> gateway lookup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::order::Provider;
use crate::domain::payment::GatewayError;
use crate::ports::PaymentGateway;

/// Configured gateways keyed by provider.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<Provider, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a gateway under the provider it reports.
    pub fn register(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateways.insert(gateway.provider(), gateway);
        self
    }

    /// # Errors
    ///
    /// Returns `ProviderUnavailable` when no gateway is configured for
    /// `provider`.
    pub fn resolve(&self, provider: Provider) -> Result<Arc<dyn PaymentGateway>, GatewayError> {
        self.gateways.get(&provider).cloned().ok_or_else(|| {
            GatewayError::ProviderUnavailable(format!("{} is not configured", provider))
        })
    }

    pub fn is_configured(&self, provider: Provider) -> bool {
        self.gateways.contains_key(&provider)
    }

    pub fn providers(&self) -> Vec<Provider> {
        let mut providers: Vec<Provider> = self.gateways.keys().copied().collect();
        providers.sort_by_key(|p| p.as_str());
        providers
    }
}
