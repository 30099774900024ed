//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Every order state change funnels through [`PaymentSettlement`], which
//! wraps the store's atomic transition with logging, auditing, entitlement
//! grants and notifications.

mod entitlement_applier;
mod gateway_registry;
pub mod handlers;
mod policy;
mod reconciliation;
mod settlement;

#[cfg(test)]
pub(crate) mod test_support;

pub use entitlement_applier::{EntitlementApplier, GrantResult};
pub use gateway_registry::GatewayRegistry;
pub use policy::{OrderPolicy, ReconciliationPolicy};
pub use reconciliation::{ReconciliationService, PROVIDER_CLOSED_REASON, TIMEOUT_REASON};
pub use settlement::{PaymentSettlement, SettlementOutcome};
