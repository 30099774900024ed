//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors)
//! - `order` - Order aggregate, state machine and transition planning
//! - `payment` - Provider-neutral gateway types, callback records, signing
//! - `entitlement` - Packages and VIP membership grants
//! - `security` - Purchase pre-checks
//! - `reconciliation` - Retry bookkeeping and run reports

pub mod entitlement;
pub mod foundation;
pub mod order;
pub mod payment;
pub mod reconciliation;
pub mod security;
