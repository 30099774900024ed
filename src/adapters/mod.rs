//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `gateway` - Wallet provider clients and a mock
//! - `http` - REST API and provider callback endpoints
//! - `memory` - In-memory stores for tests and local runs
//! - `notifier` - User notification delivery
//! - `postgres` - PostgreSQL-backed stores
//! - `scheduler` - Background reconciliation loop

pub mod gateway;
pub mod http;
pub mod memory;
pub mod notifier;
pub mod postgres;
pub mod scheduler;

pub use scheduler::{ReconciliationScheduler, SchedulerConfig};
