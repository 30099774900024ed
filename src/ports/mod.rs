//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Payment Ports
//!
//! - `PaymentGateway` - One wallet provider (create, query, refund, close, callbacks)
//!
//! ## Storage Ports
//!
//! - `OrderRepository` - Orders with an atomic per-order transition
//! - `CallbackRecordRepository` - Durable notification log
//! - `EntitlementStore` - Versioned VIP grants with a grant ledger
//! - `PackageCatalog` - VIP packages
//!
//! ## Collaborator Ports
//!
//! - `AccountStandingReader` - Account facts for the security gate
//! - `PaymentLockWriter` - Operator lock on a user's payments
//! - `NotificationDispatcher` - Best-effort user notifications
//! - `AuditLog` - Security and reconciliation audit trail

mod account_standing;
mod audit_log;
mod callback_record_repository;
mod entitlement_store;
mod notification_dispatcher;
mod order_repository;
mod package_catalog;
mod payment_gateway;

pub use account_standing::{AccountStandingReader, PaymentLockState, PaymentLockWriter};
pub use audit_log::{AuditEvent, AuditEventType, AuditLog, RiskLevel};
pub use callback_record_repository::{CallbackRecordRepository, SaveResult};
pub use entitlement_store::{CommitResult, EntitlementStore};
pub use notification_dispatcher::{NotificationDispatcher, OrderNotification};
pub use order_repository::{OrderCursor, OrderRepository};
pub use package_catalog::PackageCatalog;
pub use payment_gateway::PaymentGateway;
