//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresOrderRepository` - Orders with row-locked transitions
//! - `PostgresCallbackRecords` - Provider notification log
//! - `PostgresEntitlementStore` - Versioned VIP grants with a grant ledger
//! - `PostgresPackageCatalog` / `PostgresAccountDirectory` - Read-only lookups
//! - `PostgresAuditLog` - Audit trail
//!
//! Schema lives in `migrations/` and is applied at startup.

mod audit_log;
mod callback_records;
mod directory;
mod entitlement_store;
mod order_repository;

pub use audit_log::PostgresAuditLog;
pub use callback_records::PostgresCallbackRecords;
pub use directory::{PostgresAccountDirectory, PostgresPackageCatalog};
pub use entitlement_store::PostgresEntitlementStore;
pub use order_repository::PostgresOrderRepository;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Wraps a driver error with the operation that failed.
fn database_error(action: &str, err: sqlx::Error) -> DomainError {
    tracing::debug!(action, error = %err, "Database operation failed");
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Failed to {}: {}", action, err),
    )
}
