//! Entitlement store port.
//!
//! Entitlement changes are committed with optimistic concurrency and a grant
//! ledger keyed by `(order_no, action)`. The ledger check, the version check
//! and the write must happen in one transaction.

use async_trait::async_trait;

use crate::domain::entitlement::{EntitlementAction, UserEntitlement};
use crate::domain::foundation::{DomainError, OrderNo, UserId};

/// Result of a conditional entitlement write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitResult {
    /// Written; the stored version is now `expected_version + 1`.
    Committed,

    /// Someone else changed the entitlement first. Reload and retry.
    VersionConflict,

    /// This order already applied this action. Nothing was written.
    AlreadyApplied,
}

#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Loads the entitlement, or an empty one at version 0.
    async fn load(&self, user_id: &UserId) -> Result<UserEntitlement, DomainError>;

    /// Writes `updated` if the stored version still equals
    /// `expected_version` and the ledger has no `(order_no, action)` entry.
    async fn commit(
        &self,
        order_no: &OrderNo,
        action: EntitlementAction,
        expected_version: i64,
        updated: &UserEntitlement,
    ) -> Result<CommitResult, DomainError>;
}
