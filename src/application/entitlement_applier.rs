//! EntitlementApplier - grants and revokes VIP time for orders.
//!
//! Each `(order_no, action)` pair takes effect at most once, regardless of
//! how many deliveries, reconciliation passes or retries reach it. Writes
//! are optimistic: load, compute, commit against the loaded version, and
//! reload on conflict.

use std::sync::Arc;

use crate::domain::entitlement::{EntitlementAction, Package, UserEntitlement};
use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::order::{Order, OrderError};
use crate::ports::{CommitResult, EntitlementStore, PackageCatalog};

/// Commit attempts before giving up on a contended entitlement.
const MAX_COMMIT_ATTEMPTS: u32 = 3;

/// Result of applying an entitlement action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantResult {
    /// This call changed the entitlement; carries the stored value.
    Applied(UserEntitlement),

    /// The action was applied earlier; carries the current value.
    AlreadyApplied(UserEntitlement),
}

impl GrantResult {
    pub fn entitlement(&self) -> &UserEntitlement {
        match self {
            GrantResult::Applied(e) | GrantResult::AlreadyApplied(e) => e,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, GrantResult::Applied(_))
    }
}

pub struct EntitlementApplier {
    store: Arc<dyn EntitlementStore>,
    catalog: Arc<dyn PackageCatalog>,
}

impl EntitlementApplier {
    pub fn new(store: Arc<dyn EntitlementStore>, catalog: Arc<dyn PackageCatalog>) -> Self {
        Self { store, catalog }
    }

    /// Extends or grants VIP for a paid order.
    pub async fn activate_on_payment(
        &self,
        order: &Order,
        now: Timestamp,
    ) -> Result<GrantResult, OrderError> {
        self.apply(order, EntitlementAction::Activate, now).await
    }

    /// Takes back the VIP time a refunded order granted.
    pub async fn revoke_on_refund(
        &self,
        order: &Order,
        now: Timestamp,
    ) -> Result<GrantResult, OrderError> {
        self.apply(order, EntitlementAction::Revoke, now).await
    }

    /// Current entitlement of `user_id`.
    pub async fn for_user(&self, user_id: &UserId) -> Result<UserEntitlement, OrderError> {
        Ok(self.store.load(user_id).await?)
    }

    async fn package(&self, order: &Order) -> Result<Package, OrderError> {
        self.catalog
            .find(&order.package_id)
            .await?
            .ok_or_else(|| OrderError::PackageNotFound(order.package_id.clone()))
    }

    async fn apply(
        &self,
        order: &Order,
        action: EntitlementAction,
        now: Timestamp,
    ) -> Result<GrantResult, OrderError> {
        let package = self.package(order).await?;

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let current = self.store.load(&order.user_id).await?;
            let next = match action {
                EntitlementAction::Activate => {
                    current.activated(package.duration, &order.order_no, now)?
                }
                EntitlementAction::Revoke => current.revoked(package.duration, &order.order_no, now),
            };

            match self
                .store
                .commit(&order.order_no, action, current.version, &next)
                .await?
            {
                CommitResult::Committed => {
                    tracing::info!(
                        order_no = %order.order_no,
                        user_id = %order.user_id,
                        action = action.as_str(),
                        vip_expires_at = ?next.vip_expires_at,
                        lifetime = next.is_lifetime,
                        "Entitlement updated"
                    );
                    return Ok(GrantResult::Applied(UserEntitlement {
                        version: current.version + 1,
                        ..next
                    }));
                }
                CommitResult::AlreadyApplied => {
                    tracing::debug!(
                        order_no = %order.order_no,
                        action = action.as_str(),
                        "Entitlement action already applied"
                    );
                    return Ok(GrantResult::AlreadyApplied(current));
                }
                CommitResult::VersionConflict => {
                    tracing::debug!(
                        order_no = %order.order_no,
                        attempt,
                        "Entitlement version conflict, reloading"
                    );
                }
            }
        }

        Err(OrderError::infrastructure(format!(
            "entitlement for order {} kept conflicting after {} attempts",
            order.order_no, MAX_COMMIT_ATTEMPTS
        )))
    }
}
