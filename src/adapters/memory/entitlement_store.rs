//! In-memory entitlement store for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::domain::entitlement::{EntitlementAction, UserEntitlement};
use crate::domain::foundation::{DomainError, OrderNo, UserId};
use crate::ports::{CommitResult, EntitlementStore};

#[derive(Default)]
struct State {
    entitlements: HashMap<UserId, UserEntitlement>,
    ledger: HashSet<(OrderNo, EntitlementAction)>,
}

/// Entitlements plus grant ledger under one lock.
#[derive(Default)]
pub struct InMemoryEntitlementStore {
    state: Mutex<State>,

    /// Number of upcoming commits that report a version conflict.
    forced_conflicts: Mutex<u32>,
}

impl InMemoryEntitlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` commits fail with `VersionConflict`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn force_conflicts(&self, count: u32) {
        *self
            .forced_conflicts
            .lock()
            .expect("InMemoryEntitlementStore: lock poisoned") = count;
    }

    /// Current entitlement, if one was ever written.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn get(&self, user_id: &UserId) -> Option<UserEntitlement> {
        self.state
            .lock()
            .expect("InMemoryEntitlementStore: lock poisoned")
            .entitlements
            .get(user_id)
            .cloned()
    }

    pub fn has_grant(&self, order_no: &OrderNo, action: EntitlementAction) -> bool {
        self.state
            .lock()
            .expect("InMemoryEntitlementStore: lock poisoned")
            .ledger
            .contains(&(order_no.clone(), action))
    }
}

#[async_trait]
impl EntitlementStore for InMemoryEntitlementStore {
    async fn load(&self, user_id: &UserId) -> Result<UserEntitlement, DomainError> {
        Ok(self
            .get(user_id)
            .unwrap_or_else(|| UserEntitlement::empty(user_id.clone())))
    }

    async fn commit(
        &self,
        order_no: &OrderNo,
        action: EntitlementAction,
        expected_version: i64,
        updated: &UserEntitlement,
    ) -> Result<CommitResult, DomainError> {
        let mut state = self
            .state
            .lock()
            .expect("InMemoryEntitlementStore: lock poisoned");

        let key = (order_no.clone(), action);
        if state.ledger.contains(&key) {
            return Ok(CommitResult::AlreadyApplied);
        }

        {
            let mut forced = self
                .forced_conflicts
                .lock()
                .expect("InMemoryEntitlementStore: lock poisoned");
            if *forced > 0 {
                *forced -= 1;
                return Ok(CommitResult::VersionConflict);
            }
        }

        let stored_version = state
            .entitlements
            .get(&updated.user_id)
            .map_or(0, |e| e.version);
        if stored_version != expected_version {
            return Ok(CommitResult::VersionConflict);
        }

        let mut written = updated.clone();
        written.version = expected_version + 1;
        state.entitlements.insert(written.user_id.clone(), written);
        state.ledger.insert(key);
        Ok(CommitResult::Committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entitlement::PackageDuration;
    use crate::domain::foundation::Timestamp;

    fn user() -> UserId {
        UserId::new("u-1").unwrap()
    }

    fn order(no: &str) -> OrderNo {
        OrderNo::new(no).unwrap()
    }

    #[tokio::test]
    async fn commit_bumps_version_and_records_grant() {
        let store = InMemoryEntitlementStore::new();
        let current = store.load(&user()).await.unwrap();
        let next = current
            .activated(PackageDuration::Days(30), &order("A"), Timestamp::now())
            .unwrap();

        let result = store
            .commit(&order("A"), EntitlementAction::Activate, current.version, &next)
            .await
            .unwrap();

        assert_eq!(result, CommitResult::Committed);
        assert_eq!(store.get(&user()).unwrap().version, 1);
        assert!(store.has_grant(&order("A"), EntitlementAction::Activate));
    }

    #[tokio::test]
    async fn stale_version_conflicts() {
        let store = InMemoryEntitlementStore::new();
        let current = store.load(&user()).await.unwrap();
        let next = current
            .activated(PackageDuration::Days(30), &order("A"), Timestamp::now())
            .unwrap();
        store
            .commit(&order("A"), EntitlementAction::Activate, 0, &next)
            .await
            .unwrap();

        let result = store
            .commit(&order("B"), EntitlementAction::Activate, 0, &next)
            .await
            .unwrap();
        assert_eq!(result, CommitResult::VersionConflict);
    }

    #[tokio::test]
    async fn repeated_grant_is_already_applied() {
        let store = InMemoryEntitlementStore::new();
        let current = store.load(&user()).await.unwrap();
        let next = current
            .activated(PackageDuration::Days(30), &order("A"), Timestamp::now())
            .unwrap();
        store
            .commit(&order("A"), EntitlementAction::Activate, 0, &next)
            .await
            .unwrap();

        let result = store
            .commit(&order("A"), EntitlementAction::Activate, 1, &next)
            .await
            .unwrap();
        assert_eq!(result, CommitResult::AlreadyApplied);
    }
}
