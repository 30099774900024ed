//! In-memory order repository for testing.
//!
//! # Security Note
//!
//! This adapter is for **testing only**. It uses `.expect()` on lock
//! operations which will panic if locks are poisoned. Production code uses
//! the PostgreSQL repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::foundation::{DomainError, ErrorCode, OrderNo, Timestamp, UserId};
use crate::domain::order::{
    Order, OrderError, OrderState, TransitionEvidence, TransitionOutcome, TransitionPlan,
};
use crate::ports::{OrderCursor, OrderRepository};

/// Order store backed by a single mutex.
///
/// `apply_transition` plans and writes while holding the lock, which gives
/// the same per-order atomicity as a row lock.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: Mutex<HashMap<OrderNo, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    /// Returns the stored copy of an order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn get(&self, order_no: &OrderNo) -> Option<Order> {
        self.orders
            .lock()
            .expect("InMemoryOrderRepository: lock poisoned")
            .get(order_no)
            .cloned()
    }

    /// Overwrites an order directly, bypassing transition rules.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn put(&self, order: Order) {
        self.orders
            .lock()
            .expect("InMemoryOrderRepository: lock poisoned")
            .insert(order.order_no.clone(), order);
    }

    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn len(&self) -> usize {
        self.orders
            .lock()
            .expect("InMemoryOrderRepository: lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn filtered<F>(&self, limit: u32, keep: F) -> Vec<Order>
    where
        F: Fn(&Order) -> bool,
    {
        let orders = self
            .orders
            .lock()
            .expect("InMemoryOrderRepository: lock poisoned");
        let mut matching: Vec<Order> = orders.values().filter(|o| keep(o)).cloned().collect();
        matching.sort_by(|a, b| {
            (a.created_at, &a.order_no).cmp(&(b.created_at, &b.order_no))
        });
        matching.truncate(limit as usize);
        matching
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: &Order) -> Result<(), DomainError> {
        let mut orders = self
            .orders
            .lock()
            .expect("InMemoryOrderRepository: lock poisoned");
        if orders.contains_key(&order.order_no) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                format!("Duplicate order number {}", order.order_no),
            ));
        }
        orders.insert(order.order_no.clone(), order.clone());
        Ok(())
    }

    async fn find_by_order_no(&self, order_no: &OrderNo) -> Result<Option<Order>, DomainError> {
        Ok(self.get(order_no))
    }

    async fn apply_transition(
        &self,
        order_no: &OrderNo,
        target: OrderState,
        evidence: &TransitionEvidence,
    ) -> Result<TransitionOutcome, OrderError> {
        let mut orders = self
            .orders
            .lock()
            .expect("InMemoryOrderRepository: lock poisoned");
        let current = orders
            .get(order_no)
            .cloned()
            .ok_or_else(|| OrderError::not_found(order_no.clone()))?;

        match current
            .plan_transition(target, evidence)
            .map_err(|r| OrderError::from_rejection(order_no, r))?
        {
            TransitionPlan::Apply(next) => {
                let next = *next;
                orders.insert(order_no.clone(), next.clone());
                Ok(TransitionOutcome::Applied(next))
            }
            TransitionPlan::NoOp => Ok(TransitionOutcome::NoOp(current)),
            TransitionPlan::Conflict(detail) => Ok(TransitionOutcome::ConflictingEvidence {
                order: current,
                detail,
            }),
        }
    }

    async fn mark_step_up_verified(
        &self,
        order_no: &OrderNo,
        at: Timestamp,
    ) -> Result<Option<Order>, DomainError> {
        let mut orders = self
            .orders
            .lock()
            .expect("InMemoryOrderRepository: lock poisoned");
        Ok(orders.get_mut(order_no).map(|order| {
            if order.state == OrderState::Pending {
                order.step_up_verified = true;
                order.updated_at = at;
            }
            order.clone()
        }))
    }

    async fn count_unpaid_since(
        &self,
        user_id: &UserId,
        since: Timestamp,
    ) -> Result<u32, DomainError> {
        let orders = self
            .orders
            .lock()
            .expect("InMemoryOrderRepository: lock poisoned");
        let count = orders
            .values()
            .filter(|o| {
                o.belongs_to(user_id)
                    && o.state == OrderState::Pending
                    && !o.created_at.is_before(&since)
            })
            .count();
        Ok(count as u32)
    }

    async fn list_pending_for_reconciliation(
        &self,
        created_before: Timestamp,
        now: Timestamp,
        after: Option<&OrderCursor>,
        limit: u32,
    ) -> Result<Vec<Order>, DomainError> {
        Ok(self.filtered(limit, |o| {
            o.state == OrderState::Pending
                && o.created_at.is_before(&created_before)
                && !o.is_expired(&now)
                && after.map_or(true, |c| c.precedes(o))
        }))
    }

    async fn list_expired_pending(
        &self,
        now: Timestamp,
        after: Option<&OrderCursor>,
        limit: u32,
    ) -> Result<Vec<Order>, DomainError> {
        Ok(self.filtered(limit, |o| {
            o.state == OrderState::Pending
                && o.is_expired(&now)
                && after.map_or(true, |c| c.precedes(o))
        }))
    }

    async fn list_by_user(&self, user_id: &UserId, limit: u32) -> Result<Vec<Order>, DomainError> {
        let mut orders = self.filtered(u32::MAX, |o| o.belongs_to(user_id));
        orders.reverse();
        orders.truncate(limit as usize);
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::TransactionId;
    use crate::domain::order::test_support::pending_order;
    use crate::domain::order::TransitionSource;
    use std::sync::Arc;

    fn paid_evidence(tx: &str) -> TransitionEvidence {
        TransitionEvidence::payment(
            TransitionSource::Callback,
            TransactionId::new(tx).unwrap(),
            Some(7900),
            Timestamp::now(),
        )
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_order_no() {
        let repo = InMemoryOrderRepository::new();
        let order = pending_order(Timestamp::now());
        repo.insert(&order).await.unwrap();
        assert!(repo.insert(&order).await.is_err());
    }

    #[tokio::test]
    async fn transition_on_missing_order_is_not_found() {
        let repo = InMemoryOrderRepository::new();
        let result = repo
            .apply_transition(&OrderNo::new("nope").unwrap(), OrderState::Paid, &paid_evidence("t"))
            .await;
        assert!(matches!(result, Err(OrderError::NotFound(_))));
    }

    #[tokio::test]
    async fn concurrent_payments_apply_exactly_once() {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let order = pending_order(Timestamp::now());
        repo.insert(&order).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = repo.clone();
            let order_no = order.order_no.clone();
            handles.push(tokio::spawn(async move {
                repo.apply_transition(&order_no, OrderState::Paid, &paid_evidence("tx-1"))
                    .await
                    .unwrap()
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), TransitionOutcome::Applied(_)) {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
        assert_eq!(repo.get(&order.order_no).unwrap().state, OrderState::Paid);
    }

    #[tokio::test]
    async fn conflict_leaves_order_untouched() {
        let repo = InMemoryOrderRepository::new();
        let order = pending_order(Timestamp::now());
        repo.insert(&order).await.unwrap();
        repo.apply_transition(&order.order_no, OrderState::Paid, &paid_evidence("tx-1"))
            .await
            .unwrap();

        let outcome = repo
            .apply_transition(&order.order_no, OrderState::Paid, &paid_evidence("tx-2"))
            .await
            .unwrap();

        assert!(matches!(outcome, TransitionOutcome::ConflictingEvidence { .. }));
        assert_eq!(
            repo.get(&order.order_no).unwrap().transaction_id.unwrap().as_str(),
            "tx-1"
        );
    }

    #[tokio::test]
    async fn reconciliation_listing_excludes_young_and_expired_orders() {
        let repo = InMemoryOrderRepository::new();
        let now = Timestamp::now();

        let mut old = pending_order(now.minus_minutes(10));
        old.order_no = OrderNo::new("old").unwrap();
        let mut young = pending_order(now.minus_minutes(1));
        young.order_no = OrderNo::new("young").unwrap();
        let mut expired = pending_order(now.minus_minutes(30));
        expired.order_no = OrderNo::new("expired").unwrap();
        for o in [&old, &young, &expired] {
            repo.insert(o).await.unwrap();
        }

        let candidates = repo
            .list_pending_for_reconciliation(now.minus_minutes(5), now, None, 100)
            .await
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].order_no.as_str(), "old");

        let stale = repo.list_expired_pending(now, None, 100).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].order_no.as_str(), "expired");
    }

    #[tokio::test]
    async fn cursor_pages_through_orders_sharing_a_timestamp() {
        let repo = InMemoryOrderRepository::new();
        let now = Timestamp::now();
        let created = now.minus_minutes(30);
        for no in ["c", "a", "b"] {
            let mut order = pending_order(created);
            order.order_no = OrderNo::new(no).unwrap();
            repo.insert(&order).await.unwrap();
        }

        let first = repo.list_expired_pending(now, None, 2).await.unwrap();
        let names: Vec<_> = first.iter().map(|o| o.order_no.as_str()).collect();
        assert_eq!(names, ["a", "b"]);

        let cursor = OrderCursor::at(first.last().unwrap());
        let second = repo.list_expired_pending(now, Some(&cursor), 2).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].order_no.as_str(), "c");

        let cursor = OrderCursor::at(&second[0]);
        assert!(repo
            .list_expired_pending(now, Some(&cursor), 2)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn unpaid_count_only_includes_recent_pending_orders() {
        let repo = InMemoryOrderRepository::new();
        let now = Timestamp::now();
        let mut recent = pending_order(now.minus_minutes(10));
        recent.order_no = OrderNo::new("recent").unwrap();
        let mut old = pending_order(now.minus_minutes(90));
        old.order_no = OrderNo::new("old").unwrap();
        repo.insert(&recent).await.unwrap();
        repo.insert(&old).await.unwrap();

        let count = repo
            .count_unpaid_since(&recent.user_id, now.minus_minutes(60))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
