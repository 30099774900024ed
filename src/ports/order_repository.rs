//! Order repository port.
//!
//! The repository is the only writer of order state. Every state change goes
//! through [`OrderRepository::apply_transition`], which must behave as one
//! atomic compare-and-set per order: load the row under lock, plan the
//! transition with [`crate::domain::order::Order::plan_transition`], write
//! only on `Apply`. Concurrent callers for the same order therefore observe
//! exactly one `Applied` outcome.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, OrderNo, Timestamp, UserId};
use crate::domain::order::{Order, OrderError, OrderState, TransitionEvidence, TransitionOutcome};

/// Keyset position in a pending-order listing.
///
/// Listings are ordered by `(created_at, order_no)`; a cursor returns only
/// orders strictly after the given one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCursor {
    pub created_at: Timestamp,
    pub order_no: OrderNo,
}

impl OrderCursor {
    /// Cursor positioned at `order`.
    pub fn at(order: &Order) -> Self {
        Self {
            created_at: order.created_at,
            order_no: order.order_no.clone(),
        }
    }

    /// True if `order` sorts after this cursor.
    pub fn precedes(&self, order: &Order) -> bool {
        (order.created_at, order.order_no.as_str()) > (self.created_at, self.order_no.as_str())
    }
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists a newly created order.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` on failure, including a duplicate order number.
    async fn insert(&self, order: &Order) -> Result<(), DomainError>;

    async fn find_by_order_no(&self, order_no: &OrderNo) -> Result<Option<Order>, DomainError>;

    /// Atomically moves an order toward `target`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no order has this number
    /// - `AlreadyPaid` / `InvalidState` for rejected transitions
    /// - `Infrastructure` on storage failure
    async fn apply_transition(
        &self,
        order_no: &OrderNo,
        target: OrderState,
        evidence: &TransitionEvidence,
    ) -> Result<TransitionOutcome, OrderError>;

    /// Records that step-up verification passed for a pending order.
    ///
    /// Returns the updated order, or `None` if it does not exist.
    async fn mark_step_up_verified(
        &self,
        order_no: &OrderNo,
        at: Timestamp,
    ) -> Result<Option<Order>, DomainError>;

    /// Counts pending orders the user created at or after `since`.
    async fn count_unpaid_since(&self, user_id: &UserId, since: Timestamp)
        -> Result<u32, DomainError>;

    /// Pending orders created before `created_before` that have not expired
    /// at `now`, oldest first, starting after `after`.
    async fn list_pending_for_reconciliation(
        &self,
        created_before: Timestamp,
        now: Timestamp,
        after: Option<&OrderCursor>,
        limit: u32,
    ) -> Result<Vec<Order>, DomainError>;

    /// Pending orders whose expiry is at or before `now`, oldest first,
    /// starting after `after`.
    async fn list_expired_pending(
        &self,
        now: Timestamp,
        after: Option<&OrderCursor>,
        limit: u32,
    ) -> Result<Vec<Order>, DomainError>;

    /// Orders of a user, newest first.
    async fn list_by_user(&self, user_id: &UserId, limit: u32) -> Result<Vec<Order>, DomainError>;
}
