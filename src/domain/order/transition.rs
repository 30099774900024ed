//! Transition planning for orders.
//!
//! `plan_transition` is the single decision function behind the store's
//! atomic `apply_transition`. Adapters load the row under lock, ask the
//! order for a plan, and write only when the plan is [`TransitionPlan::Apply`].
//!
//! | Current           | Target `Paid`                 | Target `Cancelled` |
//! |-------------------|-------------------------------|--------------------|
//! | Pending           | apply (needs transaction id)  | apply              |
//! | Paid / refund_*   | no-op if same tx, else conflict | `AlreadyPaid`    |
//! | Cancelled         | conflict                      | no-op              |

use crate::domain::foundation::{StateMachine, Timestamp, TransactionId};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Order, OrderState, RefundState};

/// Who or what is driving a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionSource {
    Callback,
    Reconciliation,
    Timeout,
    User,
    Admin,
}

impl TransitionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionSource::Callback => "callback",
            TransitionSource::Reconciliation => "reconciliation",
            TransitionSource::Timeout => "timeout",
            TransitionSource::User => "user",
            TransitionSource::Admin => "admin",
        }
    }
}

impl fmt::Display for TransitionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facts supporting a requested transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvidence {
    pub source: TransitionSource,
    pub transaction_id: Option<TransactionId>,

    /// Amount the provider reports, in minor units.
    pub amount: Option<i64>,

    pub reason: Option<String>,
    pub occurred_at: Timestamp,
}

impl TransitionEvidence {
    /// Evidence that the provider captured a payment.
    pub fn payment(
        source: TransitionSource,
        transaction_id: TransactionId,
        amount: Option<i64>,
        occurred_at: Timestamp,
    ) -> Self {
        Self {
            source,
            transaction_id: Some(transaction_id),
            amount,
            reason: None,
            occurred_at,
        }
    }

    /// Evidence for a cancellation or refund step carrying only a reason.
    pub fn with_reason(
        source: TransitionSource,
        reason: impl Into<String>,
        occurred_at: Timestamp,
    ) -> Self {
        Self {
            source,
            transaction_id: None,
            amount: None,
            reason: Some(reason.into()),
            occurred_at,
        }
    }
}

/// Result of planning a transition against the current order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionPlan {
    /// Write this updated order.
    Apply(Box<Order>),

    /// Already in the target (or a superseding) state with the same evidence.
    NoOp,

    /// Evidence contradicts what is recorded; never written.
    Conflict(String),
}

/// Transition requests that are invalid rather than conflicting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionRejection {
    /// Cancellation requested for an order that was paid.
    AlreadyPaid { current: OrderState },

    /// The state machine has no such edge.
    NotAllowed { from: OrderState, to: OrderState },

    /// A payment transition without a provider transaction id.
    MissingTransactionId,
}

impl fmt::Display for TransitionRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionRejection::AlreadyPaid { current } => {
                write!(f, "order is already {}; request a refund instead", current)
            }
            TransitionRejection::NotAllowed { from, to } => {
                write!(f, "cannot move order from {} to {}", from, to)
            }
            TransitionRejection::MissingTransactionId => {
                write!(f, "payment evidence has no transaction id")
            }
        }
    }
}

/// Outcome reported by the order store after an atomic transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The write happened; carries the order as stored.
    Applied(Order),

    /// Nothing to do; carries the unchanged order.
    NoOp(Order),

    /// Rejected for manual review; carries the unchanged order.
    ConflictingEvidence { order: Order, detail: String },
}

impl TransitionOutcome {
    pub fn order(&self) -> &Order {
        match self {
            TransitionOutcome::Applied(order)
            | TransitionOutcome::NoOp(order)
            | TransitionOutcome::ConflictingEvidence { order, .. } => order,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransitionOutcome::Applied(_) => "applied",
            TransitionOutcome::NoOp(_) => "no_op",
            TransitionOutcome::ConflictingEvidence { .. } => "conflicting_evidence",
        }
    }
}

impl Order {
    /// Decides what a transition to `target` backed by `evidence` means for
    /// this order.
    ///
    /// # Errors
    ///
    /// Returns `TransitionRejection` for requests the caller must route
    /// elsewhere (cancel after payment) or that are malformed.
    pub fn plan_transition(
        &self,
        target: OrderState,
        evidence: &TransitionEvidence,
    ) -> Result<TransitionPlan, TransitionRejection> {
        match target {
            OrderState::Paid => self.plan_payment(evidence),
            OrderState::Cancelled => self.plan_cancellation(evidence),
            _ => self.plan_simple(target, evidence),
        }
    }

    fn plan_payment(&self, evidence: &TransitionEvidence) -> Result<TransitionPlan, TransitionRejection> {
        let received = evidence
            .transaction_id
            .as_ref()
            .ok_or(TransitionRejection::MissingTransactionId)?;

        match self.state {
            OrderState::Pending => {
                if let Some(amount) = evidence.amount {
                    if amount != self.amount {
                        return Ok(TransitionPlan::Conflict(format!(
                            "provider reported amount {} for order amount {}",
                            amount, self.amount
                        )));
                    }
                }
                let mut next = self.advance(OrderState::Paid, evidence)?;
                next.transaction_id = Some(received.clone());
                next.paid_at = Some(evidence.occurred_at);
                Ok(TransitionPlan::Apply(Box::new(next)))
            }
            OrderState::Cancelled => Ok(TransitionPlan::Conflict(format!(
                "payment {} received for cancelled order",
                received
            ))),
            _ => match &self.transaction_id {
                Some(recorded) if recorded == received => Ok(TransitionPlan::NoOp),
                Some(recorded) => Ok(TransitionPlan::Conflict(format!(
                    "order already paid with transaction {}, received {}",
                    recorded, received
                ))),
                None => Ok(TransitionPlan::Conflict(format!(
                    "order is {} without a recorded transaction, received {}",
                    self.state, received
                ))),
            },
        }
    }

    fn plan_cancellation(
        &self,
        evidence: &TransitionEvidence,
    ) -> Result<TransitionPlan, TransitionRejection> {
        match self.state {
            OrderState::Pending => {
                let mut next = self.advance(OrderState::Cancelled, evidence)?;
                next.cancelled_at = Some(evidence.occurred_at);
                next.cancel_reason = evidence.reason.clone();
                Ok(TransitionPlan::Apply(Box::new(next)))
            }
            OrderState::Cancelled => Ok(TransitionPlan::NoOp),
            current => Err(TransitionRejection::AlreadyPaid { current }),
        }
    }

    fn plan_simple(
        &self,
        target: OrderState,
        evidence: &TransitionEvidence,
    ) -> Result<TransitionPlan, TransitionRejection> {
        if self.state == target {
            return Ok(TransitionPlan::NoOp);
        }

        let mut next = self.advance(target, evidence)?;
        match target {
            OrderState::RefundPending => {
                next.refund_reason = evidence.reason.clone();
                next.refund_requested_at = Some(evidence.occurred_at);
            }
            OrderState::RefundSuccess => {
                next.refunded_at = Some(evidence.occurred_at);
            }
            _ => {}
        }
        Ok(TransitionPlan::Apply(Box::new(next)))
    }

    fn advance(
        &self,
        target: OrderState,
        evidence: &TransitionEvidence,
    ) -> Result<Order, TransitionRejection> {
        let state = self
            .state
            .transition_to(target)
            .map_err(|_| TransitionRejection::NotAllowed {
                from: self.state,
                to: target,
            })?;

        let mut next = self.clone();
        next.state = state;
        next.refund_state = RefundState::for_order_state(state, self.refund_state);
        next.updated_at = evidence.occurred_at;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::super::aggregate::test_support::pending_order;
    use super::*;

    fn tx(id: &str) -> TransactionId {
        TransactionId::new(id).unwrap()
    }

    fn paid_evidence(id: &str) -> TransitionEvidence {
        TransitionEvidence::payment(TransitionSource::Callback, tx(id), Some(7900), Timestamp::now())
    }

    fn applied(plan: TransitionPlan) -> Order {
        match plan {
            TransitionPlan::Apply(order) => *order,
            other => panic!("expected Apply, got {:?}", other),
        }
    }

    fn paid_order() -> Order {
        let order = pending_order(Timestamp::now());
        applied(order.plan_transition(OrderState::Paid, &paid_evidence("tx-1")).unwrap())
    }

    // ══════════════════════════════════════════════════════════════
    // Payment
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn pending_order_becomes_paid_with_transaction() {
        let paid = paid_order();
        assert_eq!(paid.state, OrderState::Paid);
        assert_eq!(paid.transaction_id, Some(tx("tx-1")));
        assert!(paid.paid_at.is_some());
    }

    #[test]
    fn repeated_payment_with_same_transaction_is_no_op() {
        let paid = paid_order();
        let plan = paid.plan_transition(OrderState::Paid, &paid_evidence("tx-1")).unwrap();
        assert_eq!(plan, TransitionPlan::NoOp);
    }

    #[test]
    fn payment_with_different_transaction_conflicts() {
        let paid = paid_order();
        let plan = paid.plan_transition(OrderState::Paid, &paid_evidence("tx-2")).unwrap();
        match plan {
            TransitionPlan::Conflict(detail) => {
                assert!(detail.contains("tx-1"));
                assert!(detail.contains("tx-2"));
            }
            other => panic!("expected Conflict, got {:?}", other),
        }
    }

    #[test]
    fn payment_for_cancelled_order_conflicts() {
        let order = pending_order(Timestamp::now());
        let cancel = TransitionEvidence::with_reason(TransitionSource::Timeout, "timeout", Timestamp::now());
        let cancelled = applied(order.plan_transition(OrderState::Cancelled, &cancel).unwrap());

        let plan = cancelled.plan_transition(OrderState::Paid, &paid_evidence("tx-1")).unwrap();
        assert!(matches!(plan, TransitionPlan::Conflict(_)));
    }

    #[test]
    fn payment_with_wrong_amount_conflicts() {
        let order = pending_order(Timestamp::now());
        let evidence =
            TransitionEvidence::payment(TransitionSource::Callback, tx("tx-1"), Some(100), Timestamp::now());
        let plan = order.plan_transition(OrderState::Paid, &evidence).unwrap();
        assert!(matches!(plan, TransitionPlan::Conflict(_)));
    }

    #[test]
    fn payment_without_transaction_is_rejected() {
        let order = pending_order(Timestamp::now());
        let evidence = TransitionEvidence::with_reason(TransitionSource::Admin, "manual", Timestamp::now());
        assert_eq!(
            order.plan_transition(OrderState::Paid, &evidence),
            Err(TransitionRejection::MissingTransactionId)
        );
    }

    #[test]
    fn refunded_order_treats_same_payment_as_no_op() {
        let paid = paid_order();
        let reason = TransitionEvidence::with_reason(TransitionSource::User, "changed mind", Timestamp::now());
        let refunding = applied(paid.plan_transition(OrderState::RefundPending, &reason).unwrap());

        let plan = refunding.plan_transition(OrderState::Paid, &paid_evidence("tx-1")).unwrap();
        assert_eq!(plan, TransitionPlan::NoOp);
    }

    // ══════════════════════════════════════════════════════════════
    // Cancellation
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn pending_order_cancels_with_reason() {
        let order = pending_order(Timestamp::now());
        let evidence = TransitionEvidence::with_reason(TransitionSource::Timeout, "timeout", Timestamp::now());
        let cancelled = applied(order.plan_transition(OrderState::Cancelled, &evidence).unwrap());

        assert_eq!(cancelled.state, OrderState::Cancelled);
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("timeout"));
        assert!(cancelled.cancelled_at.is_some());
    }

    #[test]
    fn cancelling_cancelled_order_is_no_op() {
        let order = pending_order(Timestamp::now());
        let evidence = TransitionEvidence::with_reason(TransitionSource::User, "no longer needed", Timestamp::now());
        let cancelled = applied(order.plan_transition(OrderState::Cancelled, &evidence).unwrap());

        assert_eq!(
            cancelled.plan_transition(OrderState::Cancelled, &evidence),
            Ok(TransitionPlan::NoOp)
        );
    }

    #[test]
    fn cancelling_paid_order_fails_with_already_paid() {
        let paid = paid_order();
        let evidence = TransitionEvidence::with_reason(TransitionSource::User, "oops", Timestamp::now());
        assert_eq!(
            paid.plan_transition(OrderState::Cancelled, &evidence),
            Err(TransitionRejection::AlreadyPaid { current: OrderState::Paid })
        );
    }

    // ══════════════════════════════════════════════════════════════
    // Refund
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn paid_order_moves_to_refund_pending() {
        let paid = paid_order();
        let reason = TransitionEvidence::with_reason(TransitionSource::User, "duplicate purchase", Timestamp::now());
        let refunding = applied(paid.plan_transition(OrderState::RefundPending, &reason).unwrap());

        assert_eq!(refunding.state, OrderState::RefundPending);
        assert_eq!(refunding.refund_state, RefundState::Requested);
        assert_eq!(refunding.refund_reason.as_deref(), Some("duplicate purchase"));
        assert_eq!(refunding.transaction_id, Some(tx("tx-1")));
    }

    #[test]
    fn refund_success_records_refund_time() {
        let paid = paid_order();
        let reason = TransitionEvidence::with_reason(TransitionSource::User, "r", Timestamp::now());
        let refunding = applied(paid.plan_transition(OrderState::RefundPending, &reason).unwrap());
        let done = applied(refunding.plan_transition(OrderState::RefundSuccess, &reason).unwrap());

        assert_eq!(done.refund_state, RefundState::Succeeded);
        assert!(done.refunded_at.is_some());
    }

    #[test]
    fn pending_order_cannot_be_refunded() {
        let order = pending_order(Timestamp::now());
        let reason = TransitionEvidence::with_reason(TransitionSource::User, "r", Timestamp::now());
        assert_eq!(
            order.plan_transition(OrderState::RefundPending, &reason),
            Err(TransitionRejection::NotAllowed {
                from: OrderState::Pending,
                to: OrderState::RefundPending
            })
        );
    }

    // ══════════════════════════════════════════════════════════════
    // Properties
    // ══════════════════════════════════════════════════════════════

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn payment_applies_at_most_once_and_never_changes_transaction(
            deliveries in proptest::collection::vec((0u8..3, any::<bool>()), 1..12)
        ) {
            let mut order = pending_order(Timestamp::now());
            let mut settled_with: Option<TransactionId> = None;

            for (tx_index, amount_matches) in deliveries {
                let amount = if amount_matches { order.amount } else { order.amount + 1 };
                let evidence = TransitionEvidence::payment(
                    TransitionSource::Callback,
                    tx(&format!("tx-{}", tx_index)),
                    Some(amount),
                    Timestamp::now(),
                );

                if let Ok(TransitionPlan::Apply(next)) =
                    order.plan_transition(OrderState::Paid, &evidence)
                {
                    prop_assert!(settled_with.is_none());
                    prop_assert!(amount_matches);
                    settled_with = next.transaction_id.clone();
                    order = *next;
                }

                prop_assert_eq!(&order.transaction_id, &settled_with);
            }
        }
    }
}
