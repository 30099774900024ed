//! PaymentSettlement - the single path by which orders change state.
//!
//! Callbacks, reconciliation, user actions and admin tools all go through
//! [`PaymentSettlement::apply`], which delegates to the store's atomic
//! transition and records what happened. Payment settlement adds the
//! entitlement grant and notification on top.

use std::sync::Arc;

use serde_json::json;

use crate::domain::foundation::{OrderNo, Timestamp};
use crate::domain::order::{
    Order, OrderError, OrderState, TransitionEvidence, TransitionOutcome, TransitionSource,
};
use crate::ports::{
    AuditEvent, AuditEventType, AuditLog, NotificationDispatcher, OrderNotification,
    OrderRepository, RiskLevel,
};

use super::{EntitlementApplier, GatewayRegistry, GrantResult};

/// Result of settling a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// This call moved the order to `Paid`.
    Settled(Order),

    /// The order was already settled with the same transaction.
    AlreadySettled(Order),

    /// Evidence contradicts the stored order; nothing was changed.
    Conflict { order: Order, detail: String },
}

impl SettlementOutcome {
    pub fn order(&self) -> &Order {
        match self {
            SettlementOutcome::Settled(order)
            | SettlementOutcome::AlreadySettled(order)
            | SettlementOutcome::Conflict { order, .. } => order,
        }
    }
}

pub struct PaymentSettlement {
    orders: Arc<dyn OrderRepository>,
    gateways: GatewayRegistry,
    entitlements: EntitlementApplier,
    notifier: Arc<dyn NotificationDispatcher>,
    audit: Arc<dyn AuditLog>,
}

impl PaymentSettlement {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        gateways: GatewayRegistry,
        entitlements: EntitlementApplier,
        notifier: Arc<dyn NotificationDispatcher>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            orders,
            gateways,
            entitlements,
            notifier,
            audit,
        }
    }

    pub fn orders(&self) -> &Arc<dyn OrderRepository> {
        &self.orders
    }

    pub fn gateways(&self) -> &GatewayRegistry {
        &self.gateways
    }

    pub fn entitlements(&self) -> &EntitlementApplier {
        &self.entitlements
    }

    pub fn audit_log(&self) -> &Arc<dyn AuditLog> {
        &self.audit
    }

    /// Applies one transition atomically and records the attempt.
    ///
    /// Conflicting evidence is logged and audited but returned as `Ok`, since
    /// the caller asked a legitimate question and got a definite answer.
    ///
    /// # Errors
    ///
    /// Returns `OrderError` when the order is missing, the transition is not
    /// allowed, or the store fails.
    pub async fn apply(
        &self,
        order_no: &OrderNo,
        target: OrderState,
        evidence: &TransitionEvidence,
    ) -> Result<TransitionOutcome, OrderError> {
        let outcome = match self.orders.apply_transition(order_no, target, evidence).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(
                    order_no = %order_no,
                    target = %target,
                    source = %evidence.source,
                    error = %err,
                    "Order transition rejected"
                );
                return Err(err);
            }
        };

        match &outcome {
            TransitionOutcome::Applied(order) => {
                tracing::info!(
                    order_no = %order_no,
                    target = %target,
                    source = %evidence.source,
                    state = %order.state,
                    "Order transition applied"
                );
            }
            TransitionOutcome::NoOp(order) => {
                tracing::debug!(
                    order_no = %order_no,
                    target = %target,
                    source = %evidence.source,
                    state = %order.state,
                    "Order transition was a no-op"
                );
            }
            TransitionOutcome::ConflictingEvidence { order, detail } => {
                tracing::error!(
                    order_no = %order_no,
                    target = %target,
                    source = %evidence.source,
                    state = %order.state,
                    detail = %detail,
                    "Conflicting payment evidence, manual review required"
                );
                self.audit(
                    AuditEvent::new(
                        AuditEventType::ConflictingEvidence,
                        RiskLevel::High,
                        json!({
                            "target": target.as_str(),
                            "current": order.state.as_str(),
                            "source": evidence.source.as_str(),
                            "transaction_id": evidence.transaction_id.as_ref().map(|t| t.as_str()),
                            "amount": evidence.amount,
                            "detail": detail,
                        }),
                    )
                    .for_order(order_no)
                    .for_user(&order.user_id),
                )
                .await;
            }
        }

        Ok(outcome)
    }

    /// Moves an order to `Paid` and grants its entitlement.
    ///
    /// Re-delivery of the same payment repairs a missing grant: the grant
    /// ledger makes activation idempotent, so a `NoOp` on a paid order
    /// re-runs activation and only notifies if it actually applied.
    ///
    /// # Errors
    ///
    /// Returns `OrderError` if the transition is rejected or the entitlement
    /// could not be written. In the latter case the order stays `Paid`.
    pub async fn settle_paid(
        &self,
        order_no: &OrderNo,
        evidence: &TransitionEvidence,
    ) -> Result<SettlementOutcome, OrderError> {
        match self.apply(order_no, OrderState::Paid, evidence).await? {
            TransitionOutcome::Applied(order) => {
                self.grant(&order).await?;
                Ok(SettlementOutcome::Settled(order))
            }
            TransitionOutcome::NoOp(order) => {
                if order.state == OrderState::Paid {
                    self.grant(&order).await?;
                }
                Ok(SettlementOutcome::AlreadySettled(order))
            }
            TransitionOutcome::ConflictingEvidence { order, detail } => {
                Ok(SettlementOutcome::Conflict { order, detail })
            }
        }
    }

    /// Cancels a pending order and asks the provider to close it.
    ///
    /// Closing at the provider is best effort; a failure is logged and the
    /// cancellation stands.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyPaid` when the order was paid in the meantime.
    pub async fn cancel(
        &self,
        order_no: &OrderNo,
        source: TransitionSource,
        reason: &str,
        now: Timestamp,
    ) -> Result<TransitionOutcome, OrderError> {
        let evidence = TransitionEvidence::with_reason(source, reason, now);
        let outcome = self.apply(order_no, OrderState::Cancelled, &evidence).await?;

        if let TransitionOutcome::Applied(order) = &outcome {
            self.close_at_provider(order).await;
        }
        Ok(outcome)
    }

    /// Dispatches a notification; failures are logged, never propagated.
    pub async fn notify(&self, notification: OrderNotification) {
        let kind = notification.kind();
        let order_no = notification.order().order_no.clone();
        if let Err(err) = self.notifier.dispatch(notification).await {
            tracing::warn!(
                order_no = %order_no,
                kind,
                error = %err,
                "Failed to dispatch order notification"
            );
        }
    }

    /// Records an audit event; failures are logged, never propagated.
    pub async fn audit(&self, event: AuditEvent) {
        let event_type = event.event_type;
        if let Err(err) = self.audit.record(event).await {
            tracing::error!(
                event_type = event_type.as_str(),
                error = %err,
                "Failed to record audit event"
            );
        }
    }

    async fn grant(&self, order: &Order) -> Result<(), OrderError> {
        let result = match self
            .entitlements
            .activate_on_payment(order, Timestamp::now())
            .await
        {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(
                    order_no = %order.order_no,
                    user_id = %order.user_id,
                    error = %err,
                    "Order paid but entitlement could not be applied"
                );
                self.audit(
                    AuditEvent::new(
                        AuditEventType::EntitlementFailure,
                        RiskLevel::High,
                        json!({ "action": "activate", "error": err.to_string() }),
                    )
                    .for_order(&order.order_no)
                    .for_user(&order.user_id),
                )
                .await;
                return Err(err);
            }
        };

        if let GrantResult::Applied(entitlement) = result {
            self.notify(OrderNotification::PaymentSucceeded {
                order: order.clone(),
                vip_expires_at: entitlement.vip_expires_at,
                lifetime: entitlement.is_lifetime,
            })
            .await;
        }
        Ok(())
    }

    async fn close_at_provider(&self, order: &Order) {
        let gateway = match self.gateways.resolve(order.provider()) {
            Ok(gateway) => gateway,
            Err(err) => {
                tracing::warn!(order_no = %order.order_no, error = %err, "Cannot close order at provider");
                return;
            }
        };
        match gateway.close_order(&order.order_no, order.channel).await {
            Ok(outcome) => {
                tracing::debug!(order_no = %order.order_no, outcome = ?outcome, "Closed order at provider");
            }
            Err(err) => {
                tracing::warn!(
                    order_no = %order.order_no,
                    error = %err,
                    "Failed to close order at provider"
                );
            }
        }
    }
}
