//! ProcessRefundHandler - Admin command that executes a requested refund at
//! the provider and takes back the VIP time it granted.

use std::sync::Arc;

use serde_json::json;

use crate::application::PaymentSettlement;
use crate::domain::foundation::{OrderNo, Timestamp};
use crate::domain::order::{
    Order, OrderError, OrderState, TransitionEvidence, TransitionOutcome, TransitionSource,
};
use crate::domain::payment::{RefundOutcome, RefundRequest};
use crate::ports::{AuditEvent, AuditEventType, OrderNotification, RiskLevel};

#[derive(Debug, Clone)]
pub struct ProcessRefundCommand {
    pub order_no: OrderNo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRefundResult {
    pub order_no: OrderNo,
    pub state: OrderState,
    pub provider_refund_id: Option<String>,

    /// Provider's reason when it declined the refund.
    pub rejection: Option<String>,
}

/// Handler for processing refund requests.
///
/// A transient provider failure leaves the order in `RefundPending` so the
/// command can simply be repeated. Calling it on an order already in
/// `RefundSuccess` re-runs the (idempotent) revocation without contacting
/// the provider again.
pub struct ProcessRefundHandler {
    settlement: Arc<PaymentSettlement>,
}

impl ProcessRefundHandler {
    pub fn new(settlement: Arc<PaymentSettlement>) -> Self {
        Self { settlement }
    }

    pub async fn handle(&self, cmd: ProcessRefundCommand) -> Result<ProcessRefundResult, OrderError> {
        let now = Timestamp::now();
        let order = self
            .settlement
            .orders()
            .find_by_order_no(&cmd.order_no)
            .await?
            .ok_or_else(|| OrderError::not_found(cmd.order_no.clone()))?;

        match order.state {
            OrderState::RefundPending => {}
            OrderState::RefundSuccess => {
                self.revoke(&order, now).await?;
                return Ok(ProcessRefundResult {
                    order_no: cmd.order_no,
                    state: order.state,
                    provider_refund_id: None,
                    rejection: None,
                });
            }
            current => return Err(OrderError::invalid_state(current, "process refund for")),
        }

        let requested_at = order.refund_requested_at.unwrap_or(now);
        let request = RefundRequest {
            order_no: order.order_no.clone(),
            channel: order.channel,
            refund_ref: format!("{}R{}", order.order_no, requested_at.as_unix_millis()),
            amount: order.amount,
            reason: order
                .refund_reason
                .clone()
                .unwrap_or_else(|| "refund requested".to_string()),
        };

        let gateway = self.settlement.gateways().resolve(order.provider())?;
        let outcome = gateway.refund(&request).await?;

        let (target, provider_refund_id, rejection) = match outcome {
            RefundOutcome::Accepted { provider_refund_id } => {
                (OrderState::RefundSuccess, provider_refund_id, None)
            }
            RefundOutcome::Rejected { reason } => (OrderState::RefundFailed, None, Some(reason)),
        };

        let note = rejection.clone().unwrap_or_else(|| request.reason.clone());
        let evidence = TransitionEvidence::with_reason(TransitionSource::Admin, note, now);
        let transition = self
            .settlement
            .apply(&order.order_no, target, &evidence)
            .await?;

        self.settlement
            .audit(
                AuditEvent::new(
                    AuditEventType::RefundProcessed,
                    if rejection.is_some() {
                        RiskLevel::Medium
                    } else {
                        RiskLevel::Low
                    },
                    json!({
                        "refund_ref": request.refund_ref,
                        "amount": request.amount,
                        "accepted": rejection.is_none(),
                        "provider_refund_id": provider_refund_id,
                        "rejection": rejection,
                    }),
                )
                .for_order(&order.order_no)
                .for_user(&order.user_id),
            )
            .await;

        if let TransitionOutcome::Applied(updated) = &transition {
            if updated.state == OrderState::RefundSuccess {
                self.revoke(updated, now).await?;
            }
        }

        Ok(ProcessRefundResult {
            order_no: cmd.order_no,
            state: transition.order().state,
            provider_refund_id,
            rejection,
        })
    }

    async fn revoke(&self, order: &Order, now: Timestamp) -> Result<(), OrderError> {
        match self
            .settlement
            .entitlements()
            .revoke_on_refund(order, now)
            .await
        {
            Ok(result) => {
                if result.is_applied() {
                    self.settlement
                        .notify(OrderNotification::RefundProcessed {
                            order: order.clone(),
                        })
                        .await;
                }
                Ok(())
            }
            Err(err) => {
                tracing::error!(
                    order_no = %order.order_no,
                    user_id = %order.user_id,
                    error = %err,
                    "Refund succeeded but entitlement could not be revoked"
                );
                self.settlement
                    .audit(
                        AuditEvent::new(
                            AuditEventType::EntitlementFailure,
                            RiskLevel::High,
                            json!({ "action": "revoke", "error": err.to_string() }),
                        )
                        .for_order(&order.order_no)
                        .for_user(&order.user_id),
                    )
                    .await;
                Err(err)
            }
        }
    }
}
