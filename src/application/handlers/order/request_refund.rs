//! RequestRefundHandler - Command handler for a user asking for a refund.

use std::sync::Arc;

use serde_json::json;

use crate::application::{OrderPolicy, PaymentSettlement};
use crate::domain::foundation::{OrderNo, Timestamp, UserId};
use crate::domain::order::{OrderError, OrderState, TransitionEvidence, TransitionSource};
use crate::ports::{AuditEvent, AuditEventType, PackageCatalog, RiskLevel};

#[derive(Debug, Clone)]
pub struct RequestRefundCommand {
    pub order_no: OrderNo,
    pub user_id: UserId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRefundResult {
    pub order_no: OrderNo,
    pub state: OrderState,
}

/// Handler for refund requests.
///
/// Only paid, non-lifetime orders inside the refund window qualify. The
/// provider is not contacted here; an operator processes the request.
pub struct RequestRefundHandler {
    settlement: Arc<PaymentSettlement>,
    catalog: Arc<dyn PackageCatalog>,
    policy: OrderPolicy,
}

impl RequestRefundHandler {
    pub fn new(
        settlement: Arc<PaymentSettlement>,
        catalog: Arc<dyn PackageCatalog>,
        policy: OrderPolicy,
    ) -> Self {
        Self {
            settlement,
            catalog,
            policy,
        }
    }

    pub async fn handle(&self, cmd: RequestRefundCommand) -> Result<RequestRefundResult, OrderError> {
        let reason = cmd.reason.trim();
        if reason.is_empty() {
            return Err(OrderError::validation("reason", "a refund reason is required"));
        }

        let now = Timestamp::now();
        let order = self
            .settlement
            .orders()
            .find_by_order_no(&cmd.order_no)
            .await?
            .ok_or_else(|| OrderError::not_found(cmd.order_no.clone()))?;
        if !order.belongs_to(&cmd.user_id) {
            return Err(OrderError::Forbidden(cmd.order_no));
        }

        let lifetime = self
            .catalog
            .find(&order.package_id)
            .await?
            .map_or(false, |p| p.is_lifetime());
        order
            .check_refundable(&now, lifetime, self.policy.refund_valid_days)
            .map_err(OrderError::not_refundable)?;

        let evidence = TransitionEvidence::with_reason(TransitionSource::User, reason, now);
        let outcome = self
            .settlement
            .apply(&cmd.order_no, OrderState::RefundPending, &evidence)
            .await?;

        self.settlement
            .audit(
                AuditEvent::new(
                    AuditEventType::RefundRequested,
                    RiskLevel::Low,
                    json!({ "reason": reason, "amount": order.amount }),
                )
                .for_order(&order.order_no)
                .for_user(&order.user_id),
            )
            .await;

        Ok(RequestRefundResult {
            order_no: cmd.order_no,
            state: outcome.order().state,
        })
    }
}
