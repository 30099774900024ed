//! InitiatePaymentHandler - Command handler for opening a provider payment intent.

use std::sync::Arc;

use serde_json::json;

use crate::application::PaymentSettlement;
use crate::domain::foundation::{OrderNo, Timestamp, UserId};
use crate::domain::order::{OrderError, OrderState};
use crate::domain::payment::{CreatePaymentRequest, PaymentIntent};
use crate::domain::security::{GateDecision, GateStage, SecurityGate};
use crate::ports::{AccountStandingReader, AuditEvent, AuditEventType, PackageCatalog, RiskLevel};

const DEFAULT_DESCRIPTION: &str = "VIP membership";

#[derive(Debug, Clone)]
pub struct InitiatePaymentCommand {
    pub order_no: OrderNo,
    pub user_id: UserId,
    pub client_ip: Option<String>,
    pub return_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InitiatePaymentResult {
    pub order_no: OrderNo,
    pub intent: PaymentIntent,
}

/// Handler for starting payment of a pending order.
///
/// The returned intent only tells the client where to pay. The outcome
/// arrives later through a callback or reconciliation, never here.
pub struct InitiatePaymentHandler {
    settlement: Arc<PaymentSettlement>,
    catalog: Arc<dyn PackageCatalog>,
    accounts: Arc<dyn AccountStandingReader>,
    gate: SecurityGate,
}

impl InitiatePaymentHandler {
    pub fn new(
        settlement: Arc<PaymentSettlement>,
        catalog: Arc<dyn PackageCatalog>,
        accounts: Arc<dyn AccountStandingReader>,
        gate: SecurityGate,
    ) -> Self {
        Self {
            settlement,
            catalog,
            accounts,
            gate,
        }
    }

    pub async fn handle(
        &self,
        cmd: InitiatePaymentCommand,
    ) -> Result<InitiatePaymentResult, OrderError> {
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
        if order.state != OrderState::Pending {
            return Err(OrderError::invalid_state(order.state, "pay"));
        }
        if order.is_expired(&now) {
            return Err(OrderError::Expired(cmd.order_no));
        }

        let standing = self.accounts.standing(&cmd.user_id).await?;
        if let GateDecision::Rejected(reason) = self.gate.evaluate(
            &standing,
            GateStage::PaymentInitiation {
                amount: order.amount,
                step_up_verified: order.step_up_verified,
            },
        ) {
            tracing::warn!(
                order_no = %order.order_no,
                user_id = %order.user_id,
                reason = reason.as_str(),
                "Payment initiation rejected by security gate"
            );
            self.settlement
                .audit(
                    AuditEvent::new(
                        AuditEventType::SecurityRejection,
                        RiskLevel::Medium,
                        json!({
                            "stage": "payment_initiation",
                            "reason": reason.as_str(),
                            "amount": order.amount,
                        }),
                    )
                    .for_order(&order.order_no)
                    .for_user(&order.user_id),
                )
                .await;
            return Err(OrderError::SecurityRejected(reason));
        }

        let description = self
            .catalog
            .find(&order.package_id)
            .await?
            .map_or_else(|| DEFAULT_DESCRIPTION.to_string(), |p| p.name);

        let gateway = self.settlement.gateways().resolve(order.provider())?;
        let intent = gateway
            .create_payment(&CreatePaymentRequest {
                order_no: order.order_no.clone(),
                amount: order.amount,
                description,
                channel: order.channel,
                client_ip: cmd.client_ip.or_else(|| order.device.ip.clone()),
                return_url: cmd.return_url,
                expires_at: order.expires_at,
            })
            .await?;

        tracing::info!(
            order_no = %order.order_no,
            provider = %order.provider(),
            channel = %order.channel,
            "Payment intent created"
        );

        Ok(InitiatePaymentResult {
            order_no: order.order_no,
            intent,
        })
    }
}
