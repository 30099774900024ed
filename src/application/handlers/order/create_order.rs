//! CreateOrderHandler - Command handler for opening a VIP purchase order.

use std::sync::Arc;

use serde_json::json;

use crate::application::{OrderPolicy, PaymentSettlement};
use crate::domain::foundation::{OrderNo, PackageId, Timestamp, UserId};
use crate::domain::order::{DeviceContext, NewOrder, Order, OrderError, PaymentChannel};
use crate::domain::security::{GateDecision, GateStage, SecurityGate};
use crate::ports::{AccountStandingReader, AuditEvent, AuditEventType, PackageCatalog, RiskLevel};

/// Window over which unpaid orders are counted by the security gate.
const UNPAID_WINDOW_MINUTES: i64 = 60;

/// Command to create an order.
#[derive(Debug, Clone)]
pub struct CreateOrderCommand {
    pub user_id: UserId,
    pub package_id: PackageId,
    pub channel: PaymentChannel,
    pub device: DeviceContext,
}

/// Result of successful order creation.
#[derive(Debug, Clone)]
pub struct CreateOrderResult {
    pub order_no: OrderNo,
    pub expires_at: Timestamp,
    pub step_up_required: bool,
    pub amount: i64,
    pub package_name: String,
    pub channel: PaymentChannel,
}

/// Handler for creating orders.
///
/// Checks the package, lifetime ownership and the security gate before
/// anything is written. Rejections carry a reason the client can act on.
pub struct CreateOrderHandler {
    settlement: Arc<PaymentSettlement>,
    catalog: Arc<dyn PackageCatalog>,
    accounts: Arc<dyn AccountStandingReader>,
    gate: SecurityGate,
    policy: OrderPolicy,
}

impl CreateOrderHandler {
    pub fn new(
        settlement: Arc<PaymentSettlement>,
        catalog: Arc<dyn PackageCatalog>,
        accounts: Arc<dyn AccountStandingReader>,
        gate: SecurityGate,
        policy: OrderPolicy,
    ) -> Self {
        Self {
            settlement,
            catalog,
            accounts,
            gate,
            policy,
        }
    }

    pub async fn handle(&self, cmd: CreateOrderCommand) -> Result<CreateOrderResult, OrderError> {
        let now = Timestamp::now();

        // 1. Package must exist and be on sale
        let package = self
            .catalog
            .find(&cmd.package_id)
            .await?
            .ok_or_else(|| OrderError::PackageNotFound(cmd.package_id.clone()))?;
        if !package.active {
            return Err(OrderError::PackageUnavailable(package.id));
        }

        // 2. Lifetime members cannot buy lifetime again
        if package.is_lifetime() {
            let entitlement = self.settlement.entitlements().for_user(&cmd.user_id).await?;
            if entitlement.is_lifetime {
                return Err(OrderError::LifetimeAlreadyOwned);
            }
        }

        // 3. Security gate
        let standing = self.accounts.standing(&cmd.user_id).await?;
        let unpaid = self
            .settlement
            .orders()
            .count_unpaid_since(&cmd.user_id, now.minus_minutes(UNPAID_WINDOW_MINUTES))
            .await?;
        if let GateDecision::Rejected(reason) = self.gate.evaluate(
            &standing,
            GateStage::OrderCreation {
                unpaid_orders_last_hour: unpaid,
            },
        ) {
            tracing::warn!(
                user_id = %cmd.user_id,
                reason = reason.as_str(),
                unpaid_orders = unpaid,
                "Order creation rejected by security gate"
            );
            self.settlement
                .audit(
                    AuditEvent::new(
                        AuditEventType::SecurityRejection,
                        RiskLevel::Medium,
                        json!({
                            "stage": "order_creation",
                            "reason": reason.as_str(),
                            "unpaid_orders_last_hour": unpaid,
                            "package_id": package.id.as_str(),
                        }),
                    )
                    .for_user(&cmd.user_id),
                )
                .await;
            return Err(OrderError::SecurityRejected(reason));
        }

        // 4. Open the order
        let order = Order::create(NewOrder {
            order_no: OrderNo::generate(now.as_unix_millis()),
            user_id: cmd.user_id,
            package_id: package.id.clone(),
            amount: package.price_cents,
            channel: cmd.channel,
            step_up_required: self.gate.policy().requires_step_up(package.price_cents),
            device: cmd.device,
            created_at: now,
            expires_at: now.plus_minutes(self.policy.order_timeout_minutes),
        })?;
        self.settlement.orders().insert(&order).await?;

        tracing::info!(
            order_no = %order.order_no,
            user_id = %order.user_id,
            package_id = %order.package_id,
            channel = %order.channel,
            amount = order.amount,
            step_up_required = order.step_up_required,
            "Order created"
        );

        Ok(CreateOrderResult {
            order_no: order.order_no,
            expires_at: order.expires_at,
            step_up_required: order.step_up_required,
            amount: order.amount,
            package_name: package.name,
            channel: order.channel,
        })
    }
}
