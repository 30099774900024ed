//! GetOrderHandler and ListUserOrdersHandler - Order queries.

use std::sync::Arc;

use crate::application::{OrderPolicy, PaymentSettlement};
use crate::domain::entitlement::VipStatus;
use crate::domain::foundation::{OrderNo, Timestamp, UserId};
use crate::domain::order::{Order, OrderError, OrderState};

/// Query for a single order.
#[derive(Debug, Clone)]
pub struct GetOrderQuery {
    pub order_no: OrderNo,

    /// Caller; `None` for admin lookups that skip the ownership check.
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone)]
pub struct GetOrderResult {
    pub order: Order,

    /// VIP status of the owner, present once the order is paid.
    pub vip_status: Option<VipStatus>,
}

pub struct GetOrderHandler {
    settlement: Arc<PaymentSettlement>,
    policy: OrderPolicy,
}

impl GetOrderHandler {
    pub fn new(settlement: Arc<PaymentSettlement>, policy: OrderPolicy) -> Self {
        Self { settlement, policy }
    }

    pub async fn handle(&self, query: GetOrderQuery) -> Result<GetOrderResult, OrderError> {
        let order = self
            .settlement
            .orders()
            .find_by_order_no(&query.order_no)
            .await?
            .ok_or_else(|| OrderError::not_found(query.order_no.clone()))?;

        if let Some(user_id) = &query.user_id {
            if !order.belongs_to(user_id) {
                return Err(OrderError::Forbidden(query.order_no));
            }
        }

        let vip_status = if order.state == OrderState::Paid {
            let entitlement = self.settlement.entitlements().for_user(&order.user_id).await?;
            Some(entitlement.status(Timestamp::now(), self.policy.vip_grace_days))
        } else {
            None
        };

        Ok(GetOrderResult { order, vip_status })
    }
}

/// Query for a user's most recent orders.
#[derive(Debug, Clone)]
pub struct ListUserOrdersQuery {
    pub user_id: UserId,
    pub limit: u32,
}

pub struct ListUserOrdersHandler {
    settlement: Arc<PaymentSettlement>,
}

impl ListUserOrdersHandler {
    /// Upper bound on `limit`.
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(settlement: Arc<PaymentSettlement>) -> Self {
        Self { settlement }
    }

    pub async fn handle(&self, query: ListUserOrdersQuery) -> Result<Vec<Order>, OrderError> {
        let limit = query.limit.clamp(1, Self::MAX_LIMIT);
        Ok(self
            .settlement
            .orders()
            .list_by_user(&query.user_id, limit)
            .await?)
    }
}
