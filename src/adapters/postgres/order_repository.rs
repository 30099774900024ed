//! PostgreSQL implementation of OrderRepository.
//!
//! Transitions lock the order row with `SELECT ... FOR UPDATE` inside a
//! transaction, so the plan-then-write sequence is a single atomic step per
//! order even with several service instances running.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    DomainError, ErrorCode, OrderId, OrderNo, PackageId, Timestamp, TransactionId, UserId,
};
use crate::domain::order::{
    DeviceContext, DeviceType, Order, OrderError, OrderState, TransitionEvidence,
    TransitionOutcome, TransitionPlan,
};
use crate::ports::{OrderCursor, OrderRepository};

use super::database_error;

const ORDER_COLUMNS: &str = "id, order_no, user_id, package_id, amount, channel, state, \
    refund_state, transaction_id, step_up_required, step_up_verified, client_ip, user_agent, \
    device_type, created_at, expires_at, paid_at, cancelled_at, cancel_reason, refund_reason, \
    refund_requested_at, refunded_at, updated_at";

/// PostgreSQL implementation of the OrderRepository port.
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of an order.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_no: String,
    user_id: String,
    package_id: String,
    amount: i64,
    channel: String,
    state: String,
    refund_state: String,
    transaction_id: Option<String>,
    step_up_required: bool,
    step_up_verified: bool,
    client_ip: Option<String>,
    user_agent: Option<String>,
    device_type: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
    refund_reason: Option<String>,
    refund_requested_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = DomainError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: OrderId::from_uuid(row.id),
            order_no: OrderNo::new(row.order_no).map_err(corrupt)?,
            user_id: UserId::new(row.user_id).map_err(corrupt)?,
            package_id: PackageId::new(row.package_id).map_err(corrupt)?,
            amount: row.amount,
            channel: row.channel.parse().map_err(corrupt)?,
            state: row.state.parse().map_err(corrupt)?,
            refund_state: row.refund_state.parse().map_err(corrupt)?,
            transaction_id: row
                .transaction_id
                .map(TransactionId::new)
                .transpose()
                .map_err(corrupt)?,
            step_up_required: row.step_up_required,
            step_up_verified: row.step_up_verified,
            device: DeviceContext {
                ip: row.client_ip,
                user_agent: row.user_agent,
                device_type: parse_device_type(&row.device_type)?,
            },
            created_at: Timestamp::from_datetime(row.created_at),
            expires_at: Timestamp::from_datetime(row.expires_at),
            paid_at: row.paid_at.map(Timestamp::from_datetime),
            cancelled_at: row.cancelled_at.map(Timestamp::from_datetime),
            cancel_reason: row.cancel_reason,
            refund_reason: row.refund_reason,
            refund_requested_at: row.refund_requested_at.map(Timestamp::from_datetime),
            refunded_at: row.refunded_at.map(Timestamp::from_datetime),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn corrupt(err: impl std::fmt::Display) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid order row: {}", err),
    )
}

fn parse_device_type(s: &str) -> Result<DeviceType, DomainError> {
    match s {
        "desktop" => Ok(DeviceType::Desktop),
        "mobile" => Ok(DeviceType::Mobile),
        other => Err(corrupt(format!("unknown device type '{}'", other))),
    }
}

fn device_type_to_str(device_type: DeviceType) -> &'static str {
    match device_type {
        DeviceType::Desktop => "desktop",
        DeviceType::Mobile => "mobile",
    }
}

fn to_order_error(action: &str) -> impl FnOnce(sqlx::Error) -> OrderError + '_ {
    move |e| OrderError::infrastructure(format!("Failed to {}: {}", action, e))
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn insert(&self, order: &Order) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO vip_orders (
                id, order_no, user_id, package_id, amount, channel, state, refund_state,
                transaction_id, step_up_required, step_up_verified, client_ip, user_agent,
                device_type, created_at, expires_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.order_no.as_str())
        .bind(order.user_id.as_str())
        .bind(order.package_id.as_str())
        .bind(order.amount)
        .bind(order.channel.as_str())
        .bind(order.state.as_str())
        .bind(order.refund_state.as_str())
        .bind(order.transaction_id.as_ref().map(|t| t.as_str()))
        .bind(order.step_up_required)
        .bind(order.step_up_verified)
        .bind(&order.device.ip)
        .bind(&order.device.user_agent)
        .bind(device_type_to_str(order.device.device_type))
        .bind(order.created_at.as_datetime())
        .bind(order.expires_at.as_datetime())
        .bind(order.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| database_error("insert order", e))?;

        Ok(())
    }

    async fn find_by_order_no(&self, order_no: &OrderNo) -> Result<Option<Order>, DomainError> {
        let sql = format!("SELECT {} FROM vip_orders WHERE order_no = $1", ORDER_COLUMNS);
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(order_no.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| database_error("find order", e))?;

        row.map(Order::try_from).transpose()
    }

    async fn apply_transition(
        &self,
        order_no: &OrderNo,
        target: OrderState,
        evidence: &TransitionEvidence,
    ) -> Result<TransitionOutcome, OrderError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(to_order_error("start transaction"))?;

        let sql = format!(
            "SELECT {} FROM vip_orders WHERE order_no = $1 FOR UPDATE",
            ORDER_COLUMNS
        );
        let row: OrderRow = sqlx::query_as(&sql)
            .bind(order_no.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(to_order_error("lock order"))?
            .ok_or_else(|| OrderError::not_found(order_no.clone()))?;
        let current = Order::try_from(row)?;

        let next = match current
            .plan_transition(target, evidence)
            .map_err(|r| OrderError::from_rejection(order_no, r))?
        {
            TransitionPlan::Apply(next) => *next,
            // Dropping the transaction releases the row lock
            TransitionPlan::NoOp => return Ok(TransitionOutcome::NoOp(current)),
            TransitionPlan::Conflict(detail) => {
                return Ok(TransitionOutcome::ConflictingEvidence {
                    order: current,
                    detail,
                })
            }
        };

        sqlx::query(
            r#"
            UPDATE vip_orders SET
                state = $2,
                refund_state = $3,
                transaction_id = $4,
                paid_at = $5,
                cancelled_at = $6,
                cancel_reason = $7,
                refund_reason = $8,
                refund_requested_at = $9,
                refunded_at = $10,
                updated_at = $11
            WHERE order_no = $1
            "#,
        )
        .bind(order_no.as_str())
        .bind(next.state.as_str())
        .bind(next.refund_state.as_str())
        .bind(next.transaction_id.as_ref().map(|t| t.as_str()))
        .bind(next.paid_at.as_ref().map(|t| *t.as_datetime()))
        .bind(next.cancelled_at.as_ref().map(|t| *t.as_datetime()))
        .bind(&next.cancel_reason)
        .bind(&next.refund_reason)
        .bind(next.refund_requested_at.as_ref().map(|t| *t.as_datetime()))
        .bind(next.refunded_at.as_ref().map(|t| *t.as_datetime()))
        .bind(next.updated_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(to_order_error("update order"))?;

        tx.commit()
            .await
            .map_err(to_order_error("commit transition"))?;

        Ok(TransitionOutcome::Applied(next))
    }

    async fn mark_step_up_verified(
        &self,
        order_no: &OrderNo,
        at: Timestamp,
    ) -> Result<Option<Order>, DomainError> {
        sqlx::query(
            r#"
            UPDATE vip_orders SET step_up_verified = TRUE, updated_at = $2
            WHERE order_no = $1 AND state = 'pending'
            "#,
        )
        .bind(order_no.as_str())
        .bind(at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| database_error("mark step-up verified", e))?;

        self.find_by_order_no(order_no).await
    }

    async fn count_unpaid_since(
        &self,
        user_id: &UserId,
        since: Timestamp,
    ) -> Result<u32, DomainError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM vip_orders
            WHERE user_id = $1 AND state = 'pending' AND created_at >= $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(since.as_datetime())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| database_error("count unpaid orders", e))?;

        Ok(count.max(0) as u32)
    }

    async fn list_pending_for_reconciliation(
        &self,
        created_before: Timestamp,
        now: Timestamp,
        after: Option<&OrderCursor>,
        limit: u32,
    ) -> Result<Vec<Order>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM vip_orders
            WHERE state = 'pending' AND created_at < $1 AND expires_at > $2
              AND ($3::timestamptz IS NULL OR (created_at, order_no) > ($3, $4))
            ORDER BY created_at ASC, order_no ASC
            LIMIT $5
            "#,
            ORDER_COLUMNS
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(created_before.as_datetime())
            .bind(now.as_datetime())
            .bind(after.map(|c| *c.created_at.as_datetime()))
            .bind(after.map(|c| c.order_no.as_str()))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| database_error("list pending orders", e))?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn list_expired_pending(
        &self,
        now: Timestamp,
        after: Option<&OrderCursor>,
        limit: u32,
    ) -> Result<Vec<Order>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM vip_orders
            WHERE state = 'pending' AND expires_at <= $1
              AND ($2::timestamptz IS NULL OR (created_at, order_no) > ($2, $3))
            ORDER BY created_at ASC, order_no ASC
            LIMIT $4
            "#,
            ORDER_COLUMNS
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(now.as_datetime())
            .bind(after.map(|c| *c.created_at.as_datetime()))
            .bind(after.map(|c| c.order_no.as_str()))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| database_error("list expired orders", e))?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn list_by_user(&self, user_id: &UserId, limit: u32) -> Result<Vec<Order>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM vip_orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
            ORDER_COLUMNS
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(user_id.as_str())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| database_error("list user orders", e))?;

        rows.into_iter().map(Order::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> OrderRow {
        let now = Utc::now();
        OrderRow {
            id: Uuid::new_v4(),
            order_no: "VIP-0001".to_string(),
            user_id: "user-1".to_string(),
            package_id: "monthly".to_string(),
            amount: 7900,
            channel: "wallet_a_qr".to_string(),
            state: "paid".to_string(),
            refund_state: "none".to_string(),
            transaction_id: Some("tx-1".to_string()),
            step_up_required: false,
            step_up_verified: false,
            client_ip: Some("10.0.0.1".to_string()),
            user_agent: None,
            device_type: "desktop".to_string(),
            created_at: now,
            expires_at: now + chrono::Duration::minutes(15),
            paid_at: Some(now),
            cancelled_at: None,
            cancel_reason: None,
            refund_reason: None,
            refund_requested_at: None,
            refunded_at: None,
            updated_at: now,
        }
    }

    #[test]
    fn row_converts_to_order() {
        let order = Order::try_from(row()).unwrap();
        assert_eq!(order.order_no.as_str(), "VIP-0001");
        assert_eq!(order.state, OrderState::Paid);
        assert_eq!(order.transaction_id.unwrap().as_str(), "tx-1");
        assert_eq!(order.device.ip.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn unknown_state_is_a_database_error() {
        let mut bad = row();
        bad.state = "settled".to_string();
        let err = Order::try_from(bad).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn device_type_round_trips_through_column_value() {
        for device in [DeviceType::Desktop, DeviceType::Mobile] {
            assert_eq!(parse_device_type(device_type_to_str(device)).unwrap(), device);
        }
    }
}
