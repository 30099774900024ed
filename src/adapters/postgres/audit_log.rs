//! PostgreSQL implementation of AuditLog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, OrderNo, Timestamp, UserId};
use crate::ports::{AuditEvent, AuditEventType, AuditLog};

use super::database_error;

/// Append-only audit trail in `audit_events`.
pub struct PostgresAuditLog {
    pool: PgPool,
}

impl PostgresAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditEventRow {
    event_type: String,
    risk_level: String,
    user_id: Option<String>,
    order_no: Option<String>,
    data: serde_json::Value,
    occurred_at: DateTime<Utc>,
}

impl TryFrom<AuditEventRow> for AuditEvent {
    type Error = DomainError;

    fn try_from(row: AuditEventRow) -> Result<Self, Self::Error> {
        Ok(AuditEvent {
            event_type: row.event_type.parse()?,
            risk_level: row.risk_level.parse()?,
            user_id: row.user_id.map(UserId::new).transpose()?,
            order_no: row.order_no.map(OrderNo::new).transpose()?,
            data: row.data,
            occurred_at: Timestamp::from_datetime(row.occurred_at),
        })
    }
}

#[async_trait]
impl AuditLog for PostgresAuditLog {
    async fn record(&self, event: AuditEvent) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (event_type, risk_level, user_id, order_no, data, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.event_type.as_str())
        .bind(event.risk_level.as_str())
        .bind(event.user_id.as_ref().map(|u| u.as_str()))
        .bind(event.order_no.as_ref().map(|o| o.as_str()))
        .bind(&event.data)
        .bind(event.occurred_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| database_error("record audit event", e))?;

        Ok(())
    }
    async fn list_since(
        &self,
        event_type: AuditEventType,
        since: Timestamp,
    ) -> Result<Vec<AuditEvent>, DomainError> {
        let rows: Vec<AuditEventRow> = sqlx::query_as(
            r#"
            SELECT event_type, risk_level, user_id, order_no, data, occurred_at
            FROM audit_events
            WHERE event_type = $1 AND occurred_at >= $2
            ORDER BY occurred_at ASC, id ASC
            "#,
        )
        .bind(event_type.as_str())
        .bind(since.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| database_error("list audit events", e))?;

        rows.into_iter().map(AuditEvent::try_from).collect()
    }
}
