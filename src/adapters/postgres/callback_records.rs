//! PostgreSQL implementation of CallbackRecordRepository.
//!
//! The partial unique index `payment_callbacks_success_uniq` allows one
//! `success` row per `(order_no, transaction_id)`. Concurrent deliveries that
//! race past the application check are resolved by `ON CONFLICT DO NOTHING`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, OrderNo, Timestamp, TransactionId};
use crate::domain::payment::{CallbackOutcome, CallbackRecord};
use crate::ports::{CallbackRecordRepository, SaveResult};

use super::database_error;

const CALLBACK_COLUMNS: &str = "order_no, transaction_id, provider, payload, signature_valid, \
    processed, outcome, error_message, received_at, processed_at";

pub struct PostgresCallbackRecords {
    pool: PgPool,
}

impl PostgresCallbackRecords {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CallbackRow {
    order_no: String,
    transaction_id: Option<String>,
    provider: String,
    payload: serde_json::Value,
    signature_valid: bool,
    processed: bool,
    outcome: String,
    error_message: Option<String>,
    received_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<CallbackRow> for CallbackRecord {
    type Error = DomainError;

    fn try_from(row: CallbackRow) -> Result<Self, Self::Error> {
        let invalid = |e: crate::domain::foundation::ValidationError| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid callback row: {}", e),
            )
        };
        Ok(CallbackRecord {
            order_no: OrderNo::new(row.order_no).map_err(invalid)?,
            transaction_id: row
                .transaction_id
                .map(TransactionId::new)
                .transpose()
                .map_err(invalid)?,
            provider: row.provider.parse().map_err(invalid)?,
            payload: row.payload,
            signature_valid: row.signature_valid,
            processed: row.processed,
            outcome: row.outcome.parse().map_err(invalid)?,
            error_message: row.error_message,
            received_at: Timestamp::from_datetime(row.received_at),
            processed_at: row.processed_at.map(Timestamp::from_datetime),
        })
    }
}

#[async_trait]
impl CallbackRecordRepository for PostgresCallbackRecords {
    async fn find_successful(
        &self,
        order_no: &OrderNo,
        transaction_id: &TransactionId,
    ) -> Result<Option<CallbackRecord>, DomainError> {
        let sql = format!(
            "SELECT {} FROM payment_callbacks \
             WHERE order_no = $1 AND transaction_id = $2 AND outcome = $3",
            CALLBACK_COLUMNS
        );
        let row: Option<CallbackRow> = sqlx::query_as(&sql)
            .bind(order_no.as_str())
            .bind(transaction_id.as_str())
            .bind(CallbackOutcome::Success.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| database_error("find callback record", e))?;

        row.map(CallbackRecord::try_from).transpose()
    }

    async fn save(&self, record: CallbackRecord) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO payment_callbacks (
                order_no, transaction_id, provider, payload, signature_valid,
                processed, outcome, error_message, received_at, processed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (order_no, transaction_id) WHERE outcome = 'success' DO NOTHING
            "#,
        )
        .bind(record.order_no.as_str())
        .bind(record.transaction_id.as_ref().map(|t| t.as_str()))
        .bind(record.provider.as_str())
        .bind(&record.payload)
        .bind(record.signature_valid)
        .bind(record.processed)
        .bind(record.outcome.as_str())
        .bind(&record.error_message)
        .bind(record.received_at.as_datetime())
        .bind(record.processed_at.as_ref().map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(|e| database_error("save callback record", e))?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyExists)
        } else {
            Ok(SaveResult::Inserted)
        }
    }

    async fn list_for_order(&self, order_no: &OrderNo) -> Result<Vec<CallbackRecord>, DomainError> {
        let sql = format!(
            "SELECT {} FROM payment_callbacks WHERE order_no = $1 ORDER BY received_at ASC, id ASC",
            CALLBACK_COLUMNS
        );
        let rows: Vec<CallbackRow> = sqlx::query_as(&sql)
            .bind(order_no.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| database_error("list callback records", e))?;

        rows.into_iter().map(CallbackRecord::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::Provider;

    #[test]
    fn row_converts_to_record() {
        let row = CallbackRow {
            order_no: "VIP-0001".to_string(),
            transaction_id: Some("tx-1".to_string()),
            provider: "wallet_b".to_string(),
            payload: serde_json::json!({ "trade_status": "TRADE_SUCCESS" }),
            signature_valid: true,
            processed: true,
            outcome: "duplicate".to_string(),
            error_message: None,
            received_at: Utc::now(),
            processed_at: Some(Utc::now()),
        };

        let record = CallbackRecord::try_from(row).unwrap();

        assert_eq!(record.provider, Provider::WalletB);
        assert_eq!(record.outcome, CallbackOutcome::Duplicate);
        assert!(record.processed_at.is_some());
    }
}
