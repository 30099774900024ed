//! PostgreSQL implementation of EntitlementStore.
//!
//! `commit` claims the `(order_no, action)` ledger row and performs the
//! versioned write in one transaction. Either both land or neither does.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::entitlement::{EntitlementAction, UserEntitlement};
use crate::domain::foundation::{DomainError, ErrorCode, OrderNo, Timestamp, UserId};
use crate::ports::{CommitResult, EntitlementStore};

use super::database_error;

pub struct PostgresEntitlementStore {
    pool: PgPool,
}

impl PostgresEntitlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EntitlementRow {
    user_id: String,
    vip_expires_at: Option<DateTime<Utc>>,
    is_lifetime: bool,
    lifetime_order_no: Option<String>,
    activated_at: Option<DateTime<Utc>>,
    version: i64,
}

impl TryFrom<EntitlementRow> for UserEntitlement {
    type Error = DomainError;

    fn try_from(row: EntitlementRow) -> Result<Self, Self::Error> {
        let invalid = |e: crate::domain::foundation::ValidationError| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid entitlement row: {}", e),
            )
        };
        Ok(UserEntitlement {
            user_id: UserId::new(row.user_id).map_err(invalid)?,
            vip_expires_at: row.vip_expires_at.map(Timestamp::from_datetime),
            is_lifetime: row.is_lifetime,
            lifetime_order_no: row
                .lifetime_order_no
                .map(OrderNo::new)
                .transpose()
                .map_err(invalid)?,
            activated_at: row.activated_at.map(Timestamp::from_datetime),
            version: row.version,
        })
    }
}

#[async_trait]
impl EntitlementStore for PostgresEntitlementStore {
    async fn load(&self, user_id: &UserId) -> Result<UserEntitlement, DomainError> {
        let row: Option<EntitlementRow> = sqlx::query_as(
            r#"
            SELECT user_id, vip_expires_at, is_lifetime, lifetime_order_no, activated_at, version
            FROM user_entitlements
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("load entitlement", e))?;

        match row {
            Some(row) => UserEntitlement::try_from(row),
            None => Ok(UserEntitlement::empty(user_id.clone())),
        }
    }

    async fn commit(
        &self,
        order_no: &OrderNo,
        action: EntitlementAction,
        expected_version: i64,
        updated: &UserEntitlement,
    ) -> Result<CommitResult, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| database_error("start entitlement transaction", e))?;

        // Claim the ledger entry first; a concurrent claim blocks here until
        // the other transaction finishes.
        let claimed = sqlx::query(
            r#"
            INSERT INTO entitlement_grants (order_no, action, user_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (order_no, action) DO NOTHING
            "#,
        )
        .bind(order_no.as_str())
        .bind(action.as_str())
        .bind(updated.user_id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| database_error("claim entitlement grant", e))?;
        if claimed.rows_affected() == 0 {
            return Ok(CommitResult::AlreadyApplied);
        }

        let written = if expected_version == 0 {
            sqlx::query(
                r#"
                INSERT INTO user_entitlements (
                    user_id, vip_expires_at, is_lifetime, lifetime_order_no, activated_at,
                    version, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6 + 1, NOW())
                ON CONFLICT (user_id) DO NOTHING
                "#,
            )
        } else {
            sqlx::query(
                r#"
                UPDATE user_entitlements SET
                    vip_expires_at = $2,
                    is_lifetime = $3,
                    lifetime_order_no = $4,
                    activated_at = $5,
                    version = version + 1,
                    updated_at = NOW()
                WHERE user_id = $1 AND version = $6
                "#,
            )
        }
        .bind(updated.user_id.as_str())
        .bind(updated.vip_expires_at.as_ref().map(|t| *t.as_datetime()))
        .bind(updated.is_lifetime)
        .bind(updated.lifetime_order_no.as_ref().map(|o| o.as_str()))
        .bind(updated.activated_at.as_ref().map(|t| *t.as_datetime()))
        .bind(expected_version)
        .execute(&mut *tx)
        .await
        .map_err(|e| database_error("write entitlement", e))?;

        if written.rows_affected() == 0 {
            // Rolls back the ledger claim as well
            return Ok(CommitResult::VersionConflict);
        }

        tx.commit()
            .await
            .map_err(|e| database_error("commit entitlement", e))?;

        Ok(CommitResult::Committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_converts_to_entitlement() {
        let row = EntitlementRow {
            user_id: "user-1".to_string(),
            vip_expires_at: None,
            is_lifetime: true,
            lifetime_order_no: Some("VIP-0009".to_string()),
            activated_at: Some(Utc::now()),
            version: 4,
        };

        let entitlement = UserEntitlement::try_from(row).unwrap();

        assert!(entitlement.is_lifetime);
        assert_eq!(entitlement.lifetime_order_no.unwrap().as_str(), "VIP-0009");
        assert_eq!(entitlement.version, 4);
    }
}
