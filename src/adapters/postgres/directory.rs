//! PostgreSQL readers for the package catalog and account standing.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::entitlement::{Package, PackageDuration};
use crate::domain::foundation::{DomainError, ErrorCode, PackageId, UserId};
use crate::domain::security::AccountStanding;
use crate::ports::{AccountStandingReader, PackageCatalog, PaymentLockState, PaymentLockWriter};

use super::database_error;

/// Catalog backed by the `vip_packages` table.
pub struct PostgresPackageCatalog {
    pool: PgPool,
}

impl PostgresPackageCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PackageRow {
    id: String,
    code: String,
    name: String,
    price_cents: i64,
    duration_days: i32,
    active: bool,
}

impl TryFrom<PackageRow> for Package {
    type Error = DomainError;

    fn try_from(row: PackageRow) -> Result<Self, Self::Error> {
        Ok(Package {
            id: PackageId::new(row.id).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid package id: {}", e))
            })?,
            duration: PackageDuration::from_catalog(row.duration_days, &row.code),
            code: row.code,
            name: row.name,
            price_cents: row.price_cents,
            active: row.active,
        })
    }
}

#[async_trait]
impl PackageCatalog for PostgresPackageCatalog {
    async fn find(&self, id: &PackageId) -> Result<Option<Package>, DomainError> {
        let row: Option<PackageRow> = sqlx::query_as(
            r#"
            SELECT id, code, name, price_cents, duration_days, active
            FROM vip_packages
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("find package", e))?;

        row.map(Package::try_from).transpose()
    }
}

/// Account standing backed by the `payment_accounts` table.
///
/// Users without a row are reported as non-existent and therefore refused
/// by the security gate.
pub struct PostgresAccountDirectory {
    pool: PgPool,
}

impl PostgresAccountDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStandingReader for PostgresAccountDirectory {
    async fn standing(&self, user_id: &UserId) -> Result<AccountStanding, DomainError> {
        let row: Option<(bool, bool)> = sqlx::query_as(
            "SELECT active, payment_locked FROM payment_accounts WHERE user_id = $1",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("read account standing", e))?;

        Ok(match row {
            Some((active, payment_locked)) => AccountStanding {
                exists: true,
                active,
                payment_locked,
            },
            None => AccountStanding::default(),
        })
    }
}

#[async_trait]
impl PaymentLockWriter for PostgresAccountDirectory {
    async fn set_payment_lock(
        &self,
        user_id: &UserId,
        reason: Option<&str>,
    ) -> Result<Option<PaymentLockState>, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| database_error("start transaction", e))?;

        let row: Option<(bool, Option<String>)> = sqlx::query_as(
            "SELECT payment_locked, lock_reason FROM payment_accounts WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| database_error("lock account", e))?;

        let Some((locked, previous_reason)) = row else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE payment_accounts
            SET payment_locked = $2, lock_reason = $3, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .bind(reason.is_some())
        .bind(reason)
        .execute(&mut *tx)
        .await
        .map_err(|e| database_error("update payment lock", e))?;

        tx.commit()
            .await
            .map_err(|e| database_error("commit payment lock", e))?;

        Ok(Some(PaymentLockState {
            locked,
            reason: previous_reason,
        }))
    }
}
