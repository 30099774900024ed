//! User VIP entitlement and the arithmetic that changes it.
//!
//! Expiry is only ever extended or reduced relative to its current value,
//! so stacked renewals survive a refund of one of them.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{OrderNo, Timestamp, UserId, ValidationError};

use super::PackageDuration;

/// What an order does to an entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementAction {
    Activate,
    Revoke,
}

impl EntitlementAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitlementAction::Activate => "activate",
            EntitlementAction::Revoke => "revoke",
        }
    }
}

/// A user's current VIP entitlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntitlement {
    pub user_id: UserId,
    pub vip_expires_at: Option<Timestamp>,
    pub is_lifetime: bool,

    /// Order that granted lifetime status, if any.
    pub lifetime_order_no: Option<OrderNo>,

    pub activated_at: Option<Timestamp>,

    /// Optimistic concurrency token; bumped on every committed change.
    pub version: i64,
}

impl UserEntitlement {
    /// Entitlement of a user who never had VIP.
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            vip_expires_at: None,
            is_lifetime: false,
            lifetime_order_no: None,
            activated_at: None,
            version: 0,
        }
    }

    /// Entitlement after `order_no` granting `duration` is paid at `now`.
    ///
    /// Days stack on the later of `now` and the current expiry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` on `duration_days` when the new expiry would
    /// not be a representable instant.
    pub fn activated(
        &self,
        duration: PackageDuration,
        order_no: &OrderNo,
        now: Timestamp,
    ) -> Result<Self, ValidationError> {
        let mut next = self.clone();
        match duration {
            PackageDuration::Days(days) => {
                let base = self.vip_expires_at.map_or(now, |current| current.max(now));
                let expires_at = base.checked_add_days(i64::from(days)).ok_or_else(|| {
                    ValidationError::invalid_format(
                        "duration_days",
                        format!("{} days overflows the VIP expiry", days),
                    )
                })?;
                next.vip_expires_at = Some(expires_at);
            }
            PackageDuration::Lifetime => {
                next.is_lifetime = true;
                next.lifetime_order_no = Some(order_no.clone());
            }
        }
        next.activated_at = Some(self.activated_at.unwrap_or(now));
        Ok(next)
    }

    /// Entitlement after `order_no` granting `duration` is refunded at `now`.
    ///
    /// Days are subtracted from the current expiry; a result at or before
    /// `now` clears VIP. Lifetime is removed only when `order_no` granted it.
    pub fn revoked(&self, duration: PackageDuration, order_no: &OrderNo, now: Timestamp) -> Self {
        let mut next = self.clone();
        match duration {
            PackageDuration::Days(days) => {
                // Out of range can only mean far in the past.
                next.vip_expires_at = self
                    .vip_expires_at
                    .and_then(|current| current.checked_minus_days(i64::from(days)))
                    .filter(|reduced| reduced.is_after(&now));
            }
            PackageDuration::Lifetime => {
                if self.lifetime_order_no.as_ref() == Some(order_no) {
                    next.is_lifetime = false;
                    next.lifetime_order_no = None;
                }
            }
        }
        next
    }

    /// VIP status at `now`, with `grace_days` of grace after expiry.
    pub fn status(&self, now: Timestamp, grace_days: i64) -> VipStatus {
        if self.is_lifetime {
            return VipStatus::Lifetime;
        }
        match self.vip_expires_at {
            Some(expires_at) if now.is_before(&expires_at) => {
                let remaining = expires_at.duration_since(&now);
                let days = (remaining.num_seconds() + 86_399) / 86_400;
                VipStatus::Active {
                    days_remaining: days,
                }
            }
            Some(expires_at) if now.is_before(&expires_at.add_days(grace_days)) => {
                VipStatus::GracePeriod
            }
            _ => VipStatus::None,
        }
    }
}

/// Display-level VIP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VipStatus {
    None,
    Active { days_remaining: i64 },
    Lifetime,
    GracePeriod,
}

impl VipStatus {
    pub fn is_vip(&self) -> bool {
        matches!(self, VipStatus::Active { .. } | VipStatus::Lifetime)
    }
}
