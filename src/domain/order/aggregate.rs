//! Order aggregate.
//!
//! An order is one purchase attempt of one VIP package by one user. Orders
//! are created `Pending` and only change through the transition planner in
//! [`super::transition`]; they are never deleted.
//!
//! # Design Decisions
//!
//! - **Money in cents**: `amount` is an `i64` in minor currency units
//! - **Explicit channel**: the provider is derived from [`PaymentChannel`],
//!   never from free text
//! - **Write-once transaction id**: set when the order becomes `Paid`

use crate::domain::foundation::{
    OrderId, OrderNo, PackageId, Timestamp, TransactionId, UserId, ValidationError,
};
use serde::{Deserialize, Serialize};

use super::{DeviceType, OrderState, PaymentChannel, Provider, RefundState};

/// Client context captured when the order is placed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    #[serde(default)]
    pub device_type: DeviceType,
}

/// Order aggregate.
///
/// # Invariants
///
/// - `order_no` is immutable and unique
/// - `amount` is positive and immutable
/// - `transaction_id` is set at most once
/// - `expires_at > created_at`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_no: OrderNo,
    pub user_id: UserId,
    pub package_id: PackageId,

    /// Amount in minor currency units.
    pub amount: i64,

    pub channel: PaymentChannel,
    pub state: OrderState,
    pub refund_state: RefundState,

    /// Provider transaction id, present once paid.
    pub transaction_id: Option<TransactionId>,

    /// Whether the amount crossed the step-up threshold at creation.
    pub step_up_required: bool,
    pub step_up_verified: bool,

    pub device: DeviceContext,

    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub paid_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    pub cancel_reason: Option<String>,
    pub refund_reason: Option<String>,
    pub refund_requested_at: Option<Timestamp>,
    pub refunded_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

/// Everything needed to open a new order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_no: OrderNo,
    pub user_id: UserId,
    pub package_id: PackageId,
    pub amount: i64,
    pub channel: PaymentChannel,
    pub step_up_required: bool,
    pub device: DeviceContext,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl Order {
    /// Opens a new pending order.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the amount is not positive or the expiry
    /// is not after the creation time.
    pub fn create(new: NewOrder) -> Result<Self, ValidationError> {
        if new.amount <= 0 {
            return Err(ValidationError::out_of_range("amount", 1, i64::MAX, new.amount));
        }
        if !new.expires_at.is_after(&new.created_at) {
            return Err(ValidationError::invalid_format(
                "expires_at",
                "must be after created_at",
            ));
        }

        Ok(Self {
            id: OrderId::new(),
            order_no: new.order_no,
            user_id: new.user_id,
            package_id: new.package_id,
            amount: new.amount,
            channel: new.channel,
            state: OrderState::Pending,
            refund_state: RefundState::None,
            transaction_id: None,
            step_up_required: new.step_up_required,
            step_up_verified: false,
            device: new.device,
            created_at: new.created_at,
            expires_at: new.expires_at,
            paid_at: None,
            cancelled_at: None,
            cancel_reason: None,
            refund_reason: None,
            refund_requested_at: None,
            refunded_at: None,
            updated_at: new.created_at,
        })
    }

    pub fn provider(&self) -> Provider {
        self.channel.provider()
    }

    /// True once `now` has reached the expiry instant.
    pub fn is_expired(&self, now: &Timestamp) -> bool {
        !now.is_before(&self.expires_at)
    }

    /// True if the order still awaits payment and may be paid at `now`.
    pub fn is_payable(&self, now: &Timestamp) -> bool {
        self.state == OrderState::Pending && !self.is_expired(now)
    }

    /// True if step-up authentication still blocks payment initiation.
    pub fn needs_step_up(&self) -> bool {
        self.step_up_required && !self.step_up_verified
    }

    pub fn belongs_to(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    /// Checks refund preconditions at `now`.
    ///
    /// # Errors
    ///
    /// Returns the reason the refund is refused.
    pub fn check_refundable(
        &self,
        now: &Timestamp,
        lifetime_package: bool,
        refund_valid_days: i64,
    ) -> Result<(), String> {
        let retry_after_failure =
            self.state == OrderState::RefundFailed && self.refund_state == RefundState::Failed;
        if self.state != OrderState::Paid && !retry_after_failure {
            return Err(format!("order is {}", self.state));
        }
        if self.state == OrderState::Paid && self.refund_state != RefundState::None {
            return Err(format!("refund already {}", self.refund_state.as_str()));
        }
        if lifetime_package {
            return Err("lifetime packages are not refundable".to_string());
        }
        let paid_at = self
            .paid_at
            .ok_or_else(|| "order has no payment time".to_string())?;
        if now.is_after(&paid_at.add_days(refund_valid_days)) {
            return Err(format!(
                "refund window of {} days has passed",
                refund_valid_days
            ));
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::pending_order;
    use super::*;

    #[test]
    fn new_order_starts_pending_without_transaction() {
        let order = pending_order(Timestamp::now());
        assert_eq!(order.state, OrderState::Pending);
        assert_eq!(order.refund_state, RefundState::None);
        assert!(order.transaction_id.is_none());
        assert_eq!(order.provider(), Provider::WalletA);
    }

    #[test]
    fn create_rejects_non_positive_amount() {
        let now = Timestamp::now();
        let result = Order::create(NewOrder {
            order_no: OrderNo::new("VIP-0002").unwrap(),
            user_id: UserId::new("user-1").unwrap(),
            package_id: PackageId::new("monthly").unwrap(),
            amount: 0,
            channel: PaymentChannel::WalletBWeb,
            step_up_required: false,
            device: DeviceContext::default(),
            created_at: now,
            expires_at: now.plus_minutes(15),
        });
        assert!(matches!(result, Err(ValidationError::OutOfRange { .. })));
    }

    #[test]
    fn create_rejects_expiry_not_after_creation() {
        let now = Timestamp::now();
        let result = Order::create(NewOrder {
            order_no: OrderNo::new("VIP-0003").unwrap(),
            user_id: UserId::new("user-1").unwrap(),
            package_id: PackageId::new("monthly").unwrap(),
            amount: 100,
            channel: PaymentChannel::WalletBWeb,
            step_up_required: false,
            device: DeviceContext::default(),
            created_at: now,
            expires_at: now,
        });
        assert!(result.is_err());
    }

    #[test]
    fn order_expires_at_its_deadline() {
        let now = Timestamp::now();
        let order = pending_order(now);
        assert!(!order.is_expired(&now));
        assert!(order.is_expired(&now.plus_minutes(15)));
        assert!(!order.is_payable(&now.plus_minutes(16)));
    }

    #[test]
    fn step_up_blocks_until_verified() {
        let mut order = pending_order(Timestamp::now());
        order.step_up_required = true;
        assert!(order.needs_step_up());
        order.step_up_verified = true;
        assert!(!order.needs_step_up());
    }

    fn paid(now: Timestamp) -> Order {
        let mut order = pending_order(now);
        order.state = OrderState::Paid;
        order.paid_at = Some(now);
        order
    }

    #[test]
    fn paid_order_within_window_is_refundable() {
        let now = Timestamp::now();
        assert!(paid(now).check_refundable(&now.add_days(6), false, 7).is_ok());
    }

    #[test]
    fn refund_window_closes_after_valid_days() {
        let now = Timestamp::now();
        let err = paid(now)
            .check_refundable(&now.add_days(8), false, 7)
            .unwrap_err();
        assert!(err.contains("7 days"));
    }

    #[test]
    fn lifetime_and_pending_orders_are_not_refundable() {
        let now = Timestamp::now();
        assert!(paid(now).check_refundable(&now, true, 7).is_err());
        assert!(pending_order(now).check_refundable(&now, false, 7).is_err());
    }

    #[test]
    fn failed_refund_may_be_requested_again() {
        let now = Timestamp::now();
        let mut order = paid(now);
        order.state = OrderState::RefundFailed;
        order.refund_state = RefundState::Failed;
        assert!(order.check_refundable(&now, false, 7).is_ok());
    }
}
