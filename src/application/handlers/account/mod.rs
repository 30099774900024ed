//! Account handlers.
//!
//! Operator commands that lock and unlock a user's payments. A locked
//! account is refused by the security gate at order creation and payment
//! initiation.

mod lock_payment;
mod unlock_payment;

pub use lock_payment::{LockPaymentCommand, LockPaymentHandler, PaymentLockResult};
pub use unlock_payment::{UnlockPaymentCommand, UnlockPaymentHandler};
