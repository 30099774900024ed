//! Account standing ports - facts the security gate needs about a user,
//! and the operator switch that locks a user's payments.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::security::AccountStanding;

#[async_trait]
pub trait AccountStandingReader: Send + Sync {
    /// Returns the standing of a user. Unknown users report `exists: false`.
    async fn standing(&self, user_id: &UserId) -> Result<AccountStanding, DomainError>;
}

/// Lock state an account held before it was changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentLockState {
    pub locked: bool,
    pub reason: Option<String>,
}

#[async_trait]
pub trait PaymentLockWriter: Send + Sync {
    /// Locks payments with `Some(reason)` or unlocks them with `None`.
    ///
    /// Returns the state that was replaced, or `None` when the account does
    /// not exist.
    async fn set_payment_lock(
        &self,
        user_id: &UserId,
        reason: Option<&str>,
    ) -> Result<Option<PaymentLockState>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_standing_reader_is_object_safe() {
        fn _accepts_dyn(_reader: &dyn AccountStandingReader) {}
    }

    #[test]
    fn payment_lock_writer_is_object_safe() {
        fn _accepts_dyn(_writer: &dyn PaymentLockWriter) {}
    }
}
