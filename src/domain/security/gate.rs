//! Security gate for order creation and payment initiation.
//!
//! Evaluation is pure: callers gather the account context and unpaid-order
//! count, the gate only decides.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Thresholds the gate enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityPolicy {
    /// Orders at or above this amount (minor units) need step-up auth.
    pub step_up_threshold_cents: i64,

    /// Maximum unpaid orders a user may open in the trailing hour.
    pub max_unpaid_orders_per_hour: u32,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            step_up_threshold_cents: 20_000,
            max_unpaid_orders_per_hour: 5,
        }
    }
}

impl SecurityPolicy {
    pub fn requires_step_up(&self, amount: i64) -> bool {
        amount >= self.step_up_threshold_cents
    }
}

/// Account facts read from the account system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountStanding {
    pub exists: bool,
    pub active: bool,
    pub payment_locked: bool,
}

impl AccountStanding {
    pub fn good() -> Self {
        Self {
            exists: true,
            active: true,
            payment_locked: false,
        }
    }
}

/// Stage of the purchase flow being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStage {
    /// Opening a new order.
    OrderCreation { unpaid_orders_last_hour: u32 },

    /// Opening a payment intent for an existing order.
    PaymentInitiation { amount: i64, step_up_verified: bool },
}

/// Why the gate refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    AccountLocked,
    TooManyUnpaidOrders,
    StepUpRequired,
}

/// What the caller should tell the user to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Remediation {
    ContactSupport,
    Wait,
    Verify,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::AccountLocked => "account_locked",
            RejectionReason::TooManyUnpaidOrders => "too_many_unpaid_orders",
            RejectionReason::StepUpRequired => "step_up_required",
        }
    }

    pub fn remediation(&self) -> Remediation {
        match self {
            RejectionReason::AccountLocked => Remediation::ContactSupport,
            RejectionReason::TooManyUnpaidOrders => Remediation::Wait,
            RejectionReason::StepUpRequired => Remediation::Verify,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            RejectionReason::AccountLocked => "Payments are restricted for this account",
            RejectionReason::TooManyUnpaidOrders => {
                "Too many unpaid orders; complete or cancel existing orders first"
            }
            RejectionReason::StepUpRequired => "This order requires additional verification",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    Rejected(RejectionReason),
}

/// Stateless evaluator bound to a policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityGate {
    policy: SecurityPolicy,
}

impl SecurityGate {
    pub fn new(policy: SecurityPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    pub fn evaluate(&self, account: &AccountStanding, stage: GateStage) -> GateDecision {
        if !account.exists || !account.active || account.payment_locked {
            return GateDecision::Rejected(RejectionReason::AccountLocked);
        }

        match stage {
            GateStage::OrderCreation {
                unpaid_orders_last_hour,
            } => {
                if unpaid_orders_last_hour >= self.policy.max_unpaid_orders_per_hour {
                    return GateDecision::Rejected(RejectionReason::TooManyUnpaidOrders);
                }
            }
            GateStage::PaymentInitiation {
                amount,
                step_up_verified,
            } => {
                if self.policy.requires_step_up(amount) && !step_up_verified {
                    return GateDecision::Rejected(RejectionReason::StepUpRequired);
                }
            }
        }

        GateDecision::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> SecurityGate {
        SecurityGate::new(SecurityPolicy::default())
    }

    fn creation(unpaid: u32) -> GateStage {
        GateStage::OrderCreation {
            unpaid_orders_last_hour: unpaid,
        }
    }

    #[test]
    fn good_account_under_limit_is_allowed() {
        assert_eq!(gate().evaluate(&AccountStanding::good(), creation(4)), GateDecision::Allowed);
    }

    #[test]
    fn locked_account_is_rejected_first() {
        let account = AccountStanding {
            payment_locked: true,
            ..AccountStanding::good()
        };
        assert_eq!(
            gate().evaluate(&account, creation(0)),
            GateDecision::Rejected(RejectionReason::AccountLocked)
        );
    }

    #[test]
    fn missing_or_inactive_account_counts_as_locked() {
        assert_eq!(
            gate().evaluate(&AccountStanding::default(), creation(0)),
            GateDecision::Rejected(RejectionReason::AccountLocked)
        );
        let inactive = AccountStanding {
            active: false,
            ..AccountStanding::good()
        };
        assert_eq!(
            gate().evaluate(&inactive, creation(0)),
            GateDecision::Rejected(RejectionReason::AccountLocked)
        );
    }

    #[test]
    fn reaching_unpaid_limit_is_rejected() {
        assert_eq!(
            gate().evaluate(&AccountStanding::good(), creation(5)),
            GateDecision::Rejected(RejectionReason::TooManyUnpaidOrders)
        );
    }

    #[test]
    fn high_value_payment_needs_step_up() {
        let stage = GateStage::PaymentInitiation {
            amount: 20_000,
            step_up_verified: false,
        };
        assert_eq!(
            gate().evaluate(&AccountStanding::good(), stage),
            GateDecision::Rejected(RejectionReason::StepUpRequired)
        );
    }

    #[test]
    fn verified_high_value_payment_is_allowed() {
        let stage = GateStage::PaymentInitiation {
            amount: 50_000,
            step_up_verified: true,
        };
        assert_eq!(gate().evaluate(&AccountStanding::good(), stage), GateDecision::Allowed);
    }

    #[test]
    fn low_value_payment_skips_step_up() {
        let stage = GateStage::PaymentInitiation {
            amount: 7_900,
            step_up_verified: false,
        };
        assert_eq!(gate().evaluate(&AccountStanding::good(), stage), GateDecision::Allowed);
    }

    #[test]
    fn each_reason_has_a_remediation() {
        assert_eq!(RejectionReason::AccountLocked.remediation(), Remediation::ContactSupport);
        assert_eq!(RejectionReason::TooManyUnpaidOrders.remediation(), Remediation::Wait);
        assert_eq!(RejectionReason::StepUpRequired.remediation(), Remediation::Verify);
    }
}
