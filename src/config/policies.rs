//! Order, security and reconciliation tunables

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::{OrderPolicy, ReconciliationPolicy};
use crate::domain::reconciliation::RetryPolicy;
use crate::domain::security::SecurityPolicy;

/// Order lifecycle windows
#[derive(Debug, Clone, Deserialize)]
pub struct OrdersConfig {
    #[serde(default = "default_order_timeout")]
    pub timeout_minutes: i64,

    #[serde(default = "default_refund_valid_days")]
    pub refund_valid_days: i64,

    #[serde(default = "default_vip_grace_days")]
    pub vip_grace_days: i64,
}

impl OrdersConfig {
    pub fn policy(&self) -> OrderPolicy {
        OrderPolicy {
            order_timeout_minutes: self.timeout_minutes,
            refund_valid_days: self.refund_valid_days,
            vip_grace_days: self.vip_grace_days,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        positive("orders.timeout_minutes", self.timeout_minutes)?;
        positive("orders.refund_valid_days", self.refund_valid_days)?;
        if self.vip_grace_days < 0 {
            return Err(ValidationError::NotPositive {
                field: "orders.vip_grace_days",
            });
        }
        Ok(())
    }
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: default_order_timeout(),
            refund_valid_days: default_refund_valid_days(),
            vip_grace_days: default_vip_grace_days(),
        }
    }
}

/// Purchase pre-check limits
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Amount in minor units at which an order needs step-up verification
    #[serde(default = "default_step_up_threshold")]
    pub step_up_threshold_cents: i64,

    #[serde(default = "default_max_unpaid_per_hour")]
    pub max_unpaid_orders_per_hour: u32,
}

impl SecurityConfig {
    pub fn policy(&self) -> SecurityPolicy {
        SecurityPolicy {
            step_up_threshold_cents: self.step_up_threshold_cents,
            max_unpaid_orders_per_hour: self.max_unpaid_orders_per_hour,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        positive("security.step_up_threshold_cents", self.step_up_threshold_cents)?;
        positive(
            "security.max_unpaid_orders_per_hour",
            i64::from(self.max_unpaid_orders_per_hour),
        )
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            step_up_threshold_cents: default_step_up_threshold(),
            max_unpaid_orders_per_hour: default_max_unpaid_per_hour(),
        }
    }
}

/// Background reconciliation settings
#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Seconds between pass starts
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_grace_minutes")]
    pub grace_minutes: i64,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_backoff")]
    pub base_backoff_secs: i64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: i64,
}

impl ReconciliationConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn policy(&self) -> ReconciliationPolicy {
        ReconciliationPolicy {
            grace_minutes: self.grace_minutes,
            batch_size: self.batch_size,
            retry: RetryPolicy {
                max_retries: self.max_retries,
                base_backoff_secs: self.base_backoff_secs,
                max_backoff_secs: self.max_backoff_secs,
            },
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        positive("reconciliation.interval_secs", self.interval_secs as i64)?;
        positive("reconciliation.batch_size", i64::from(self.batch_size))?;
        positive("reconciliation.max_retries", i64::from(self.max_retries))?;
        positive("reconciliation.base_backoff_secs", self.base_backoff_secs)?;
        if self.grace_minutes < 0 {
            return Err(ValidationError::NotPositive {
                field: "reconciliation.grace_minutes",
            });
        }
        if self.max_backoff_secs < self.base_backoff_secs {
            return Err(ValidationError::InvalidBackoff);
        }
        Ok(())
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval(),
            grace_minutes: default_grace_minutes(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            base_backoff_secs: default_base_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

fn positive(field: &'static str, value: i64) -> Result<(), ValidationError> {
    if value <= 0 {
        return Err(ValidationError::NotPositive { field });
    }
    Ok(())
}

fn default_order_timeout() -> i64 {
    OrderPolicy::default().order_timeout_minutes
}

fn default_refund_valid_days() -> i64 {
    OrderPolicy::default().refund_valid_days
}

fn default_vip_grace_days() -> i64 {
    OrderPolicy::default().vip_grace_days
}

fn default_step_up_threshold() -> i64 {
    SecurityPolicy::default().step_up_threshold_cents
}

fn default_max_unpaid_per_hour() -> u32 {
    SecurityPolicy::default().max_unpaid_orders_per_hour
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> u64 {
    300
}

fn default_grace_minutes() -> i64 {
    ReconciliationPolicy::default().grace_minutes
}

fn default_batch_size() -> u32 {
    ReconciliationPolicy::default().batch_size
}

fn default_max_retries() -> u32 {
    RetryPolicy::default().max_retries
}

fn default_base_backoff() -> i64 {
    RetryPolicy::default().base_backoff_secs
}

fn default_max_backoff() -> i64 {
    RetryPolicy::default().max_backoff_secs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_application_policies() {
        assert_eq!(OrdersConfig::default().policy(), OrderPolicy::default());
        assert_eq!(SecurityConfig::default().policy(), SecurityPolicy::default());
        assert_eq!(
            ReconciliationConfig::default().policy(),
            ReconciliationPolicy::default()
        );
        assert_eq!(
            ReconciliationConfig::default().interval(),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = OrdersConfig {
            timeout_minutes: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::NotPositive {
                field: "orders.timeout_minutes"
            })
        );
    }

    #[test]
    fn backoff_ceiling_below_base_is_rejected() {
        let config = ReconciliationConfig {
            base_backoff_secs: 120,
            max_backoff_secs: 60,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidBackoff));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = ReconciliationConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
