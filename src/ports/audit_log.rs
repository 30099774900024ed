//! Security and reconciliation audit trail.

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, OrderNo, Timestamp, UserId, ValidationError};

/// Kind of audited event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// A notification failed signature verification.
    CallbackSignatureRejected,

    /// Provider evidence contradicted a stored order.
    ConflictingEvidence,

    /// The security gate refused a purchase step.
    SecurityRejection,

    /// Summary of one reconciliation pass.
    ReconciliationRun,

    /// A reconciliation order exhausted its retries.
    ReconciliationExhausted,

    RefundRequested,
    RefundProcessed,

    /// Membership could not be granted for a paid order.
    EntitlementFailure,

    /// An operator locked a user's payments.
    PaymentLocked,
    PaymentUnlocked,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::CallbackSignatureRejected => "callback_signature_rejected",
            AuditEventType::ConflictingEvidence => "conflicting_evidence",
            AuditEventType::SecurityRejection => "security_rejection",
            AuditEventType::ReconciliationRun => "reconciliation_run",
            AuditEventType::ReconciliationExhausted => "reconciliation_exhausted",
            AuditEventType::RefundRequested => "refund_requested",
            AuditEventType::RefundProcessed => "refund_processed",
            AuditEventType::EntitlementFailure => "entitlement_failure",
            AuditEventType::PaymentLocked => "payment_locked",
            AuditEventType::PaymentUnlocked => "payment_unlocked",
        }
    }
}

impl FromStr for AuditEventType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "callback_signature_rejected" => Ok(AuditEventType::CallbackSignatureRejected),
            "conflicting_evidence" => Ok(AuditEventType::ConflictingEvidence),
            "security_rejection" => Ok(AuditEventType::SecurityRejection),
            "reconciliation_run" => Ok(AuditEventType::ReconciliationRun),
            "reconciliation_exhausted" => Ok(AuditEventType::ReconciliationExhausted),
            "refund_requested" => Ok(AuditEventType::RefundRequested),
            "refund_processed" => Ok(AuditEventType::RefundProcessed),
            "entitlement_failure" => Ok(AuditEventType::EntitlementFailure),
            "payment_locked" => Ok(AuditEventType::PaymentLocked),
            "payment_unlocked" => Ok(AuditEventType::PaymentUnlocked),
            other => Err(ValidationError::invalid_format(
                "event_type",
                format!("unknown audit event '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl FromStr for RiskLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(ValidationError::invalid_format(
                "risk_level",
                format!("unknown risk level '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    pub risk_level: RiskLevel,
    pub user_id: Option<UserId>,
    pub order_no: Option<OrderNo>,
    pub data: serde_json::Value,
    pub occurred_at: Timestamp,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, risk_level: RiskLevel, data: serde_json::Value) -> Self {
        Self {
            event_type,
            risk_level,
            user_id: None,
            order_no: None,
            data,
            occurred_at: Timestamp::now(),
        }
    }

    pub fn for_order(mut self, order_no: &OrderNo) -> Self {
        self.order_no = Some(order_no.clone());
        self
    }

    pub fn for_user(mut self, user_id: &UserId) -> Self {
        self.user_id = Some(user_id.clone());
        self
    }
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<(), DomainError>;

    /// Events of one type that occurred at or after `since`, oldest first.
    async fn list_since(
        &self,
        event_type: AuditEventType,
        since: Timestamp,
    ) -> Result<Vec<AuditEvent>, DomainError>;
}
