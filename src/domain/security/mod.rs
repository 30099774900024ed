//! Security module - purchase pre-checks.

mod gate;

pub use gate::{
    AccountStanding, GateDecision, GateStage, Remediation, RejectionReason, SecurityGate,
    SecurityPolicy,
};
