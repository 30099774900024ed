//! Background tasks.

mod reconciliation_scheduler;

pub use reconciliation_scheduler::{ReconciliationScheduler, SchedulerConfig};
