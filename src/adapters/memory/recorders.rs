//! Recording notifier and audit log for testing.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::ports::{
    AuditEvent, AuditEventType, AuditLog, NotificationDispatcher, OrderNotification,
};

/// Captures notifications; can be switched to fail every dispatch.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<OrderNotification>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn sent(&self) -> Vec<OrderNotification> {
        self.sent
            .lock()
            .expect("RecordingNotifier: lock poisoned")
            .clone()
    }

    pub fn count_of(&self, kind: &str) -> usize {
        self.sent().iter().filter(|n| n.kind() == kind).count()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingNotifier {
    async fn dispatch(&self, notification: OrderNotification) -> Result<(), DomainError> {
        if self.fail {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                "Simulated notification failure",
            ));
        }
        self.sent
            .lock()
            .expect("RecordingNotifier: lock poisoned")
            .push(notification);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .expect("RecordingAuditLog: lock poisoned")
            .clone()
    }

    pub fn events_of_type(&self, event_type: AuditEventType) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}

#[async_trait]
impl AuditLog for RecordingAuditLog {
    async fn record(&self, event: AuditEvent) -> Result<(), DomainError> {
        self.events
            .lock()
            .expect("RecordingAuditLog: lock poisoned")
            .push(event);
        Ok(())
    }

    async fn list_since(
        &self,
        event_type: AuditEventType,
        since: Timestamp,
    ) -> Result<Vec<AuditEvent>, DomainError> {
        Ok(self
            .events()
            .into_iter()
            .filter(|e| e.event_type == event_type && !e.occurred_at.is_before(&since))
            .collect())
    }
}
