//! Callback record repository - durable log of provider notifications.
//!
//! Every verified notification is stored. At most one `success` record may
//! exist per `(order_no, transaction_id)`; storage should enforce this with a
//! unique constraint so that concurrent deliveries race safely.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, OrderNo, TransactionId};
use crate::domain::payment::CallbackRecord;

/// Result of attempting to save a callback record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    Inserted,

    /// A success record for the same order and transaction already exists.
    AlreadyExists,
}

#[async_trait]
pub trait CallbackRecordRepository: Send + Sync {
    /// Finds the success record for an order and transaction, if any.
    async fn find_successful(
        &self,
        order_no: &OrderNo,
        transaction_id: &TransactionId,
    ) -> Result<Option<CallbackRecord>, DomainError>;

    /// Saves a record. Non-success records are always inserted.
    async fn save(&self, record: CallbackRecord) -> Result<SaveResult, DomainError>;

    /// All records for an order, oldest first.
    async fn list_for_order(&self, order_no: &OrderNo) -> Result<Vec<CallbackRecord>, DomainError>;
}
