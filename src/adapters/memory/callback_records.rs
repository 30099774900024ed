//! In-memory callback record log for testing.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::domain::foundation::{DomainError, OrderNo, TransactionId};
use crate::domain::payment::{CallbackOutcome, CallbackRecord};
use crate::ports::{CallbackRecordRepository, SaveResult};

/// Append-only list of callback records.
///
/// Mirrors the partial unique index on successful records.
#[derive(Default)]
pub struct InMemoryCallbackRecords {
    records: Mutex<Vec<CallbackRecord>>,
}

impl InMemoryCallbackRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored records (for test assertions).
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn all(&self) -> Vec<CallbackRecord> {
        self.records
            .lock()
            .expect("InMemoryCallbackRecords: lock poisoned")
            .clone()
    }

    pub fn count_with_outcome(&self, outcome: CallbackOutcome) -> usize {
        self.all().iter().filter(|r| r.outcome == outcome).count()
    }
}

#[async_trait]
impl CallbackRecordRepository for InMemoryCallbackRecords {
    async fn find_successful(
        &self,
        order_no: &OrderNo,
        transaction_id: &TransactionId,
    ) -> Result<Option<CallbackRecord>, DomainError> {
        let records = self
            .records
            .lock()
            .expect("InMemoryCallbackRecords: lock poisoned");
        Ok(records
            .iter()
            .find(|r| {
                r.outcome == CallbackOutcome::Success
                    && &r.order_no == order_no
                    && r.transaction_id.as_ref() == Some(transaction_id)
            })
            .cloned())
    }

    async fn save(&self, record: CallbackRecord) -> Result<SaveResult, DomainError> {
        let mut records = self
            .records
            .lock()
            .expect("InMemoryCallbackRecords: lock poisoned");
        if record.outcome == CallbackOutcome::Success
            && records.iter().any(|r| {
                r.outcome == CallbackOutcome::Success
                    && r.order_no == record.order_no
                    && r.transaction_id == record.transaction_id
            })
        {
            return Ok(SaveResult::AlreadyExists);
        }
        records.push(record);
        Ok(SaveResult::Inserted)
    }

    async fn list_for_order(&self, order_no: &OrderNo) -> Result<Vec<CallbackRecord>, DomainError> {
        Ok(self
            .all()
            .into_iter()
            .filter(|r| &r.order_no == order_no)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use crate::domain::order::Provider;
    use crate::domain::payment::{NormalizedCallback, NormalizedStatus};

    fn callback(tx: &str) -> NormalizedCallback {
        NormalizedCallback {
            provider: Provider::WalletB,
            order_no: OrderNo::new("VIP-1").unwrap(),
            transaction_id: Some(TransactionId::new(tx).unwrap()),
            status: NormalizedStatus::Paid,
            amount: Some(100),
            paid_at: None,
            raw: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn second_success_for_same_transaction_already_exists() {
        let repo = InMemoryCallbackRecords::new();
        let now = Timestamp::now();
        assert_eq!(
            repo.save(CallbackRecord::success(&callback("t1"), now)).await.unwrap(),
            SaveResult::Inserted
        );
        assert_eq!(
            repo.save(CallbackRecord::success(&callback("t1"), now)).await.unwrap(),
            SaveResult::AlreadyExists
        );
    }

    #[tokio::test]
    async fn duplicate_and_failed_records_always_insert() {
        let repo = InMemoryCallbackRecords::new();
        let now = Timestamp::now();
        repo.save(CallbackRecord::success(&callback("t1"), now)).await.unwrap();
        repo.save(CallbackRecord::duplicate(&callback("t1"), now)).await.unwrap();
        repo.save(CallbackRecord::failed(&callback("t1"), "boom", now)).await.unwrap();

        let order_no = OrderNo::new("VIP-1").unwrap();
        assert_eq!(repo.list_for_order(&order_no).await.unwrap().len(), 3);
        assert!(repo
            .find_successful(&order_no, &TransactionId::new("t1").unwrap())
            .await
            .unwrap()
            .is_some());
    }
}
