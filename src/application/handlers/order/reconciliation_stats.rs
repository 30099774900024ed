//! GetReconciliationStatsHandler - Admin query over recent reconciliation runs.

use std::sync::Arc;

use crate::application::ReconciliationService;
use crate::domain::foundation::Timestamp;
use crate::domain::order::OrderError;
use crate::domain::reconciliation::{ReconciliationStats, DEFAULT_STATS_DAYS};

#[derive(Debug, Clone, Copy)]
pub struct GetReconciliationStatsQuery {
    pub days: u32,
}

impl Default for GetReconciliationStatsQuery {
    fn default() -> Self {
        Self {
            days: DEFAULT_STATS_DAYS,
        }
    }
}

pub struct GetReconciliationStatsHandler {
    service: Arc<ReconciliationService>,
}

impl GetReconciliationStatsHandler {
    pub fn new(service: Arc<ReconciliationService>) -> Self {
        Self { service }
    }

    pub async fn handle(
        &self,
        query: GetReconciliationStatsQuery,
    ) -> Result<ReconciliationStats, OrderError> {
        self.service.stats(query.days, Timestamp::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::Harness;
    use crate::application::ReconciliationPolicy;

    #[tokio::test]
    async fn default_window_is_one_week_of_runs() {
        let h = Harness::new();
        let service = Arc::new(ReconciliationService::new(
            h.settlement(),
            ReconciliationPolicy::default(),
        ));
        service.run_once(Timestamp::now()).await;

        let stats = GetReconciliationStatsHandler::new(service)
            .handle(GetReconciliationStatsQuery::default())
            .await
            .unwrap();

        assert_eq!(stats.days, 7);
        assert_eq!(stats.runs, 1);
    }
}
