//! ReconciliationService - brings pending orders in line with their providers.
//!
//! One pass does two things:
//!
//! 1. **Timeout sweep**: pending orders past their expiry are cancelled with
//!    reason `timeout`. Provider reachability is irrelevant here.
//! 2. **Drift correction**: pending orders older than the grace period are
//!    queried at their provider and settled, cancelled or left alone.
//!
//! Query failures feed a [`RetryTracker`] so a flaky provider is not hammered;
//! the tracker is a cache and losing it only loses backoff precision.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::Mutex;

use crate::domain::foundation::{OrderNo, Timestamp};
use crate::domain::order::{
    Order, OrderError, OrderState, TransitionEvidence, TransitionOutcome, TransitionSource,
};
use crate::domain::payment::{GatewayError, QueryOutcome};
use crate::domain::reconciliation::{
    ReconciliationReport, ReconciliationStats, RetryDecision, RetryTracker, SyncResult,
};
use crate::ports::{AuditEvent, AuditEventType, OrderCursor, RiskLevel};

use super::{PaymentSettlement, ReconciliationPolicy, SettlementOutcome};

/// Cancellation reason for orders that ran out of time.
pub const TIMEOUT_REASON: &str = "timeout";

/// Cancellation reason for orders the provider reports as closed.
pub const PROVIDER_CLOSED_REASON: &str = "provider closed";

/// What a provider check did to one order.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DriftAction {
    Synced,
    Cancelled,
    Unchanged { note: Option<String> },
}

pub struct ReconciliationService {
    settlement: Arc<PaymentSettlement>,
    policy: ReconciliationPolicy,
    tracker: Mutex<RetryTracker>,
}

impl ReconciliationService {
    pub fn new(settlement: Arc<PaymentSettlement>, policy: ReconciliationPolicy) -> Self {
        Self {
            settlement,
            policy,
            tracker: Mutex::new(RetryTracker::new(policy.retry)),
        }
    }

    pub fn policy(&self) -> &ReconciliationPolicy {
        &self.policy
    }

    /// Number of orders currently backing off.
    pub async fn pending_retries(&self) -> usize {
        self.tracker.lock().await.len()
    }

    /// Runs one full pass at `now`.
    pub async fn run_once(&self, now: Timestamp) -> ReconciliationReport {
        let mut report = ReconciliationReport::start(now);

        self.sweep_timeouts(now, &mut report).await;
        self.correct_drift(now, &mut report).await;

        let report = report.finish(Timestamp::now());
        tracing::info!(
            checked = report.checked,
            synced = report.synced,
            cancelled = report.cancelled,
            timed_out = report.timed_out,
            errored = report.errored,
            skipped = report.skipped,
            "Reconciliation pass finished"
        );

        let risk = if report.has_errors() {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };
        self.settlement
            .audit(AuditEvent::new(
                AuditEventType::ReconciliationRun,
                risk,
                json!({
                    "checked": report.checked,
                    "synced": report.synced,
                    "cancelled": report.cancelled,
                    "timed_out": report.timed_out,
                    "errored": report.errored,
                    "skipped": report.skipped,
                    "failed_orders": report
                        .failures
                        .iter()
                        .map(|f| f.order_no.as_str())
                        .collect::<Vec<_>>(),
                }),
            ))
            .await;

        report
    }

    /// Reconciles one order immediately, ignoring any backoff.
    ///
    /// Provider failures are reported in the result's `error` rather than
    /// as an `Err`, so an operator always sees the order's state.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown orders and store failures.
    pub async fn reconcile_order(&self, order_no: &OrderNo) -> Result<SyncResult, OrderError> {
        let now = Timestamp::now();
        let orders = self.settlement.orders();
        let order = orders
            .find_by_order_no(order_no)
            .await?
            .ok_or_else(|| OrderError::not_found(order_no.clone()))?;

        let previous = order.state;
        if previous != OrderState::Pending {
            return Ok(SyncResult::unchanged(order_no.clone(), previous));
        }

        let error = match self.check_provider(&order, now).await {
            Ok(DriftAction::Unchanged { note }) => {
                self.tracker.lock().await.record_success(order_no);
                if order.is_expired(&now) {
                    self.cancel_expired(&order, now).await?;
                }
                note
            }
            Ok(_) => {
                self.tracker.lock().await.record_success(order_no);
                None
            }
            Err(err) => {
                tracing::warn!(order_no = %order_no, error = %err, "Manual reconcile failed");
                Some(err.to_string())
            }
        };

        let current = orders
            .find_by_order_no(order_no)
            .await?
            .map_or(previous, |o| o.state);

        Ok(SyncResult {
            order_no: order_no.clone(),
            previous_state: previous,
            current_state: current,
            synced: current != previous,
            error,
        })
    }

    /// Totals of the runs recorded in the `days` before `now`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailed` for a window outside 1..=90 days and
    /// `Infrastructure` when the audit trail cannot be read.
    pub async fn stats(&self, days: u32, now: Timestamp) -> Result<ReconciliationStats, OrderError> {
        let days = ReconciliationStats::window(days)?;
        let runs = self
            .settlement
            .audit_log()
            .list_since(AuditEventType::ReconciliationRun, now.minus_days(days as i64))
            .await?;

        Ok(ReconciliationStats::from_runs(days, runs.iter().map(|e| &e.data)))
    }

    async fn sweep_timeouts(&self, now: Timestamp, report: &mut ReconciliationReport) {
        let mut cursor: Option<OrderCursor> = None;
        loop {
            let page = match self
                .settlement
                .orders()
                .list_expired_pending(now, cursor.as_ref(), self.policy.batch_size)
                .await
            {
                Ok(orders) => orders,
                Err(err) => {
                    tracing::error!(error = %err, "Failed to list expired orders");
                    report.errored += 1;
                    return;
                }
            };
            let Some(last) = page.last() else {
                return;
            };
            cursor = Some(OrderCursor::at(last));

            for order in page {
                match self.cancel_expired(&order, now).await {
                    Ok(true) => {
                        report.cancelled += 1;
                        report.timed_out += 1;
                    }
                    Ok(false) => {}
                    Err(err) => report.record_failure(&order.order_no, err.to_string(), 0),
                }
            }
        }
    }

    /// Returns true if this call cancelled the order.
    async fn cancel_expired(&self, order: &Order, now: Timestamp) -> Result<bool, OrderError> {
        match self
            .settlement
            .cancel(&order.order_no, TransitionSource::Timeout, TIMEOUT_REASON, now)
            .await
        {
            Ok(TransitionOutcome::Applied(_)) => {
                self.tracker.lock().await.record_success(&order.order_no);
                Ok(true)
            }
            Ok(_) => Ok(false),
            // Paid between listing and cancelling; the payment wins.
            Err(OrderError::AlreadyPaid(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn correct_drift(&self, now: Timestamp, report: &mut ReconciliationReport) {
        let created_before = now.minus_minutes(self.policy.grace_minutes);
        let mut seen: HashSet<OrderNo> = HashSet::new();
        let mut cursor: Option<OrderCursor> = None;

        loop {
            let page = match self
                .settlement
                .orders()
                .list_pending_for_reconciliation(
                    created_before,
                    now,
                    cursor.as_ref(),
                    self.policy.batch_size,
                )
                .await
            {
                Ok(orders) => orders,
                Err(err) => {
                    tracing::error!(error = %err, "Failed to list orders for reconciliation");
                    report.errored += 1;
                    // A partial listing says nothing about the rest; keep their backoff.
                    return;
                }
            };
            let Some(last) = page.last() else {
                break;
            };
            cursor = Some(OrderCursor::at(last));

            for order in page {
                seen.insert(order.order_no.clone());
                self.check_candidate(&order, now, report).await;
            }
        }

        self.tracker.lock().await.retain_only(&seen);
    }

    async fn check_candidate(&self, order: &Order, now: Timestamp, report: &mut ReconciliationReport) {
        if !self.tracker.lock().await.is_due(&order.order_no, now) {
            report.skipped += 1;
            return;
        }

        report.checked += 1;
        match self.check_provider(order, now).await {
            Ok(action) => {
                self.tracker.lock().await.record_success(&order.order_no);
                match action {
                    DriftAction::Synced => report.synced += 1,
                    DriftAction::Cancelled => report.cancelled += 1,
                    DriftAction::Unchanged { .. } => {}
                }
            }
            Err(err) => {
                let decision = self
                    .tracker
                    .lock()
                    .await
                    .record_failure(&order.order_no, now);
                self.on_failure(order, &err, decision, report).await;
            }
        }
    }

    async fn on_failure(
        &self,
        order: &Order,
        err: &OrderError,
        decision: RetryDecision,
        report: &mut ReconciliationReport,
    ) {
        match decision {
            RetryDecision::Scheduled {
                attempt,
                not_before,
            } => {
                tracing::warn!(
                    order_no = %order.order_no,
                    provider = %order.provider(),
                    attempt,
                    not_before = %not_before,
                    error = %err,
                    "Reconciliation check failed, will retry"
                );
                report.record_failure(&order.order_no, err.to_string(), attempt);
            }
            RetryDecision::Exhausted { attempts } => {
                tracing::error!(
                    order_no = %order.order_no,
                    provider = %order.provider(),
                    attempts,
                    error = %err,
                    "Reconciliation retries exhausted"
                );
                report.record_failure(&order.order_no, err.to_string(), attempts);
                self.settlement
                    .audit(
                        AuditEvent::new(
                            AuditEventType::ReconciliationExhausted,
                            RiskLevel::Medium,
                            json!({ "attempts": attempts, "error": err.to_string() }),
                        )
                        .for_order(&order.order_no)
                        .for_user(&order.user_id),
                    )
                    .await;
            }
        }
    }

    /// Queries the provider for `order` and acts on the answer.
    async fn check_provider(&self, order: &Order, now: Timestamp) -> Result<DriftAction, OrderError> {
        let gateway = self.settlement.gateways().resolve(order.provider())?;
        let outcome = gateway.query_status(&order.order_no, order.channel).await?;

        tracing::debug!(
            order_no = %order.order_no,
            provider = %order.provider(),
            outcome = outcome.label(),
            "Provider status queried"
        );

        match outcome {
            QueryOutcome::Paid(details) => {
                let evidence = TransitionEvidence::payment(
                    TransitionSource::Reconciliation,
                    details.transaction_id,
                    details.amount,
                    details.paid_at.unwrap_or(now),
                );
                match self.settlement.settle_paid(&order.order_no, &evidence).await? {
                    SettlementOutcome::Settled(_) => Ok(DriftAction::Synced),
                    SettlementOutcome::AlreadySettled(_) => Ok(DriftAction::Unchanged { note: None }),
                    SettlementOutcome::Conflict { detail, .. } => {
                        Ok(DriftAction::Unchanged { note: Some(detail) })
                    }
                }
            }
            QueryOutcome::Closed => {
                match self
                    .settlement
                    .cancel(
                        &order.order_no,
                        TransitionSource::Reconciliation,
                        PROVIDER_CLOSED_REASON,
                        now,
                    )
                    .await?
                {
                    TransitionOutcome::Applied(_) => Ok(DriftAction::Cancelled),
                    _ => Ok(DriftAction::Unchanged { note: None }),
                }
            }
            QueryOutcome::NotPaid => Ok(DriftAction::Unchanged { note: None }),
            QueryOutcome::Refunded { transaction_id } => {
                let detail = "provider reports a refund for an order that was never paid";
                tracing::error!(
                    order_no = %order.order_no,
                    provider = %order.provider(),
                    transaction_id = ?transaction_id,
                    "{}", detail
                );
                self.settlement
                    .audit(
                        AuditEvent::new(
                            AuditEventType::ConflictingEvidence,
                            RiskLevel::High,
                            json!({
                                "source": TransitionSource::Reconciliation.as_str(),
                                "provider_status": "refunded",
                                "transaction_id": transaction_id.as_ref().map(|t| t.as_str()),
                                "detail": detail,
                            }),
                        )
                        .for_order(&order.order_no)
                        .for_user(&order.user_id),
                    )
                    .await;
                Ok(DriftAction::Unchanged {
                    note: Some(detail.to_string()),
                })
            }
            QueryOutcome::Unknown { reason } => {
                Err(OrderError::Gateway(GatewayError::TransientNetwork(reason)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{order_no, tx, Harness};
    use crate::domain::entitlement::EntitlementAction;
    use crate::domain::payment::PaidDetails;
    use crate::ports::AuditLog;

    fn service(h: &Harness) -> ReconciliationService {
        ReconciliationService::new(h.settlement(), ReconciliationPolicy::default())
    }

    fn paid(id: &str) -> QueryOutcome {
        QueryOutcome::Paid(PaidDetails {
            transaction_id: tx(id),
            amount: Some(7900),
            paid_at: None,
        })
    }

    // ══════════════════════════════════════════════════════════════
    // Drift correction
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn provider_paid_order_is_settled() {
        let h = Harness::new();
        let now = Timestamp::now();
        h.seed_pending("VIP-1", now.minus_minutes(10));
        h.wallet_a.set_query_result(&order_no("VIP-1"), Ok(paid("tx-1")));

        let report = service(&h).run_once(now).await;

        assert_eq!(report.checked, 1);
        assert_eq!(report.synced, 1);
        assert_eq!(h.stored("VIP-1").state, OrderState::Paid);
        assert!(h
            .entitlements
            .has_grant(&order_no("VIP-1"), EntitlementAction::Activate));
    }

    #[tokio::test]
    async fn provider_closed_order_is_cancelled() {
        let h = Harness::new();
        let now = Timestamp::now();
        h.seed_pending("VIP-1", now.minus_minutes(10));
        h.wallet_a.set_query_result(&order_no("VIP-1"), Ok(QueryOutcome::Closed));

        let report = service(&h).run_once(now).await;

        assert_eq!(report.cancelled, 1);
        let stored = h.stored("VIP-1");
        assert_eq!(stored.state, OrderState::Cancelled);
        assert_eq!(stored.cancel_reason.as_deref(), Some(PROVIDER_CLOSED_REASON));
    }

    #[tokio::test]
    async fn orders_inside_grace_period_are_left_to_callbacks() {
        let h = Harness::new();
        let now = Timestamp::now();
        h.seed_pending("VIP-1", now.minus_minutes(1));

        let report = service(&h).run_once(now).await;

        assert_eq!(report.checked, 0);
        assert_eq!(h.wallet_a.call_count("query_status"), 0);
    }

    #[tokio::test]
    async fn not_paid_order_is_untouched() {
        let h = Harness::new();
        let now = Timestamp::now();
        h.seed_pending("VIP-1", now.minus_minutes(10));

        let report = service(&h).run_once(now).await;

        assert_eq!(report.checked, 1);
        assert_eq!(report.synced + report.cancelled + report.errored, 0);
        assert_eq!(h.stored("VIP-1").state, OrderState::Pending);
    }

    #[tokio::test]
    async fn provider_refund_of_pending_order_is_audited_not_applied() {
        let h = Harness::new();
        let now = Timestamp::now();
        h.seed_pending("VIP-1", now.minus_minutes(10));
        h.wallet_a.set_query_result(
            &order_no("VIP-1"),
            Ok(QueryOutcome::Refunded {
                transaction_id: Some(tx("tx-9")),
            }),
        );

        service(&h).run_once(now).await;

        assert_eq!(h.stored("VIP-1").state, OrderState::Pending);
        let audited = h.audit.events_of_type(AuditEventType::ConflictingEvidence);
        assert_eq!(audited.len(), 1);
        assert_eq!(audited[0].risk_level, RiskLevel::High);
    }

    // ══════════════════════════════════════════════════════════════
    // Retry and backoff
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unknown_status_backs_off_then_exhausts() {
        let h = Harness::new();
        let now = Timestamp::now();
        h.seed_pending("VIP-1", now.minus_minutes(10));
        h.wallet_a
            .set_query_result(&order_no("VIP-1"), Ok(QueryOutcome::unknown("timeout")));
        let service = service(&h);

        let first = service.run_once(now).await;
        assert_eq!(first.errored, 1);
        assert_eq!(first.failures[0].attempt, 1);
        assert_eq!(service.pending_retries().await, 1);

        let backing_off = service.run_once(now.plus_secs(30)).await;
        assert_eq!(backing_off.skipped, 1);
        assert_eq!(backing_off.checked, 0);

        let second = service.run_once(now.plus_secs(60)).await;
        assert_eq!(second.failures[0].attempt, 2);

        let third = service.run_once(now.plus_secs(180)).await;
        assert_eq!(third.failures[0].attempt, 3);
        assert_eq!(service.pending_retries().await, 0);
        assert_eq!(
            h.audit
                .events_of_type(AuditEventType::ReconciliationExhausted)
                .len(),
            1
        );
        assert_eq!(h.stored("VIP-1").state, OrderState::Pending);
    }

    #[tokio::test]
    async fn gateway_error_is_never_treated_as_not_paid() {
        let h = Harness::new();
        let now = Timestamp::now();
        h.seed_pending("VIP-1", now.minus_minutes(10));
        h.wallet_a
            .fail_method("query_status", GatewayError::TransientNetwork("reset".into()));

        let report = service(&h).run_once(now).await;

        assert_eq!(report.errored, 1);
        assert_eq!(h.stored("VIP-1").state, OrderState::Pending);
    }

    #[tokio::test]
    async fn run_summary_is_audited_with_error_severity() {
        let h = Harness::new();
        let now = Timestamp::now();
        h.seed_pending("VIP-1", now.minus_minutes(10));
        h.wallet_a
            .fail_method("query_status", GatewayError::TransientNetwork("reset".into()));

        service(&h).run_once(now).await;

        let runs = h.audit.events_of_type(AuditEventType::ReconciliationRun);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].risk_level, RiskLevel::Medium);
        assert_eq!(runs[0].data["errored"], 1);
    }

    // ══════════════════════════════════════════════════════════════
    // Timeout sweep
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn expired_orders_are_cancelled_even_when_provider_is_down() {
        let h = Harness::new();
        let now = Timestamp::now();
        h.seed_pending("VIP-1", now.minus_minutes(20));
        h.seed_pending("VIP-2", now.minus_minutes(30));
        h.wallet_a
            .fail_method("query_status", GatewayError::TransientNetwork("down".into()));
        h.wallet_a
            .fail_method("close_order", GatewayError::TransientNetwork("down".into()));

        let report = service(&h).run_once(now).await;

        assert_eq!(report.timed_out, 2);
        assert_eq!(report.cancelled, 2);
        for no in ["VIP-1", "VIP-2"] {
            let stored = h.stored(no);
            assert_eq!(stored.state, OrderState::Cancelled);
            assert_eq!(stored.cancel_reason.as_deref(), Some(TIMEOUT_REASON));
        }
    }

    #[tokio::test]
    async fn repeated_sweep_is_a_no_op() {
        let h = Harness::new();
        let now = Timestamp::now();
        h.seed_pending("VIP-1", now.minus_minutes(20));
        let service = service(&h);

        service.run_once(now).await;
        let second = service.run_once(now.plus_secs(300)).await;

        assert_eq!(second.timed_out, 0);
        assert_eq!(h.wallet_a.call_count("close_order"), 1);
    }

    #[tokio::test]
    async fn sweep_cancels_every_expired_order_beyond_one_page() {
        let h = Harness::new();
        let now = Timestamp::now();
        for i in 0..150 {
            h.seed_pending(&format!("VIP-{i:03}"), now.minus_minutes(30));
        }

        let report = service(&h).run_once(now).await;

        assert_eq!(report.timed_out, 150);
        let still_pending = (0..150)
            .filter(|i| h.stored(&format!("VIP-{i:03}")).state == OrderState::Pending)
            .count();
        assert_eq!(still_pending, 0);
    }

    #[tokio::test]
    async fn drift_check_reaches_orders_past_the_first_page() {
        let h = Harness::new();
        let now = Timestamp::now();
        for i in 0..100 {
            h.seed_pending(&format!("OLD-{i:03}"), now.minus_minutes(12));
        }
        h.seed_pending("PAID-1", now.minus_minutes(8));
        h.wallet_a.set_query_result(&order_no("PAID-1"), Ok(paid("tx-1")));

        let report = service(&h).run_once(now).await;

        assert_eq!(report.checked, 101);
        assert_eq!(report.synced, 1);
        assert_eq!(h.stored("PAID-1").state, OrderState::Paid);
    }

    #[tokio::test]
    async fn orders_backing_off_do_not_crowd_out_the_rest() {
        let h = Harness::new();
        let now = Timestamp::now();
        let policy = ReconciliationPolicy {
            batch_size: 2,
            ..ReconciliationPolicy::default()
        };
        for no in ["A-1", "A-2"] {
            h.seed_pending(no, now.minus_minutes(12));
            h.wallet_a
                .set_query_result(&order_no(no), Ok(QueryOutcome::unknown("timeout")));
        }
        h.seed_pending("B-1", now.minus_minutes(8));
        let service = ReconciliationService::new(h.settlement(), policy);
        service.run_once(now).await;

        h.wallet_a.set_query_result(&order_no("B-1"), Ok(paid("tx-1")));
        let report = service.run_once(now.plus_secs(30)).await;

        assert_eq!(report.skipped, 2);
        assert_eq!(report.checked, 1);
        assert_eq!(h.stored("B-1").state, OrderState::Paid);
        assert_eq!(service.pending_retries().await, 2);
    }

    // ══════════════════════════════════════════════════════════════
    // Manual reconcile
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn manual_reconcile_bypasses_backoff() {
        let h = Harness::new();
        let now = Timestamp::now();
        h.seed_pending("VIP-1", now.minus_minutes(10));
        h.wallet_a
            .set_query_result(&order_no("VIP-1"), Ok(QueryOutcome::unknown("timeout")));
        let service = service(&h);
        service.run_once(now).await;

        h.wallet_a.set_query_result(&order_no("VIP-1"), Ok(paid("tx-1")));
        let result = service.reconcile_order(&order_no("VIP-1")).await.unwrap();

        assert_eq!(result.previous_state, OrderState::Pending);
        assert_eq!(result.current_state, OrderState::Paid);
        assert!(result.synced);
        assert!(result.error.is_none());
        assert_eq!(service.pending_retries().await, 0);
    }

    #[tokio::test]
    async fn manual_reconcile_reports_provider_failure() {
        let h = Harness::new();
        h.seed_pending("VIP-1", Timestamp::now());
        h.wallet_a
            .fail_method("query_status", GatewayError::TransientNetwork("reset".into()));

        let result = service(&h).reconcile_order(&order_no("VIP-1")).await.unwrap();

        assert!(!result.synced);
        assert!(result.error.unwrap().contains("reset"));
    }

    #[tokio::test]
    async fn manual_reconcile_of_settled_order_changes_nothing() {
        let h = Harness::new();
        h.seed_paid("VIP-1", "tx-1", Timestamp::now());

        let result = service(&h).reconcile_order(&order_no("VIP-1")).await.unwrap();

        assert_eq!(result.current_state, OrderState::Paid);
        assert!(!result.synced);
        assert_eq!(h.wallet_a.call_count("query_status"), 0);
    }

    #[tokio::test]
    async fn manual_reconcile_of_unknown_order_is_not_found() {
        let h = Harness::new();
        let result = service(&h).reconcile_order(&order_no("missing")).await;
        assert!(matches!(result, Err(OrderError::NotFound(_))));
    }

    // ══════════════════════════════════════════════════════════════
    // Run statistics
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn stats_sum_runs_inside_the_window() {
        let h = Harness::new();
        let now = Timestamp::now();
        h.seed_pending("VIP-1", now.minus_minutes(20));
        let service = service(&h);
        service.run_once(now).await;
        service.run_once(now).await;

        let mut stale = AuditEvent::new(
            AuditEventType::ReconciliationRun,
            RiskLevel::Low,
            json!({"checked": 50, "synced": 50}),
        );
        stale.occurred_at = now.minus_days(10);
        h.audit.record(stale).await.unwrap();

        let stats = service.stats(7, Timestamp::now()).await.unwrap();

        assert_eq!(stats.days, 7);
        assert_eq!(stats.runs, 2);
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.synced, 0);
    }

    #[tokio::test]
    async fn stats_reject_windows_outside_ninety_days() {
        let h = Harness::new();
        let service = service(&h);

        for days in [0, 91] {
            let result = service.stats(days, Timestamp::now()).await;
            assert!(
                matches!(result, Err(OrderError::ValidationFailed { ref field, .. }) if field == "days"),
                "days={} should be refused",
                days
            );
        }
    }
}
