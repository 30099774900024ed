//! Totals over recent reconciliation runs.

use serde::Serialize;
use serde_json::Value;

use crate::domain::foundation::ValidationError;

/// Longest window an operator may ask about.
pub const MAX_STATS_DAYS: u32 = 90;

/// Default window when none is given.
pub const DEFAULT_STATS_DAYS: u32 = 7;

/// Counters summed across every run recorded in a window of days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationStats {
    pub days: u32,
    pub runs: u32,
    pub checked: u64,
    pub synced: u64,
    pub cancelled: u64,
    pub timed_out: u64,
    pub errored: u64,
    pub skipped: u64,
    /// Runs that recorded at least one error.
    pub runs_with_errors: u32,
}

impl ReconciliationStats {
    /// Checks the requested window.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` unless `days` is between 1 and
    /// [`MAX_STATS_DAYS`].
    pub fn window(days: u32) -> Result<u32, ValidationError> {
        if days == 0 || days > MAX_STATS_DAYS {
            return Err(ValidationError::out_of_range(
                "days",
                1,
                MAX_STATS_DAYS as i64,
                days as i64,
            ));
        }
        Ok(days)
    }

    /// Sums the counters of each run's recorded data.
    ///
    /// Missing or non-numeric counters count as zero.
    pub fn from_runs<'a>(days: u32, runs: impl IntoIterator<Item = &'a Value>) -> Self {
        let mut stats = Self {
            days,
            ..Self::default()
        };
        for run in runs {
            let counter = |name: &str| run.get(name).and_then(Value::as_u64).unwrap_or(0);
            let errored = counter("errored");

            stats.runs += 1;
            stats.checked += counter("checked");
            stats.synced += counter("synced");
            stats.cancelled += counter("cancelled");
            stats.timed_out += counter("timed_out");
            stats.errored += errored;
            stats.skipped += counter("skipped");
            if errored > 0 {
                stats.runs_with_errors += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn counters_are_summed_across_runs() {
        let runs = [
            json!({"checked": 4, "synced": 1, "cancelled": 2, "timed_out": 1, "errored": 0, "skipped": 0}),
            json!({"checked": 3, "synced": 0, "cancelled": 0, "timed_out": 0, "errored": 2, "skipped": 1}),
        ];

        let stats = ReconciliationStats::from_runs(7, &runs);

        assert_eq!(stats.runs, 2);
        assert_eq!(stats.checked, 7);
        assert_eq!(stats.synced, 1);
        assert_eq!(stats.cancelled, 2);
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.errored, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.runs_with_errors, 1);
    }

    #[test]
    fn no_runs_yields_zeroes_for_the_window() {
        let stats = ReconciliationStats::from_runs(3, std::iter::empty());
        assert_eq!(stats, ReconciliationStats { days: 3, ..Default::default() });
    }

    #[test]
    fn malformed_counters_count_as_zero() {
        let runs = [json!({"checked": "many", "synced": -1})];
        let stats = ReconciliationStats::from_runs(1, &runs);
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.checked, 0);
        assert_eq!(stats.synced, 0);
    }

    #[test]
    fn window_must_be_between_one_day_and_the_maximum() {
        assert_eq!(ReconciliationStats::window(7), Ok(7));
        assert_eq!(ReconciliationStats::window(MAX_STATS_DAYS), Ok(MAX_STATS_DAYS));
        assert!(ReconciliationStats::window(0).is_err());
        assert!(ReconciliationStats::window(MAX_STATS_DAYS + 1).is_err());
    }
}
