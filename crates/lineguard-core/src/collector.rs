//! FeatureStatsCollector: live feature statistics over a window of
//! logged inference traffic.

use std::sync::Arc;

use lineguard_state::InferenceLogStore;
use tracing::debug;

use crate::domain::{summarize, CollectError, LiveStats, TimeWindow};

/// Summarises the inference log into per-feature mean / sample std.
#[derive(Clone)]
pub struct FeatureStatsCollector {
    log: Arc<dyn InferenceLogStore>,
}

impl FeatureStatsCollector {
    pub fn new(log: Arc<dyn InferenceLogStore>) -> Self {
        Self { log }
    }

    /// Statistics of every feature logged inside `window` (inclusive).
    ///
    /// Returns [`CollectError::InsufficientData`] when the window holds no
    /// records at all. That means "no verdict possible", not "no drift".
    pub async fn collect(&self, window: TimeWindow) -> Result<LiveStats, CollectError> {
        let records = self
            .log
            .query(window.start, window.end)
            .await
            .map_err(CollectError::Unavailable)?;

        if records.is_empty() {
            return Err(CollectError::InsufficientData {
                start: window.start,
                end: window.end,
            });
        }

        let stats = summarize(records.iter().map(|r| &r.payload));
        debug!(
            records = records.len(),
            features = stats.len(),
            "collected live feature stats"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use lineguard_state::fakes::MemoryInferenceLog;
    use lineguard_state::{FeaturePayload, InferenceRecord};

    fn record(torque: f64, minutes: i64) -> InferenceRecord {
        let mut payload = FeaturePayload::new();
        payload.insert("avg_torque".to_string(), torque);
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        InferenceRecord::new(payload, base + Duration::minutes(minutes))
    }

    fn window() -> TimeWindow {
        let end = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        TimeWindow::ending_at(end, Duration::hours(24))
    }

    #[tokio::test]
    async fn empty_window_is_insufficient_data() {
        let collector = FeatureStatsCollector::new(Arc::new(MemoryInferenceLog::new()));
        let err = collector.collect(window()).await.unwrap_err();
        assert!(matches!(err, CollectError::InsufficientData { .. }));
    }

    #[tokio::test]
    async fn records_outside_window_are_ignored() {
        let log = MemoryInferenceLog::with_records(vec![
            record(10.0, 0),
            record(20.0, 60),
            // one day and one minute after the base: outside
            record(1000.0, 24 * 60 + 1),
        ]);
        let collector = FeatureStatsCollector::new(Arc::new(log));
        let stats = collector.collect(window()).await.unwrap();
        assert_eq!(stats["avg_torque"].sample_count, 2);
        assert_eq!(stats["avg_torque"].mean, 15.0);
    }

    #[tokio::test]
    async fn window_bounds_are_inclusive() {
        let log = MemoryInferenceLog::with_records(vec![record(10.0, 0), record(30.0, 24 * 60)]);
        let collector = FeatureStatsCollector::new(Arc::new(log));
        let stats = collector.collect(window()).await.unwrap();
        assert_eq!(stats["avg_torque"].sample_count, 2);
    }
}
