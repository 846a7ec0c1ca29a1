//! Per-feature summary statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use lineguard_state::{FeatureBaselineEntry, FeaturePayload, FeatureRow};
use serde::{Deserialize, Serialize};

/// Closed time interval `[start, end]` of logged inference traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// The window of length `span` that ends at `end`.
    pub fn ending_at(end: DateTime<Utc>, span: Duration) -> Self {
        Self {
            start: end - span,
            end,
        }
    }
}

/// Live statistics for one feature over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveStatEntry {
    pub feature_name: String,
    pub mean: f64,
    /// Sample standard deviation (n − 1). `NaN` when fewer than two samples
    /// were seen; the drift check then skips the spread comparison.
    pub std: f64,
    pub sample_count: u64,
}

/// Feature name → live statistics.
pub type LiveStats = BTreeMap<String, LiveStatEntry>;

/// Welford accumulator.
#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    count: u64,
    mean: f64,
    m2: f64,
}

impl Accumulator {
    fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    fn sample_std(&self) -> f64 {
        if self.count < 2 {
            return f64::NAN;
        }
        (self.m2 / (self.count - 1) as f64).sqrt()
    }
}

/// Mean and sample standard deviation of every feature that appears in at
/// least one payload.
///
/// Each feature is averaged over the payloads where it is present.
/// Non-finite values count as absent. Features never seen are omitted,
/// not zero-filled.
pub fn summarize<'a, I>(payloads: I) -> LiveStats
where
    I: IntoIterator<Item = &'a FeaturePayload>,
{
    let mut accumulators: BTreeMap<&'a str, Accumulator> = BTreeMap::new();
    for payload in payloads {
        for (name, value) in payload {
            if value.is_finite() {
                accumulators.entry(name.as_str()).or_default().push(*value);
            }
        }
    }

    accumulators
        .into_iter()
        .map(|(name, acc)| {
            let entry = LiveStatEntry {
                feature_name: name.to_string(),
                mean: acc.mean,
                std: acc.sample_std(),
                sample_count: acc.count,
            };
            (name.to_string(), entry)
        })
        .collect()
}

/// Baseline rows for a training dataset, in feature-name order.
///
/// A feature seen only once gets a spread of 0.0 so the stored baseline is
/// always finite.
pub fn baseline_from_rows(rows: &[FeatureRow]) -> Vec<FeatureBaselineEntry> {
    summarize(rows.iter().map(|r| &r.features))
        .into_values()
        .map(|s| {
            let std = if s.std.is_finite() { s.std } else { 0.0 };
            FeatureBaselineEntry::new(s.feature_name, s.mean, std)
        })
        .collect()
}
