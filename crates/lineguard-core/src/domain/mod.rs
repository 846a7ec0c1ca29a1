//! Domain models for lineguard.
//!
//! Canonical definitions for the values that flow through one cycle:
//! - `LiveStatEntry` / `LiveStats`: per-feature statistics of recent traffic
//! - `DriftVerdict` / `DriftEvidence`: outcome of the drift check
//! - `CycleReport`: the externally observable result of a cycle
//! - `RiskLevel`: serving-side risk classification

pub mod error;
pub mod report;
pub mod risk;
pub mod stats;
pub mod verdict;

pub use error::{CollectError, CycleError, PromotionError, RetrainError};
pub use report::{CycleIssue, CycleReport, CycleState};
pub use risk::{classify_risk, RiskLevel};
pub use stats::{baseline_from_rows, summarize, LiveStatEntry, LiveStats, TimeWindow};
pub use verdict::{DriftEvidence, DriftThresholds, DriftVerdict, FeatureDrift};
