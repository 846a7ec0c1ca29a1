//! Serving-side risk classification of a single prediction.

use serde::{Deserialize, Serialize};

/// Warranty probability above which a vehicle is high risk.
pub const HIGH_RISK_PROBABILITY: f64 = 0.7;
/// Warranty probability above which a vehicle is medium risk.
pub const MEDIUM_RISK_PROBABILITY: f64 = 0.4;
/// Anomaly-model output for an outlier.
pub const ANOMALY_FLAG: i8 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        };
        f.write_str(label)
    }
}

/// Combine the warranty probability and the anomaly flag into a risk level.
///
/// An anomalous vehicle is always high risk.
pub fn classify_risk(warranty_probability: f64, anomaly_flag: i8) -> RiskLevel {
    if warranty_probability > HIGH_RISK_PROBABILITY || anomaly_flag == ANOMALY_FLAG {
        RiskLevel::High
    } else if warranty_probability > MEDIUM_RISK_PROBABILITY {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_exclusive() {
        assert_eq!(classify_risk(0.7, 1), RiskLevel::Medium);
        assert_eq!(classify_risk(0.71, 1), RiskLevel::High);
        assert_eq!(classify_risk(0.4, 1), RiskLevel::Low);
        assert_eq!(classify_risk(0.41, 1), RiskLevel::Medium);
    }

    #[test]
    fn anomaly_overrides_probability() {
        assert_eq!(classify_risk(0.05, ANOMALY_FLAG), RiskLevel::High);
    }

    #[test]
    fn display_matches_wire_format() {
        assert_eq!(RiskLevel::Medium.to_string(), "MEDIUM");
        assert_eq!(
            serde_json::to_string(&RiskLevel::High).unwrap(),
            "\"HIGH\""
        );
    }
}
