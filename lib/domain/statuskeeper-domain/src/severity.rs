//! Violation duration to component status mapping.

use serde::{Deserialize, Serialize};

use crate::status::ComponentStatus;

/// A violation open for longer than `duration` seconds maps to `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub duration: u64,
    pub status: ComponentStatus,
}

impl ThresholdRule {
    pub fn new(duration: u64, status: ComponentStatus) -> Self {
        Self { duration, status }
    }
}

/// Threshold table, kept sorted by `duration` descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thresholds {
    rules: Vec<ThresholdRule>,
}

impl Thresholds {
    pub fn new(mut rules: Vec<ThresholdRule>) -> Self {
        rules.sort_by(|a, b| b.duration.cmp(&a.duration));
        Self { rules }
    }

    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule (longest duration first) strictly exceeded by `duration`.
    /// Falls through to `Operational`.
    pub fn classify(&self, duration: u64) -> ComponentStatus {
        self.rules
            .iter()
            .find(|rule| duration > rule.duration)
            .map(|rule| rule.status)
            .unwrap_or(ComponentStatus::Operational)
    }

    pub fn default_rules() -> Vec<ThresholdRule> {
        vec![
            ThresholdRule::new(600, ComponentStatus::DegradedPerformance),
            ThresholdRule::new(1200, ComponentStatus::PartialOutage),
            ThresholdRule::new(1800, ComponentStatus::MajorOutage),
        ]
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::new(Self::default_rules())
    }
}

impl From<Vec<ThresholdRule>> for Thresholds {
    fn from(rules: Vec<ThresholdRule>) -> Self {
        Self::new(rules)
    }
}

/// Classify against an arbitrary rule slice; the slice need not be sorted.
pub fn classify(duration: u64, rules: &[ThresholdRule]) -> ComponentStatus {
    Thresholds::new(rules.to_vec()).classify(duration)
}
