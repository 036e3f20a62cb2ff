use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Displayed status of a status page component.
///
/// Only `Operational` has a fixed meaning in reconciliation: it is the
/// fallback when no threshold rule matches. Escalation order comes from the
/// threshold table, not from this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    #[default]
    Operational,
    DegradedPerformance,
    PartialOutage,
    MajorOutage,
    UnderMaintenance,
}

impl ComponentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentStatus::Operational => "operational",
            ComponentStatus::DegradedPerformance => "degraded_performance",
            ComponentStatus::PartialOutage => "partial_outage",
            ComponentStatus::MajorOutage => "major_outage",
            ComponentStatus::UnderMaintenance => "under_maintenance",
        }
    }

    /// Case-insensitive comparison against a status string as reported by
    /// the status page.
    pub fn matches(&self, reported: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(reported.trim())
    }
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "operational" => Ok(ComponentStatus::Operational),
            "degraded_performance" => Ok(ComponentStatus::DegradedPerformance),
            "partial_outage" => Ok(ComponentStatus::PartialOutage),
            "major_outage" => Ok(ComponentStatus::MajorOutage),
            "under_maintenance" => Ok(ComponentStatus::UnderMaintenance),
            other => anyhow::bail!("unknown component status: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            "Partial_Outage".parse::<ComponentStatus>().unwrap(),
            ComponentStatus::PartialOutage
        );
        assert!("sideways".parse::<ComponentStatus>().is_err());
    }

    #[test]
    fn test_matches_reported_status() {
        assert!(ComponentStatus::MajorOutage.matches("MAJOR_OUTAGE"));
        assert!(ComponentStatus::Operational.matches("operational "));
        assert!(!ComponentStatus::Operational.matches("degraded_performance"));
        assert!(!ComponentStatus::Operational.matches(""));
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&ComponentStatus::DegradedPerformance).unwrap();
        assert_eq!(json, "\"degraded_performance\"");
    }
}
