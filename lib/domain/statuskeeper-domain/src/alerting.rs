//! Alerting backend records and the per-cycle oldest-violation view.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::names::normalize_name;

/// A named alerting rule group. Anything beyond the name is kept opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl AlertPolicy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            attributes: Map::new(),
        }
    }

    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }
}

/// An open alert under a policy. `duration` is seconds continuously open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub policy_name: String,
    pub duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Violation {
    pub fn new(policy_name: impl Into<String>, duration: u64) -> Self {
        Self {
            id: None,
            policy_name: policy_name.into(),
            duration,
            label: None,
            condition_name: None,
            priority: None,
            attributes: Map::new(),
        }
    }

    pub fn policy_key(&self) -> String {
        normalize_name(&self.policy_name)
    }
}

/// Policies by normalized name.
pub type PolicyIndex = HashMap<String, AlertPolicy>;

/// Longest-open violation per normalized policy name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OldestViolations {
    by_policy: HashMap<String, Violation>,
}

impl OldestViolations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps `violation` if it has been open longer than the one already
    /// held for its policy. Ties keep the existing entry.
    pub fn record(&mut self, violation: Violation) {
        let key = violation.policy_key();
        match self.by_policy.get(&key) {
            Some(current) if current.duration >= violation.duration => {}
            _ => {
                self.by_policy.insert(key, violation);
            }
        }
    }

    pub fn merge(&mut self, other: OldestViolations) {
        for violation in other.by_policy.into_values() {
            self.record(violation);
        }
    }

    pub fn get(&self, policy_key: &str) -> Option<&Violation> {
        self.by_policy.get(policy_key)
    }

    pub fn len(&self) -> usize {
        self.by_policy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_policy.is_empty()
    }

    pub fn policy_keys(&self) -> impl Iterator<Item = &str> {
        self.by_policy.keys().map(String::as_str)
    }
}

impl FromIterator<Violation> for OldestViolations {
    fn from_iter<I: IntoIterator<Item = Violation>>(iter: I) -> Self {
        let mut view = OldestViolations::new();
        for violation in iter {
            view.record(violation);
        }
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keeps_longest() {
        let view: OldestViolations = vec![
            Violation::new("DB", 300),
            Violation::new("db", 900),
            Violation::new("Db", 450),
        ]
        .into_iter()
        .collect();

        assert_eq!(view.len(), 1);
        assert_eq!(view.get("db").map(|v| v.duration), Some(900));
    }

    #[test]
    fn test_merge_across_views() {
        let mut first: OldestViolations = vec![Violation::new("db", 300)].into_iter().collect();
        let second: OldestViolations = vec![Violation::new("db", 900), Violation::new("api", 5)]
            .into_iter()
            .collect();

        first.merge(second);
        assert_eq!(first.get("db").map(|v| v.duration), Some(900));
        assert_eq!(first.get("api").map(|v| v.duration), Some(5));
    }

    #[test]
    fn test_violation_keeps_unknown_fields() {
        let raw = serde_json::json!({
            "id": 42,
            "policy_name": "API",
            "duration": 1250,
            "label": "Error rate > 5%",
            "opened_at": 1700000000000u64,
            "entity": { "name": "api-prod" }
        });
        let violation: Violation = serde_json::from_value(raw).unwrap();
        assert_eq!(violation.policy_key(), "api");
        assert_eq!(violation.duration, 1250);
        assert!(violation.attributes.contains_key("opened_at"));
        assert!(violation.attributes.contains_key("entity"));
    }

    #[test]
    fn test_policy_key_normalizes() {
        let policy = AlertPolicy::new("Checkout API");
        assert_eq!(policy.key(), "checkout api");
    }
}
