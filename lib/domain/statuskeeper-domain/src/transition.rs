use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::alerting::Violation;
use crate::component::Component;
use crate::status::ComponentStatus;

/// A detected status change for one component, handed to observers before
/// the status page is updated.
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    pub component: Component,
    pub target: ComponentStatus,
    pub violation: Option<Violation>,
    pub detected_at: DateTime<Utc>,
}

impl Transition {
    pub fn new(component: Component, target: ComponentStatus, violation: Option<Violation>) -> Self {
        Self {
            component,
            target,
            violation,
            detected_at: Utc::now(),
        }
    }

    /// Status the page showed before this transition.
    pub fn previous(&self) -> &str {
        &self.component.status
    }
}
