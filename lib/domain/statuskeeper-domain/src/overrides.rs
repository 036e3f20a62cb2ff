use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::names::normalize_name;
use crate::status::ComponentStatus;

/// One month.
pub const MAX_OVERRIDE_SECONDS: u64 = 2_628_000;

/// A manual, time-bounded suspension of automatic status control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    pub component_name: String,
    pub component_key: String,
    pub seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_status: Option<ComponentStatus>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Override {
    pub fn new(
        component_name: impl Into<String>,
        seconds: u64,
        new_status: Option<ComponentStatus>,
    ) -> Self {
        let component_name = component_name.into();
        let created_at = Utc::now();
        let expires_at = i64::try_from(seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|ttl| created_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            component_key: normalize_name(&component_name),
            component_name,
            seconds,
            new_status,
            created_at,
            expires_at,
        }
    }
}
