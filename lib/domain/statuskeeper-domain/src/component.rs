use serde::{Deserialize, Serialize};

use crate::names::normalize_name;

/// A status page component as last reported by the status page.
///
/// `status` is the raw reported string; it is compared case-insensitively
/// and never rewritten locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
}

impl Component {
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: status.into(),
        }
    }

    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }
}
