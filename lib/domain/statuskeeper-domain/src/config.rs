//! Service configuration: YAML file, environment overlay, validation.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::credentials::{ApiKey, mask};
use crate::severity::{ThresholdRule, Thresholds};

pub const ENV_NR_API_KEYS: &str = "NR_API_KEYS";
pub const ENV_SPIO_PAGE_ID: &str = "SPIO_PAGE_ID";
pub const ENV_SPIO_API_KEY: &str = "SPIO_API_KEY";
pub const ENV_POLL_INTERVAL: &str = "POLL_INTERVAL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusKeeperConfig {
    pub poll_interval_secs: u64,
    pub newrelic: NewRelicConfig,
    pub statuspage: StatusPageConfig,
    pub thresholds: Vec<ThresholdRule>,
    pub timeouts: TimeoutsConfig,
    pub on_fetch_failure: FetchFailurePolicy,
    pub notifications: NotificationsConfig,
}

impl Default for StatusKeeperConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            newrelic: NewRelicConfig::default(),
            statuspage: StatusPageConfig::default(),
            thresholds: Thresholds::default_rules(),
            timeouts: TimeoutsConfig::default(),
            on_fetch_failure: FetchFailurePolicy::default(),
            notifications: NotificationsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewRelicConfig {
    pub api_keys: Vec<ApiKey>,
    pub base_url: String,
}

impl Default for NewRelicConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            base_url: "https://api.newrelic.com/v2".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusPageConfig {
    pub page_id: String,
    pub api_key: ApiKey,
    pub base_url: String,
}

impl Default for StatusPageConfig {
    fn default() -> Self {
        Self {
            page_id: String::new(),
            api_key: ApiKey::default(),
            base_url: "https://api.statuspage.io/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Bounds every page fetch, component listing and status update.
    pub request_secs: u64,
    /// Bounds each observer notification.
    pub observer_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            request_secs: 10,
            observer_secs: 5,
        }
    }
}

/// What a cycle does when the alerting backend or the status page could
/// not be read completely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailurePolicy {
    /// Keep the previous cycle's caches and issue no updates.
    #[default]
    SkipCycle,
    /// Apply whatever was fetched; missing violations read as operational.
    ProceedPartial,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Log every transition through `tracing`.
    pub log_transitions: bool,
    pub channels: Vec<NotificationChannelConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationChannelConfig {
    Ntfy { url: String, topic: String },
}

impl StatusKeeperConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Environment values win over file values when present and non-empty.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(keys) = lookup(ENV_NR_API_KEYS) {
            self.newrelic.api_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(ApiKey::from)
                .collect();
        }
        if let Some(page_id) = lookup(ENV_SPIO_PAGE_ID) {
            self.statuspage.page_id = page_id.trim().to_string();
        }
        if let Some(key) = lookup(ENV_SPIO_API_KEY) {
            self.statuspage.api_key = ApiKey::new(key.trim());
        }
        // Milliseconds, rounded up to whole seconds.
        if let Some(interval) = lookup(ENV_POLL_INTERVAL) {
            let millis: u64 = interval
                .trim()
                .parse()
                .with_context(|| format!("invalid {ENV_POLL_INTERVAL} value: {interval:?}"))?;
            self.poll_interval_secs = millis.div_ceil(1000);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.newrelic.api_keys.is_empty() || self.newrelic.api_keys.iter().any(ApiKey::is_empty)
        {
            missing.push(format!("{ENV_NR_API_KEYS} - New Relic API key(s)"));
        }
        if self.statuspage.page_id.trim().is_empty() {
            missing.push(format!("{ENV_SPIO_PAGE_ID} - statuspage.io page id"));
        }
        if self.statuspage.api_key.is_empty() {
            missing.push(format!("{ENV_SPIO_API_KEY} - statuspage.io API key"));
        }
        if !missing.is_empty() {
            anyhow::bail!("missing required API keys: {}", missing.join(", "));
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be greater than zero");
        }
        if self.thresholds.is_empty() {
            anyhow::bail!("at least one threshold rule is required");
        }
        if self.timeouts.request_secs == 0 || self.timeouts.observer_secs == 0 {
            anyhow::bail!("timeouts must be greater than zero");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.request_secs)
    }

    pub fn observer_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.observer_secs)
    }

    pub fn threshold_table(&self) -> Thresholds {
        Thresholds::new(self.thresholds.clone())
    }

    pub fn masked_page_id(&self) -> String {
        mask(&self.statuspage.page_id)
    }
}
