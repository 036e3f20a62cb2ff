use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use statuskeeper_domain::{ComponentStatus, Transition};
use statuskeeper_ports::StatusObserver;

/// Publishes each transition as a plain-text message to an ntfy topic.
#[derive(Debug, Clone)]
pub struct NtfyObserver {
    http: Client,
    endpoint: String,
}

impl NtfyObserver {
    pub fn new(url: &str, topic: &str, request_timeout: Duration) -> Result<Self> {
        let topic = topic.trim_matches('/');
        if topic.is_empty() {
            anyhow::bail!("ntfy topic is required");
        }
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build ntfy HTTP client")?;
        Ok(Self {
            http,
            endpoint: format!("{}/{topic}", url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

pub fn format_title(transition: &Transition) -> String {
    format!(
        "{} is now {}",
        transition.component.name,
        transition.target.as_str().replace('_', " ")
    )
}

pub fn format_message(transition: &Transition) -> String {
    let mut message = format!(
        "{}: {} -> {}",
        transition.component.name,
        transition.previous(),
        transition.target
    );
    if let Some(violation) = &transition.violation {
        message.push_str(&format!(
            "\nOldest open violation: {}s",
            violation.duration
        ));
        if let Some(label) = &violation.label {
            message.push_str(&format!(" ({label})"));
        }
    }
    message.push_str(&format!(
        "\nDetected at {}",
        transition.detected_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    message
}

fn priority(status: ComponentStatus) -> &'static str {
    match status {
        ComponentStatus::MajorOutage => "urgent",
        ComponentStatus::PartialOutage => "high",
        ComponentStatus::DegradedPerformance | ComponentStatus::UnderMaintenance => "default",
        ComponentStatus::Operational => "low",
    }
}

fn tags(status: ComponentStatus) -> &'static str {
    match status {
        ComponentStatus::Operational => "white_check_mark",
        ComponentStatus::UnderMaintenance => "construction",
        _ => "rotating_light",
    }
}

#[async_trait]
impl StatusObserver for NtfyObserver {
    fn name(&self) -> &str {
        "ntfy"
    }

    async fn notify(&self, transition: &Transition) -> Result<()> {
        debug!(endpoint = %self.endpoint, component = %transition.component.name, "publishing");
        self.http
            .post(&self.endpoint)
            .header("Title", format_title(transition))
            .header("Priority", priority(transition.target))
            .header("Tags", tags(transition.target))
            .body(format_message(transition))
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.endpoint))?
            .error_for_status()
            .context("ntfy rejected message")?;
        Ok(())
    }
}
