use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use statuskeeper_domain::Transition;
use statuskeeper_ports::StatusObserver;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

#[async_trait]
impl StatusObserver for LogObserver {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, transition: &Transition) -> Result<()> {
        info!(
            target: "statuskeeper::transitions",
            component = %transition.component.name,
            from = %transition.previous(),
            to = %transition.target,
            violation_duration = ?transition.violation.as_ref().map(|v| v.duration),
            detected_at = %transition.detected_at.to_rfc3339(),
            "component transition"
        );
        Ok(())
    }
}
