//! Connectivity check for both upstream APIs.

use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use statuskeeper_domain::ApiKey;
use statuskeeper_ports::{AlertingPort, StatusPagePort};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    pub newrelic_ok: bool,
    pub statuspage_ok: bool,
}

impl HealthReport {
    pub fn ok(&self) -> bool {
        self.newrelic_ok && self.statuspage_ok
    }

    pub fn message(&self) -> &'static str {
        match (self.newrelic_ok, self.statuspage_ok) {
            (true, true) => "New Relic and statuspage.io connections established.",
            (false, false) => "Trouble connecting to New Relic and Status Page APIs",
            (false, true) => "Trouble connecting to New Relic API",
            (true, false) => "Trouble connecting to Status Page API",
        }
    }
}

/// The alerting side is healthy only if every credential is accepted.
pub async fn check_health(
    alerting: &dyn AlertingPort,
    status_page: &dyn StatusPagePort,
    credentials: &[ApiKey],
    limit: Duration,
) -> HealthReport {
    let mut newrelic_ok = !credentials.is_empty();
    for credential in credentials {
        match timeout(limit, alerting.health_check(credential)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(%credential, error = %err, "alerting health check failed");
                newrelic_ok = false;
            }
            Err(_) => {
                warn!(%credential, ?limit, "alerting health check timed out");
                newrelic_ok = false;
            }
        }
    }

    let statuspage_ok = match timeout(limit, status_page.health_check()).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            warn!(error = %err, "status page health check failed");
            false
        }
        Err(_) => {
            warn!(?limit, "status page health check timed out");
            false
        }
    };

    HealthReport {
        newrelic_ok,
        statuspage_ok,
    }
}
