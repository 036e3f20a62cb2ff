//! statuskeeper: keeps statuspage.io components in line with open New Relic
//! alert violations.
//!
//! [`StatusKeeper`] wires a validated [`StatusKeeperConfig`] into the HTTP
//! adapters and the reconciliation engine.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use statuskeeper_adapter_newrelic::NewRelicClient;
use statuskeeper_adapter_notification::observers_from_config;
use statuskeeper_adapter_statuspage::StatusPageClient;
use statuskeeper_application::{
    CycleReport, CycleScheduler, HealthReport, Reconciler, ReconcilerSettings, SchedulerHandle,
};
use statuskeeper_ports::{AlertingPort, StatusPagePort};

pub use statuskeeper_application as application;
pub use statuskeeper_domain as domain;
pub use statuskeeper_domain::StatusKeeperConfig;

pub struct StatusKeeper {
    config: StatusKeeperConfig,
    reconciler: Arc<Reconciler>,
}

impl StatusKeeper {
    pub fn from_config(config: StatusKeeperConfig) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let alerting: Arc<dyn AlertingPort> = Arc::new(NewRelicClient::new(
            config.newrelic.base_url.clone(),
            config.request_timeout(),
        )?);
        let status_page: Arc<dyn StatusPagePort> = Arc::new(StatusPageClient::new(
            &config.statuspage.base_url,
            &config.statuspage.page_id,
            config.statuspage.api_key.clone(),
            config.request_timeout(),
        )?);

        Self::with_ports(config, alerting, status_page)
    }

    /// Same as [`StatusKeeper::from_config`] but with caller-supplied ports.
    pub fn with_ports(
        config: StatusKeeperConfig,
        alerting: Arc<dyn AlertingPort>,
        status_page: Arc<dyn StatusPagePort>,
    ) -> Result<Self> {
        let reconciler = Reconciler::new(
            alerting,
            status_page,
            ReconcilerSettings::from_config(&config),
        );
        for observer in observers_from_config(&config.notifications, config.observer_timeout())
            .context("failed to set up notification channels")?
        {
            info!(observer = observer.name(), "notification channel enabled");
            reconciler.add_observer(observer);
        }

        Ok(Self {
            config,
            reconciler: Arc::new(reconciler),
        })
    }

    pub fn config(&self) -> &StatusKeeperConfig {
        &self.config
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub async fn health_check(&self) -> HealthReport {
        self.reconciler.health_check().await
    }

    pub async fn run_once(&self) -> CycleReport {
        self.reconciler.run_cycle().await
    }

    /// Starts periodic reconciliation on the current tokio runtime.
    pub fn start(&self) -> SchedulerHandle {
        info!(
            interval_secs = self.config.poll_interval_secs,
            credentials = self.config.newrelic.api_keys.len(),
            page_id = %self.config.masked_page_id(),
            "starting status page synchronization"
        );
        CycleScheduler::new(Arc::clone(&self.reconciler), self.config.poll_interval()).spawn()
    }
}
