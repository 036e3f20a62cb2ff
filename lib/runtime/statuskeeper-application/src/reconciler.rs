//! One reconciliation cycle: refresh, compare, notify, update.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use statuskeeper_domain::{
    ApiKey, Component, ComponentStatus, FetchFailurePolicy, MAX_OVERRIDE_SECONDS,
    OldestViolations, Override, PolicyIndex, StatusKeeperConfig, Thresholds, Transition,
    Violation, normalize_name,
};
use statuskeeper_ports::{AlertingPort, StatusObserver, StatusPagePort};

use crate::aggregator::{Refresh, ViolationAggregator};
use crate::health::{HealthReport, check_health};
use crate::observers::ObserverRegistry;
use crate::overrides::OverrideStore;

#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub credentials: Vec<ApiKey>,
    pub thresholds: Thresholds,
    pub request_timeout: Duration,
    pub observer_timeout: Duration,
    pub on_fetch_failure: FetchFailurePolicy,
}

impl ReconcilerSettings {
    pub fn from_config(config: &StatusKeeperConfig) -> Self {
        Self {
            credentials: config.newrelic.api_keys.clone(),
            thresholds: config.threshold_table(),
            request_timeout: config.request_timeout(),
            observer_timeout: config.observer_timeout(),
            on_fetch_failure: config.on_fetch_failure,
        }
    }
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self::from_config(&StatusKeeperConfig::default())
    }
}

/// What the cycle concluded for one component.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    /// No alert policy shares the component's name.
    Unmanaged,
    /// An active override suspends automatic control.
    Overridden,
    /// The displayed status already equals the target.
    InSync { status: ComponentStatus },
    Transition {
        target: ComponentStatus,
        violation: Option<Violation>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "error", rename_all = "snake_case")]
pub enum UpdateOutcome {
    Applied,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentReport {
    pub name: String,
    pub decision: Decision,
    pub update: Option<UpdateOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CycleOutcome {
    Completed,
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub outcome: CycleOutcome,
    pub components: Vec<ComponentReport>,
}

impl CycleReport {
    fn skipped(cycle: u64, started_at: DateTime<Utc>, reason: String) -> Self {
        Self {
            cycle,
            started_at,
            outcome: CycleOutcome::Skipped { reason },
            components: Vec::new(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, CycleOutcome::Skipped { .. })
    }

    pub fn component(&self, name: &str) -> Option<&ComponentReport> {
        let key = normalize_name(name);
        self.components
            .iter()
            .find(|report| normalize_name(&report.name) == key)
    }

    pub fn updates_issued(&self) -> usize {
        self.components.iter().filter(|c| c.update.is_some()).count()
    }

    pub fn updates_failed(&self) -> usize {
        self.components
            .iter()
            .filter(|c| matches!(c.update, Some(UpdateOutcome::Failed(_))))
            .count()
    }

    fn count(&self, wanted: fn(&Decision) -> bool) -> usize {
        self.components.iter().filter(|c| wanted(&c.decision)).count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OverrideAck {
    pub record: Override,
    /// Whether a forced status was pushed to the status page.
    pub status_applied: bool,
}

#[derive(Default)]
struct CycleState {
    cycles: u64,
    policies: PolicyIndex,
    oldest: OldestViolations,
}

/// Owns all reconciliation state. Cycles are serialized through an async
/// lock, so the scheduler and manual triggers never run two at once.
pub struct Reconciler {
    aggregator: ViolationAggregator,
    status_page: Arc<dyn StatusPagePort>,
    overrides: OverrideStore,
    observers: ObserverRegistry,
    settings: ReconcilerSettings,
    cycle: Mutex<CycleState>,
    components: RwLock<Arc<HashMap<String, Component>>>,
}

impl Reconciler {
    pub fn new(
        alerting: Arc<dyn AlertingPort>,
        status_page: Arc<dyn StatusPagePort>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            aggregator: ViolationAggregator::new(alerting, settings.request_timeout),
            status_page,
            overrides: OverrideStore::new(),
            observers: ObserverRegistry::new(settings.observer_timeout),
            settings,
            cycle: Mutex::new(CycleState::default()),
            components: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    pub fn add_observer(&self, observer: Arc<dyn StatusObserver>) {
        self.observers.add(observer);
    }

    pub fn override_store(&self) -> &OverrideStore {
        &self.overrides
    }

    pub fn overrides(&self) -> Vec<Override> {
        self.overrides.list()
    }

    pub fn clear_override(&self, component_name: &str) -> Option<Override> {
        self.overrides.clear(component_name)
    }

    /// Components as of the last completed cycle, by normalized name.
    pub fn components(&self) -> Arc<HashMap<String, Component>> {
        Arc::clone(&self.components.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub async fn health_check(&self) -> HealthReport {
        check_health(
            self.aggregator.alerting().as_ref(),
            self.status_page.as_ref(),
            &self.settings.credentials,
            self.settings.request_timeout,
        )
        .await
    }

    /// Suspends automatic control of a component for `seconds`. A forced
    /// status is pushed right away when the component is known from the
    /// last cycle.
    pub async fn register_override(
        &self,
        component_name: &str,
        seconds: u64,
        forced_status: Option<ComponentStatus>,
    ) -> Result<OverrideAck> {
        let component_name = component_name.trim();
        if component_name.is_empty() {
            anyhow::bail!("component_name is required");
        }
        if seconds > MAX_OVERRIDE_SECONDS {
            anyhow::bail!("override of {seconds}s exceeds the maximum of {MAX_OVERRIDE_SECONDS}s");
        }

        let record = self.overrides.set(component_name, seconds, forced_status);

        let mut status_applied = false;
        if let Some(status) = forced_status {
            let known = self.components().get(&record.component_key).cloned();
            match known {
                Some(component) => {
                    status_applied =
                        self.push_status(&component, status).await == UpdateOutcome::Applied;
                }
                None => error!(
                    component = %component_name,
                    %status,
                    "cannot force status on unknown component"
                ),
            }
        }

        Ok(OverrideAck {
            record,
            status_applied,
        })
    }

    pub async fn run_cycle(&self) -> CycleReport {
        let mut state = self.cycle.lock().await;
        state.cycles += 1;
        let cycle = state.cycles;
        let started_at = Utc::now();
        info!(cycle, "synchronizing status page components");

        let refresh = self.aggregator.refresh(&self.settings.credentials).await;
        if let Some(reason) = self.partial_refresh_reason(&refresh) {
            warn!(cycle, %reason, "keeping previous caches, no updates this cycle");
            return CycleReport::skipped(cycle, started_at, reason);
        }

        let components = match timeout(
            self.settings.request_timeout,
            self.status_page.list_components(),
        )
        .await
        {
            Ok(Ok(components)) => components,
            Ok(Err(err)) => {
                let reason = format!("component listing failed: {err:#}");
                warn!(cycle, %reason, "keeping previous caches, no updates this cycle");
                return CycleReport::skipped(cycle, started_at, reason);
            }
            Err(_) => {
                let reason = format!(
                    "component listing timed out after {:?}",
                    self.settings.request_timeout
                );
                warn!(cycle, %reason, "keeping previous caches, no updates this cycle");
                return CycleReport::skipped(cycle, started_at, reason);
            }
        };

        state.policies = refresh.policies;
        state.oldest = refresh.oldest;
        self.replace_components(&components);

        let mut ordered = components;
        ordered.sort_by_key(Component::key);

        let mut reports = Vec::with_capacity(ordered.len());
        for component in &ordered {
            let decision = self.decide(component, &state);
            let update = match &decision {
                Decision::Unmanaged => {
                    debug!(component = %component.name, "component not linked to a policy, skipping");
                    None
                }
                Decision::Overridden => {
                    info!(component = %component.name, "component is overridden, skipping");
                    None
                }
                Decision::InSync { .. } => None,
                Decision::Transition { target, violation } => {
                    Some(self.apply(component, *target, violation.clone()).await)
                }
            };
            reports.push(ComponentReport {
                name: component.name.clone(),
                decision,
                update,
            });
        }

        let report = CycleReport {
            cycle,
            started_at,
            outcome: CycleOutcome::Completed,
            components: reports,
        };
        info!(
            cycle,
            components = report.components.len(),
            updated = report.updates_issued() - report.updates_failed(),
            failed = report.updates_failed(),
            unmanaged = report.count(|d| matches!(d, Decision::Unmanaged)),
            overridden = report.count(|d| matches!(d, Decision::Overridden)),
            "reconciliation cycle finished"
        );
        report
    }

    fn partial_refresh_reason(&self, refresh: &Refresh) -> Option<String> {
        if refresh.is_complete() {
            return None;
        }
        let detail = refresh
            .failures
            .iter()
            .map(|f| format!("{} {} page {}: {}", f.credential, f.listing, f.page, f.error))
            .collect::<Vec<_>>()
            .join("; ");
        match self.settings.on_fetch_failure {
            FetchFailurePolicy::SkipCycle => Some(format!("alerting refresh incomplete ({detail})")),
            FetchFailurePolicy::ProceedPartial => {
                warn!(%detail, "alerting refresh incomplete, proceeding with partial data");
                None
            }
        }
    }

    fn replace_components(&self, components: &[Component]) {
        let snapshot: HashMap<String, Component> = components
            .iter()
            .map(|component| (component.key(), component.clone()))
            .collect();
        *self
            .components
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
    }

    fn decide(&self, component: &Component, state: &CycleState) -> Decision {
        let key = component.key();
        if !state.policies.contains_key(&key) {
            return Decision::Unmanaged;
        }
        if self.overrides.is_active(&key) {
            return Decision::Overridden;
        }

        let violation = state.oldest.get(&key);
        let target = violation
            .map(|v| self.settings.thresholds.classify(v.duration))
            .unwrap_or(ComponentStatus::Operational);

        if target.matches(&component.status) {
            Decision::InSync { status: target }
        } else {
            Decision::Transition {
                target,
                violation: violation.cloned(),
            }
        }
    }

    async fn apply(
        &self,
        component: &Component,
        target: ComponentStatus,
        violation: Option<Violation>,
    ) -> UpdateOutcome {
        info!(
            component = %component.name,
            from = %component.status,
            to = %target,
            duration = ?violation.as_ref().map(|v| v.duration),
            "status change detected"
        );
        let transition = Transition::new(component.clone(), target, violation);
        self.observers.notify(&transition).await;
        self.push_status(component, target).await
    }

    async fn push_status(&self, component: &Component, status: ComponentStatus) -> UpdateOutcome {
        let call = self.status_page.update_status(component, status);
        match timeout(self.settings.request_timeout, call).await {
            Ok(Ok(())) => {
                info!(component = %component.name, %status, "status updated");
                UpdateOutcome::Applied
            }
            Ok(Err(err)) => {
                error!(component = %component.name, %status, error = %err, "status update failed");
                UpdateOutcome::Failed(err.to_string())
            }
            Err(_) => {
                let timeout = self.settings.request_timeout;
                error!(component = %component.name, %status, ?timeout, "status update timed out");
                UpdateOutcome::Failed(format!("timed out after {timeout:?}"))
            }
        }
    }
}
