#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use statuskeeper_application::{Reconciler, ReconcilerSettings};
use statuskeeper_domain::{
    AlertPolicy, ApiKey, Component, ComponentStatus, FetchFailurePolicy, Thresholds, Transition,
    Violation,
};
use statuskeeper_ports::{AlertingPort, StatusObserver, StatusPagePort};

/// Single-page alerting backend. Data is keyed by credential.
#[derive(Default)]
pub struct FakeAlerting {
    policies: Mutex<HashMap<String, Vec<AlertPolicy>>>,
    violations: Mutex<HashMap<String, Vec<Violation>>>,
    failing: Mutex<Vec<String>>,
    hanging: Mutex<Vec<String>>,
}

impl FakeAlerting {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn policy(&self, credential: &str, name: &str) {
        self.policies
            .lock()
            .unwrap()
            .entry(credential.to_string())
            .or_default()
            .push(AlertPolicy::new(name));
    }

    pub fn set_violations(&self, credential: &str, violations: Vec<Violation>) {
        self.violations
            .lock()
            .unwrap()
            .insert(credential.to_string(), violations);
    }

    /// Violation listings for `credential` error out until cleared.
    pub fn fail_violations(&self, credential: &str, failing: bool) {
        let mut list = self.failing.lock().unwrap();
        list.retain(|c| c != credential);
        if failing {
            list.push(credential.to_string());
        }
    }

    /// Violation listings for `credential` never answer.
    pub fn hang_violations(&self, credential: &str) {
        self.hanging.lock().unwrap().push(credential.to_string());
    }
}

#[async_trait]
impl AlertingPort for FakeAlerting {
    async fn list_policies(&self, credential: &ApiKey, page: u32) -> Result<Vec<AlertPolicy>> {
        if page > 1 {
            return Ok(Vec::new());
        }
        Ok(self
            .policies
            .lock()
            .unwrap()
            .get(credential.expose())
            .cloned()
            .unwrap_or_default())
    }

    async fn list_open_violations(&self, credential: &ApiKey, page: u32) -> Result<Vec<Violation>> {
        let hangs = self
            .hanging
            .lock()
            .unwrap()
            .iter()
            .any(|c| c == credential.expose());
        if hangs {
            std::future::pending::<()>().await;
        }
        if self
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|c| c == credential.expose())
        {
            anyhow::bail!("503 from alerting backend");
        }
        if page > 1 {
            return Ok(Vec::new());
        }
        Ok(self
            .violations
            .lock()
            .unwrap()
            .get(credential.expose())
            .cloned()
            .unwrap_or_default())
    }

    async fn health_check(&self, _credential: &ApiKey) -> Result<()> {
        Ok(())
    }
}

/// In-memory status page. Successful updates are applied to the stored
/// components so the next listing reflects them.
#[derive(Default)]
pub struct FakeStatusPage {
    components: Mutex<Vec<Component>>,
    updates: Mutex<Vec<(String, ComponentStatus)>>,
    events: Option<Arc<Mutex<Vec<String>>>>,
    fail_listing: AtomicBool,
    failing_updates: Mutex<VecDeque<String>>,
    hanging_updates: Mutex<VecDeque<String>>,
    list_delay: Mutex<Option<Duration>>,
    listing_in_flight: AtomicUsize,
    max_listing_in_flight: AtomicUsize,
}

impl FakeStatusPage {
    pub fn new(components: Vec<Component>) -> Arc<Self> {
        Arc::new(Self {
            components: Mutex::new(components),
            ..Self::default()
        })
    }

    /// Shares an event log with observers so call order can be asserted.
    pub fn with_events(components: Vec<Component>, events: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            components: Mutex::new(components),
            events: Some(events),
            ..Self::default()
        })
    }

    pub fn updates(&self) -> Vec<(String, ComponentStatus)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn status_of(&self, name: &str) -> Option<String> {
        self.components
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.status.clone())
    }

    pub fn set_fail_listing(&self, failing: bool) {
        self.fail_listing.store(failing, Ordering::SeqCst);
    }

    /// The next update for `name` fails once.
    pub fn fail_next_update(&self, name: &str) {
        self.failing_updates
            .lock()
            .unwrap()
            .push_back(name.to_string());
    }

    /// The next update for `name` never answers.
    pub fn hang_next_update(&self, name: &str) {
        self.hanging_updates
            .lock()
            .unwrap()
            .push_back(name.to_string());
    }

    pub fn set_list_delay(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = Some(delay);
    }

    pub fn max_listing_in_flight(&self) -> usize {
        self.max_listing_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusPagePort for FakeStatusPage {
    async fn list_components(&self) -> Result<Vec<Component>> {
        let in_flight = self.listing_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_listing_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);

        let delay = *self.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.listing_in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_listing.load(Ordering::SeqCst) {
            anyhow::bail!("statuspage unavailable");
        }
        Ok(self.components.lock().unwrap().clone())
    }

    async fn update_status(&self, component: &Component, status: ComponentStatus) -> Result<()> {
        if let Some(events) = &self.events {
            events
                .lock()
                .unwrap()
                .push(format!("update:{}:{}", component.name, status));
        }
        let hangs = {
            let mut hanging = self.hanging_updates.lock().unwrap();
            match hanging.iter().position(|n| *n == component.name) {
                Some(pos) => hanging.remove(pos).is_some(),
                None => false,
            }
        };
        if hangs {
            std::future::pending::<()>().await;
        }
        {
            let mut failing = self.failing_updates.lock().unwrap();
            if let Some(pos) = failing.iter().position(|n| *n == component.name) {
                failing.remove(pos);
                anyhow::bail!("422 Unprocessable Entity");
            }
        }
        self.updates
            .lock()
            .unwrap()
            .push((component.name.clone(), status));
        if let Some(stored) = self
            .components
            .lock()
            .unwrap()
            .iter_mut()
            .find(|c| c.id == component.id)
        {
            stored.status = status.as_str().to_string();
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

pub enum ObserverMode {
    Record,
    Fail,
    Panic,
}

pub struct RecordingObserver {
    mode: ObserverMode,
    events: Arc<Mutex<Vec<String>>>,
    seen: Mutex<Vec<Transition>>,
}

impl RecordingObserver {
    pub fn new(mode: ObserverMode, events: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            mode,
            events,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<Transition> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusObserver for RecordingObserver {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, transition: &Transition) -> Result<()> {
        self.events.lock().unwrap().push(format!(
            "notify:{}:{}",
            transition.component.name, transition.target
        ));
        self.seen.lock().unwrap().push(transition.clone());
        match self.mode {
            ObserverMode::Record => Ok(()),
            ObserverMode::Fail => anyhow::bail!("webhook rejected"),
            ObserverMode::Panic => panic!("observer bug"),
        }
    }
}

pub fn settings(credentials: &[&str], policy: FetchFailurePolicy) -> ReconcilerSettings {
    ReconcilerSettings {
        credentials: credentials.iter().map(|c| ApiKey::new(*c)).collect(),
        thresholds: Thresholds::default(),
        request_timeout: Duration::from_secs(10),
        observer_timeout: Duration::from_secs(5),
        on_fetch_failure: policy,
    }
}

pub fn reconciler(
    alerting: &Arc<FakeAlerting>,
    status_page: &Arc<FakeStatusPage>,
    settings: ReconcilerSettings,
) -> Arc<Reconciler> {
    Arc::new(Reconciler::new(
        Arc::clone(alerting) as Arc<dyn AlertingPort>,
        Arc::clone(status_page) as Arc<dyn StatusPagePort>,
        settings,
    ))
}
