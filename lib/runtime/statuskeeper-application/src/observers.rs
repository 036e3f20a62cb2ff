//! Fan-out of detected transitions to registered observers.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures::FutureExt;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use statuskeeper_domain::Transition;
use statuskeeper_ports::StatusObserver;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Observers are called one after another in registration order. A failing,
/// panicking or slow observer is logged and skipped; it never affects the
/// others or the caller.
pub struct ObserverRegistry {
    observers: RwLock<Vec<Arc<dyn StatusObserver>>>,
    call_timeout: Duration,
}

impl ObserverRegistry {
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
            call_timeout,
        }
    }

    pub fn add(&self, observer: Arc<dyn StatusObserver>) {
        debug!(observer = observer.name(), "observer registered");
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<dyn StatusObserver>> {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn notify(&self, transition: &Transition) -> DispatchReport {
        let mut report = DispatchReport::default();

        for observer in self.snapshot() {
            let call = AssertUnwindSafe(observer.notify(transition)).catch_unwind();
            match timeout(self.call_timeout, call).await {
                Ok(Ok(Ok(()))) => report.delivered += 1,
                Ok(Ok(Err(err))) => {
                    report.failed += 1;
                    warn!(
                        observer = observer.name(),
                        component = %transition.component.name,
                        error = %err,
                        "observer failed"
                    );
                }
                Ok(Err(_)) => {
                    report.failed += 1;
                    error!(
                        observer = observer.name(),
                        component = %transition.component.name,
                        "observer panicked"
                    );
                }
                Err(_) => {
                    report.failed += 1;
                    warn!(
                        observer = observer.name(),
                        component = %transition.component.name,
                        timeout = ?self.call_timeout,
                        "observer timed out"
                    );
                }
            }
        }

        report
    }
}
