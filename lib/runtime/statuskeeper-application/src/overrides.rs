//! Self-expiring manual overrides keyed by normalized component name.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use statuskeeper_domain::{ComponentStatus, Override, normalize_name};

// Used when `now + ttl` does not fit in an Instant.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

struct Entry {
    record: Override,
    deadline: Instant,
    generation: u64,
    expiry: Option<JoinHandle<()>>,
}

impl Entry {
    fn cancel_expiry(&mut self) {
        if let Some(handle) = self.expiry.take() {
            handle.abort();
        }
    }
}

/// Shared override table. Cloning yields another handle to the same table.
///
/// At most one override exists per key; `set` on an existing key replaces
/// it and cancels the previous expiry timer. Each registration schedules a
/// fire-once timer that removes the entry when its TTL elapses. Lookups
/// also compare against the deadline, so an override is never reported
/// active past its TTL even if its timer has not run yet.
#[derive(Clone, Default)]
pub struct OverrideStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    generation: Arc<AtomicU64>,
}

impl OverrideStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(
        &self,
        component_name: &str,
        ttl_seconds: u64,
        forced_status: Option<ComponentStatus>,
    ) -> Override {
        let record = Override::new(component_name, ttl_seconds, forced_status);
        let key = record.component_key.clone();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let now = Instant::now();
        let deadline = now
            .checked_add(Duration::from_secs(ttl_seconds))
            .unwrap_or(now + FAR_FUTURE);

        let mut entries = lock(&self.entries);
        let expiry = self.spawn_expiry(key.clone(), generation, deadline);
        let previous = entries.insert(
            key.clone(),
            Entry {
                record: record.clone(),
                deadline,
                generation,
                expiry,
            },
        );
        if let Some(mut previous) = previous {
            previous.cancel_expiry();
            debug!(component = %key, "replaced existing override");
        }
        info!(
            component = %key,
            seconds = ttl_seconds,
            forced_status = ?forced_status,
            "override registered"
        );
        record
    }

    /// Timers need a tokio runtime; without one the deadline check in the
    /// lookups still expires the entry.
    fn spawn_expiry(&self, key: String, generation: u64, deadline: Instant) -> Option<JoinHandle<()>> {
        let runtime = Handle::try_current().ok()?;
        let entries = Arc::clone(&self.entries);
        Some(runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let mut entries = lock(&entries);
            let current = entries
                .get(&key)
                .is_some_and(|entry| entry.generation == generation);
            if current {
                entries.remove(&key);
                info!(component = %key, "override expired");
            }
        }))
    }

    pub fn is_active(&self, component: &str) -> bool {
        self.get(component).is_some()
    }

    pub fn get(&self, component: &str) -> Option<Override> {
        let key = normalize_name(component);
        let mut entries = lock(&self.entries);
        let now = Instant::now();
        match entries.get(&key) {
            Some(entry) if entry.deadline > now => Some(entry.record.clone()),
            Some(_) => {
                if let Some(mut stale) = entries.remove(&key) {
                    stale.cancel_expiry();
                }
                None
            }
            None => None,
        }
    }

    /// Removes an override before its TTL elapses.
    pub fn clear(&self, component: &str) -> Option<Override> {
        let key = normalize_name(component);
        let mut removed = lock(&self.entries).remove(&key)?;
        removed.cancel_expiry();
        info!(component = %key, "override cleared");
        Some(removed.record)
    }

    /// Active overrides, ordered by key.
    pub fn list(&self) -> Vec<Override> {
        let now = Instant::now();
        let entries = lock(&self.entries);
        let mut active: Vec<Override> = entries
            .values()
            .filter(|entry| entry.deadline > now)
            .map(|entry| entry.record.clone())
            .collect();
        active.sort_by(|a, b| a.component_key.cmp(&b.component_key));
        active
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn test_override_expires_after_ttl() {
        let store = OverrideStore::new();
        store.set("API", 5, None);

        assert!(store.is_active("api"));
        advance(Duration::from_secs(4)).await;
        assert!(store.is_active("Api"));
        advance(Duration::from_secs(2)).await;
        assert!(!store.is_active("api"));
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_timer_removes_entry() {
        let store = OverrideStore::new();
        store.set("db", 1, None);

        advance(Duration::from_secs(2)).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(lock(&store.entries).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacement_cancels_previous_expiry() {
        let store = OverrideStore::new();
        store.set("api", 5, None);
        advance(Duration::from_secs(3)).await;

        let replaced = store.set("API", 10, Some(ComponentStatus::MajorOutage));
        assert_eq!(store.len(), 1);

        advance(Duration::from_secs(3)).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(store.get("api"), Some(replaced));

        advance(Duration::from_secs(8)).await;
        assert!(!store.is_active("api"));
    }

    #[tokio::test]
    async fn test_clear_removes_override() {
        let store = OverrideStore::new();
        store.set("queue", 60, None);
        let cleared = store.clear("Queue").unwrap();
        assert_eq!(cleared.component_key, "queue");
        assert!(!store.is_active("queue"));
        assert!(store.clear("queue").is_none());
    }

    #[tokio::test]
    async fn test_list_is_sorted_and_shared_between_clones() {
        let store = OverrideStore::new();
        let handle = store.clone();
        handle.set("zeta", 60, None);
        handle.set("alpha", 60, Some(ComponentStatus::UnderMaintenance));

        let keys: Vec<String> = store.list().into_iter().map(|o| o.component_key).collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_works_without_runtime() {
        let store = OverrideStore::new();
        store.set("api", 60, None);
        assert!(store.is_active("api"));

        store.set("db", 0, None);
        assert!(!store.is_active("db"));
    }
}
