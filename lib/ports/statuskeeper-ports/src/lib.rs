//! Collaborator ports for the reconciliation engine.
//!
//! The engine only talks to the alerting backend, the status page and
//! transition listeners through these traits. Concrete clients live in the
//! adapter crates.

use anyhow::Result;
use async_trait::async_trait;

use statuskeeper_domain::{AlertPolicy, ApiKey, Component, ComponentStatus, Transition, Violation};

/// Paginated read access to the alerting backend.
///
/// Pages start at 1. An empty page marks the end of a listing.
#[async_trait]
pub trait AlertingPort: Send + Sync {
    async fn list_policies(&self, credential: &ApiKey, page: u32) -> Result<Vec<AlertPolicy>>;

    async fn list_open_violations(&self, credential: &ApiKey, page: u32)
    -> Result<Vec<Violation>>;

    async fn health_check(&self, credential: &ApiKey) -> Result<()>;
}

#[async_trait]
pub trait StatusPagePort: Send + Sync {
    async fn list_components(&self) -> Result<Vec<Component>>;

    async fn update_status(&self, component: &Component, status: ComponentStatus) -> Result<()>;

    async fn health_check(&self) -> Result<()>;
}

/// Listener for detected transitions. Called before the status page is
/// updated; errors are logged by the caller and otherwise ignored.
#[async_trait]
pub trait StatusObserver: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, transition: &Transition) -> Result<()>;
}
