//! Reconciliation engine: aggregation, overrides, observers and scheduling.

pub mod aggregator;
pub mod health;
pub mod observers;
pub mod overrides;
pub mod reconciler;
pub mod scheduler;

pub use aggregator::{FetchFailure, Listing, Refresh, ViolationAggregator};
pub use health::{HealthReport, check_health};
pub use observers::{DispatchReport, ObserverRegistry};
pub use overrides::OverrideStore;
pub use reconciler::{
    ComponentReport, CycleOutcome, CycleReport, Decision, OverrideAck, Reconciler,
    ReconcilerSettings, UpdateOutcome,
};
pub use scheduler::{CycleScheduler, SchedulerHandle};
