//! Domain models and invariants.

pub mod alerting;
pub mod component;
pub mod config;
pub mod credentials;
pub mod names;
pub mod overrides;
pub mod severity;
pub mod status;
pub mod transition;

pub use alerting::{AlertPolicy, OldestViolations, PolicyIndex, Violation};
pub use component::Component;
pub use config::{
    FetchFailurePolicy, NewRelicConfig, NotificationChannelConfig, NotificationsConfig,
    StatusKeeperConfig, StatusPageConfig, TimeoutsConfig,
};
pub use credentials::ApiKey;
pub use names::normalize_name;
pub use overrides::{MAX_OVERRIDE_SECONDS, Override};
pub use severity::{ThresholdRule, Thresholds, classify};
pub use status::ComponentStatus;
pub use transition::Transition;
