//! Transition observers: structured log output and ntfy push messages.

mod logging;
mod ntfy;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use statuskeeper_domain::{NotificationChannelConfig, NotificationsConfig};
use statuskeeper_ports::StatusObserver;

pub use logging::LogObserver;
pub use ntfy::{NtfyObserver, format_message, format_title};

/// Builds every observer the notifications section asks for, in config order
/// with the log observer first.
pub fn observers_from_config(
    config: &NotificationsConfig,
    request_timeout: Duration,
) -> Result<Vec<Arc<dyn StatusObserver>>> {
    let mut observers: Vec<Arc<dyn StatusObserver>> = Vec::new();
    if config.log_transitions {
        observers.push(Arc::new(LogObserver));
    }
    for channel in &config.channels {
        match channel {
            NotificationChannelConfig::Ntfy { url, topic } => {
                observers.push(Arc::new(NtfyObserver::new(url, topic, request_timeout)?));
            }
        }
    }
    Ok(observers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observers_follow_config() {
        let config = NotificationsConfig {
            log_transitions: true,
            channels: vec![NotificationChannelConfig::Ntfy {
                url: "https://ntfy.sh".to_string(),
                topic: "status".to_string(),
            }],
        };
        let observers = observers_from_config(&config, Duration::from_secs(5)).unwrap();
        let names: Vec<&str> = observers.iter().map(|o| o.name()).collect();
        assert_eq!(names, vec!["log", "ntfy"]);
    }

    #[test]
    fn test_no_observers_by_default() {
        let observers =
            observers_from_config(&NotificationsConfig::default(), Duration::from_secs(5)).unwrap();
        assert!(observers.is_empty());
    }
}
