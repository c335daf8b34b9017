//! Operation-level restart configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::RolloutError;

/// Default number of instances restarted per batch.
pub const DEFAULT_BATCH_SIZE: usize = 1;

/// Default time an instance has to reach RUNNING after a restart.
pub const DEFAULT_RESTART_THRESHOLD: Duration = Duration::from_secs(60);

/// Default time an instance must stay RUNNING to count as healthy.
pub const DEFAULT_WATCH_DURATION: Duration = Duration::from_secs(45);

/// Default interval between health polls.
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Settings fixed for the lifetime of one rolling restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartSettings {
    pub batch_size: usize,
    pub restart_threshold: Duration,
    pub watch_duration: Duration,
    pub health_check_interval: Duration,
    /// Failures tolerated per instance before aborting.
    pub max_per_instance_failures: u32,
    /// Failures tolerated across the whole operation before aborting.
    pub max_total_failures: u32,
}

impl Default for RestartSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            restart_threshold: DEFAULT_RESTART_THRESHOLD,
            watch_duration: DEFAULT_WATCH_DURATION,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            max_per_instance_failures: 0,
            max_total_failures: 0,
        }
    }
}

impl RestartSettings {
    pub fn validate(&self) -> Result<(), RolloutError> {
        if self.batch_size == 0 {
            return Err(RolloutError::InvalidSettings(
                "batch size must be greater than 0".to_string(),
            ));
        }
        if self.watch_duration.is_zero() {
            return Err(RolloutError::InvalidSettings(
                "watch duration must be greater than 0".to_string(),
            ));
        }
        if self.health_check_interval.is_zero() {
            return Err(RolloutError::InvalidSettings(
                "health check interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = RestartSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.batch_size, 1);
        assert_eq!(settings.restart_threshold, Duration::from_secs(60));
        assert_eq!(settings.watch_duration, Duration::from_secs(45));
    }

    #[test]
    fn test_rejects_zero_batch() {
        let settings = RestartSettings {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(RolloutError::InvalidSettings(msg)) if msg.contains("batch size")
        ));
    }

    #[test]
    fn test_rejects_zero_watch() {
        let settings = RestartSettings {
            watch_duration: Duration::ZERO,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
