//! Retry policy for capacity-limited gateway requests.
//!
//! Only [`GatewayError::CapacityExceeded`] is retried. The delay grows
//! linearly with the attempt number: `attempt * backoff_step`.

use std::time::Duration;

use crate::config::RemediationSettings;

use super::gateway::GatewayError;

/// Backoff schedule for capacity errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Automatic retries after the first attempt.
    pub max_retries: u32,
    /// Delay unit multiplied by the attempt number.
    pub backoff_step: Duration,
}

impl RetryPolicy {
    /// Create a new RetryPolicy from configuration settings.
    pub fn new(config: &RemediationSettings) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_step: Duration::from_millis(config.backoff_step_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }

    /// Check whether an error should be retried after `attempts_made` retries.
    pub fn should_retry(&self, error: &GatewayError, attempts_made: u32) -> bool {
        error.is_capacity() && attempts_made < self.max_retries
    }

    /// The complete list of delays, in order.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_retries).map(|n| self.delay_for(n)).collect()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_step: Duration::from_millis(2000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.schedule(),
            vec![Duration::from_millis(2000), Duration::from_millis(4000)]
        );
    }

    #[test]
    fn test_new_from_config() {
        let config = RemediationSettings {
            max_retries: 3,
            backoff_step_ms: 500,
            ..Default::default()
        };
        let policy = RetryPolicy::new(&config);

        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(3), Duration::from_millis(1500));
    }

    #[test]
    fn test_only_capacity_errors_are_retried() {
        let policy = RetryPolicy::default();
        let capacity = GatewayError::CapacityExceeded("busy".to_string());
        let failure = GatewayError::Failure("404".to_string());

        assert!(policy.should_retry(&capacity, 0));
        assert!(!policy.should_retry(&failure, 0));
    }

    #[test]
    fn test_retries_are_bounded() {
        let policy = RetryPolicy::default();
        let capacity = GatewayError::CapacityExceeded("busy".to_string());

        assert!(policy.should_retry(&capacity, 1));
        assert!(!policy.should_retry(&capacity, 2));
        assert!(!policy.should_retry(&capacity, 5));
    }

    #[test]
    fn test_zero_retries() {
        let policy = RetryPolicy {
            max_retries: 0,
            ..Default::default()
        };
        assert!(policy.schedule().is_empty());
        assert!(!policy.should_retry(&GatewayError::CapacityExceeded(String::new()), 0));
    }
}
