use std::time::Duration;

/// Backoff schedule for one activity.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub backoff_coefficient: f64,
    pub maximum_interval: Duration,
}

impl RetryPolicy {
    /// Policy applied to activities that do not declare their own:
    /// 1s doubling up to 100s, ten attempts.
    pub fn substrate_default() -> Self {
        Self {
            max_attempts: 10,
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(100),
        }
    }

    /// Delay before attempt `attempt + 1`, after `attempt` failed.
    /// delay = initial_interval * backoff_coefficient^(attempt - 1), capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let secs = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        Duration::from_secs_f64(secs.min(self.maximum_interval.as_secs_f64()))
    }
}

/// Per-activity execution contract: how long one attempt may take and how
/// failures are retried.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityOptions {
    pub start_to_close_timeout: Duration,
    pub retry: RetryPolicy,
}

impl ActivityOptions {
    /// 5 minutes per attempt, 3 attempts, 2s initial backoff doubling.
    pub fn generate_content() -> Self {
        Self {
            start_to_close_timeout: Duration::from_secs(5 * 60),
            retry: RetryPolicy {
                max_attempts: 3,
                initial_interval: Duration::from_secs(2),
                backoff_coefficient: 2.0,
                maximum_interval: Duration::from_secs(200),
            },
        }
    }

    /// 30 seconds per attempt under the default policy.
    pub fn send_reminder() -> Self {
        Self {
            start_to_close_timeout: Duration::from_secs(30),
            retry: RetryPolicy::substrate_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_backoff_doubles_from_two_seconds() {
        let policy = ActivityOptions::generate_content().retry;
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(8));
    }

    #[test]
    fn default_backoff_is_capped() {
        let policy = RetryPolicy::substrate_default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(7), Duration::from_secs(64));
        assert_eq!(policy.delay_for_attempt(8), Duration::from_secs(100));
        assert_eq!(policy.delay_for_attempt(30), Duration::from_secs(100));
    }

    #[test]
    fn reminder_timeout_is_thirty_seconds() {
        let options = ActivityOptions::send_reminder();
        assert_eq!(options.start_to_close_timeout, Duration::from_secs(30));
    }
}
