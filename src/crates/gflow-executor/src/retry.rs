//! Exponential-backoff retry policy for task attempts

/// Per-task retry configuration
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_s: f64,
    pub exponential_base: f64,
    pub max_delay_s: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_s: 1.0,
            exponential_base: 2.0,
            max_delay_s: 30.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows a failed `attempt` (1-indexed:
    /// `attempt` is the attempt number that just failed). Attempt 1 delays
    /// `base_delay_s`; each subsequent attempt multiplies by
    /// `exponential_base`, capped at `max_delay_s`.
    pub fn delay_for_failed_attempt(&self, attempt: u32) -> f64 {
        let delay = self.base_delay_s * self.exponential_base.powi(attempt as i32 - 1);
        delay.min(self.max_delay_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_for_attempt_one_equals_base_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_failed_attempt(1), 1.0);
    }

    #[test]
    fn test_delay_grows_exponentially_then_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay_s: 1.0,
            exponential_base: 2.0,
            max_delay_s: 30.0,
        };
        assert_eq!(policy.delay_for_failed_attempt(1), 1.0);
        assert_eq!(policy.delay_for_failed_attempt(2), 2.0);
        assert_eq!(policy.delay_for_failed_attempt(3), 4.0);
        assert_eq!(policy.delay_for_failed_attempt(6), 30.0);
    }
}
