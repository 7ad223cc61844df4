use std::time::Duration;

/// Bounded exponential backoff without jitter: `base * 2^attempt`, capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl RetryPolicy {
    pub const NONE: RetryPolicy = RetryPolicy {
        max_retries: 0,
        backoff_base: Duration::from_secs(1),
        backoff_max: Duration::from_secs(1),
    };

    pub fn exponential(max_retries: u32, backoff_max_secs: u64) -> Self {
        RetryPolicy {
            max_retries,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(backoff_max_secs),
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.backoff_base
            .checked_mul(factor)
            .unwrap_or(self.backoff_max)
            .min(self.backoff_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_capped() {
        let policy = RetryPolicy::exponential(3, 600);
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(8));
        assert_eq!(policy.delay(20), Duration::from_secs(600));
        assert_eq!(policy.delay(64), Duration::from_secs(600));
    }
}
