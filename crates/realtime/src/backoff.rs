use std::cmp;
use std::time::Duration;
use telehealth_core::config::ReconnectConfig;

/// Whether a dropped connection is re-established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    Never,
    Backoff(ReconnectConfig),
}

impl ReconnectPolicy {
    /// Delay before reconnect `attempt` (1-based), or `None` once attempts
    /// are exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match self {
            ReconnectPolicy::Never => None,
            ReconnectPolicy::Backoff(config) if attempt > config.max_attempts => None,
            ReconnectPolicy::Backoff(config) => Some(backoff_delay(config, attempt)),
        }
    }
}

/// `initial * 2^(attempt-1)`, capped at `max_delay`.
pub fn backoff_delay(config: &ReconnectConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    let factor = 1u32 << exponent;
    cmp::min(config.initial_delay.saturating_mul(factor), config.max_delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
            max_attempts: 6,
        }
    }

    #[test]
    fn test_delay_doubles_until_cap() {
        let config = config();
        let delays: Vec<u64> = (1..=6)
            .map(|n| backoff_delay(&config, n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![500, 1000, 2000, 4000, 4000, 4000]);
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        assert_eq!(backoff_delay(&config(), u32::MAX), Duration::from_secs(4));
    }

    #[test]
    fn test_policy_exhaustion() {
        let policy = ReconnectPolicy::Backoff(config());
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(6), Some(Duration::from_secs(4)));
        assert_eq!(policy.delay_for(7), None);
        assert_eq!(ReconnectPolicy::Never.delay_for(1), None);
    }
}
