//! Coordinator configuration

use std::time::Duration;

/// Tuning options recognized by the coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Wall-clock deadline for the whole prepare phase, measured from
    /// entry into `Preparing`. Any participant unresolved at the
    /// deadline counts as a negative vote.
    pub prepare_timeout: Duration,

    /// Budget for a single participant call within a phase
    pub per_call_timeout: Duration,

    /// Total commit attempts per participant. Zero behaves as one
    /// attempt with no retry.
    pub commit_max_retries: u32,

    /// Base delay for commit retry backoff (`base * 2^attempt`)
    pub backoff_base: Duration,

    /// Upper bound of the uniform jitter added to each backoff delay
    pub backoff_jitter: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            prepare_timeout: Duration::from_secs(30),
            per_call_timeout: Duration::from_secs(5),
            commit_max_retries: 3,
            backoff_base: Duration::from_millis(100),
            backoff_jitter: Duration::from_millis(50),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_sane() {
        let config = CoordinatorConfig::default();
        assert!(config.per_call_timeout <= config.prepare_timeout);
        assert!(config.commit_max_retries >= 1);
    }
}
