use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{KvError, KvResult};

/// How a store retries conditional saves that lost a version race.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total load-modify-save cycles before giving up, first one included.
    pub max_attempts: u32,
    /// Delay after the first conflict, in milliseconds. Doubles per attempt.
    pub initial_backoff_ms: u64,
    /// Upper bound on a single delay, in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 10,
            max_backoff_ms: 200,
        }
    }
}

impl RetryPolicy {
    /// Retry immediately, with no sleeping between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Attempts actually made; a zero setting still runs once.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Configuration for a key-value store handle.
///
/// Parsed from TOML:
///
/// ```toml
/// [retry]
/// max_attempts = 5
/// initial_backoff_ms = 10
/// max_backoff_ms = 200
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub retry: RetryPolicy,
}

impl StoreConfig {
    /// Parse a configuration from TOML text. Missing fields take defaults.
    pub fn from_toml_str(text: &str) -> KvResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| KvError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot work.
    pub fn validate(&self) -> KvResult<()> {
        if self.retry.max_attempts == 0 {
            return Err(KvError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(KvError::Config(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn with_retry(retry: RetryPolicy) -> Self {
        Self { retry }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.retry.max_attempts, 5);
        assert_eq!(c.retry.initial_backoff_ms, 10);
        assert_eq!(c.retry.max_backoff_ms, 200);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff_for(1), Duration::from_millis(10));
        assert_eq!(p.backoff_for(2), Duration::from_millis(20));
        assert_eq!(p.backoff_for(3), Duration::from_millis(40));
        assert_eq!(p.backoff_for(6), Duration::from_millis(200));
        assert_eq!(p.backoff_for(200), Duration::from_millis(200));
    }

    #[test]
    fn immediate_policy_never_sleeps() {
        let p = RetryPolicy::immediate(3);
        assert_eq!(p.attempts(), 3);
        assert_eq!(p.backoff_for(1), Duration::ZERO);
        assert_eq!(p.backoff_for(3), Duration::ZERO);
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        assert_eq!(RetryPolicy::immediate(0).attempts(), 1);
    }

    #[test]
    fn parse_full_toml() {
        let c = StoreConfig::from_toml_str(
            "[retry]\nmax_attempts = 8\ninitial_backoff_ms = 5\nmax_backoff_ms = 50\n",
        )
        .unwrap();
        assert_eq!(
            c.retry,
            RetryPolicy {
                max_attempts: 8,
                initial_backoff_ms: 5,
                max_backoff_ms: 50,
            }
        );
    }

    #[test]
    fn parse_partial_toml_uses_defaults() {
        let c = StoreConfig::from_toml_str("[retry]\nmax_attempts = 2\n").unwrap();
        assert_eq!(c.retry.max_attempts, 2);
        assert_eq!(c.retry.initial_backoff_ms, 10);

        let c = StoreConfig::from_toml_str("").unwrap();
        assert_eq!(c, StoreConfig::default());
    }

    #[test]
    fn reject_bad_toml() {
        assert!(matches!(
            StoreConfig::from_toml_str("[retry]\nmax_attempts = \"many\"\n"),
            Err(KvError::Config(_))
        ));
        assert!(matches!(
            StoreConfig::from_toml_str("[retry]\nmax_attempts = 0\n"),
            Err(KvError::Config(_))
        ));
        assert!(matches!(
            StoreConfig::from_toml_str(
                "[retry]\ninitial_backoff_ms = 500\nmax_backoff_ms = 100\n"
            ),
            Err(KvError::Config(_))
        ));
    }
}
