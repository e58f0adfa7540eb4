#![forbid(unsafe_code)]

use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(100);
pub const DEFAULT_ORPHAN_SCAN_BATCH: usize = 100;
pub const DEFAULT_TICKET_TTL: Duration = Duration::from_secs(60 * 60);

/// Queue policy knobs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueConfig {
    /// Attempts a job gets before `retry` stops spawning new ones (unless forced).
    pub max_attempts: u32,
    /// Retry automatically when a caller reports `failed`.
    pub retry_on_fail: bool,
    /// A running job untouched for this long is an orphan.
    pub heartbeat_timeout: Duration,
    /// A ticket older than this no longer shields its job from reaping.
    pub ticket_ttl: Duration,
    pub orphan_scan_batch: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_on_fail: false,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            ticket_ttl: DEFAULT_TICKET_TTL,
            orphan_scan_batch: DEFAULT_ORPHAN_SCAN_BATCH,
        }
    }
}

impl QueueConfig {
    /// Defaults overridden by `GQ_MAX_RETRIES`, `GQ_RETRY_ON_FAIL`,
    /// `GQ_HEARTBEAT_TIMEOUT_S` and `GQ_TICKET_TTL_S`. Unparseable values are
    /// ignored.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: env_var("GQ_MAX_RETRIES")
                .and_then(|v| v.parse().ok())
                .filter(|v: &u32| *v >= 1)
                .unwrap_or(defaults.max_attempts),
            retry_on_fail: env_var("GQ_RETRY_ON_FAIL")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.retry_on_fail),
            heartbeat_timeout: env_var("GQ_HEARTBEAT_TIMEOUT_S")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.heartbeat_timeout),
            ticket_ttl: env_var("GQ_TICKET_TTL_S")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.ticket_ttl),
            orphan_scan_batch: defaults.orphan_scan_batch,
        }
    }

    pub(crate) fn heartbeat_timeout_ms(&self) -> i64 {
        duration_ms(self.heartbeat_timeout)
    }

    pub(crate) fn ticket_ttl_ms(&self) -> i64 {
        duration_ms(self.ticket_ttl)
    }
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = QueueConfig::default();
        assert_eq!(cfg.max_attempts, 3);
        assert!(!cfg.retry_on_fail);
        assert_eq!(cfg.heartbeat_timeout_ms(), 100_000);
        assert_eq!(cfg.ticket_ttl_ms(), 3_600_000);
    }
}
