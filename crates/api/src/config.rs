//! Environment-driven server configuration.

use std::time::Duration;

/// Server settings, read from the environment with sensible defaults.
///
/// - `JOBTRAIL_BIND`: listen address (default `0.0.0.0:8080`)
/// - `DATABASE_URL`: Postgres job store; absent means in-memory
/// - `JOBTRAIL_STALE_AFTER_SECS`: watchdog staleness threshold (default 600)
/// - `JOBTRAIL_WATCHDOG_INTERVAL_SECS`: watchdog scan interval (default 120)
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind: String,
    pub database_url: Option<String>,
    pub stale_after: Duration,
    pub watchdog_interval: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            database_url: None,
            stale_after: Duration::from_secs(600),
            watchdog_interval: Duration::from_secs(120),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind: std::env::var("JOBTRAIL_BIND").unwrap_or(defaults.bind),
            database_url: std::env::var("DATABASE_URL").ok(),
            stale_after: env_secs("JOBTRAIL_STALE_AFTER_SECS", defaults.stale_after),
            watchdog_interval: env_secs("JOBTRAIL_WATCHDOG_INTERVAL_SECS", defaults.watchdog_interval),
        }
    }
}

fn env_secs(var: &str, default: Duration) -> Duration {
    match std::env::var(var) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                tracing::warn!(var, value = %raw, "not a number of seconds; using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = ApiConfig::default();
        assert_eq!(cfg.bind, "0.0.0.0:8080");
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.stale_after, Duration::from_secs(600));
        assert_eq!(cfg.watchdog_interval, Duration::from_secs(120));
    }
}
