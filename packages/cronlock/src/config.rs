use std::env;
use std::time::Duration;

use dotenvy::dotenv;

/// Scheduler tuning knobs, loaded from environment variables.
///
/// Every value has a default; `from_env` never fails. Durations are read as
/// whole seconds (`CRONLOCK_*_SECS`).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often long-running jobs stamp `heartbeat_at` on their lock row.
    pub heartbeat_interval: Duration,
    /// Age at which a `running` lock with no heartbeat is reaped.
    pub stale_lock_threshold: Duration,
    /// Reaper ticker period.
    pub reaper_interval: Duration,
    /// Age at which a registered-job row is considered dead.
    pub stale_registration_threshold: Duration,
    /// How long `stop()` waits for in-flight job bodies.
    pub shutdown_timeout: Duration,
    /// Deadline for lock acquisition on the critical path.
    pub lock_acquire_timeout: Duration,
    /// Audit rows older than this are deleted by the reaper.
    pub audit_retention: Duration,
    /// `started` audit rows older than this with no running lock are
    /// transitioned to `failed(error="orphaned")`.
    pub orphaned_audit_threshold: Duration,
    /// Minimum spacing between inline (executor-triggered) sweeps per tenant.
    pub inline_sweep_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(2 * 60),
            stale_lock_threshold: Duration::from_secs(10 * 60),
            reaper_interval: Duration::from_secs(5 * 60),
            stale_registration_threshold: Duration::from_secs(7 * 24 * 60 * 60),
            shutdown_timeout: Duration::from_secs(30),
            lock_acquire_timeout: Duration::from_secs(60),
            audit_retention: Duration::from_secs(30 * 24 * 60 * 60),
            orphaned_audit_threshold: Duration::from_secs(60 * 60),
            inline_sweep_interval: Duration::from_secs(60 * 60),
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults above. Loads `.env` if present (development).
    pub fn from_env() -> Self {
        let _ = dotenv();

        let defaults = Self::default();
        Self {
            heartbeat_interval: env_secs(
                "CRONLOCK_HEARTBEAT_INTERVAL_SECS",
                defaults.heartbeat_interval,
            ),
            stale_lock_threshold: env_secs(
                "CRONLOCK_STALE_LOCK_THRESHOLD_SECS",
                defaults.stale_lock_threshold,
            ),
            reaper_interval: env_secs("CRONLOCK_REAPER_INTERVAL_SECS", defaults.reaper_interval),
            stale_registration_threshold: env_secs(
                "CRONLOCK_STALE_REGISTRATION_THRESHOLD_SECS",
                defaults.stale_registration_threshold,
            ),
            shutdown_timeout: env_secs("CRONLOCK_SHUTDOWN_TIMEOUT_SECS", defaults.shutdown_timeout),
            lock_acquire_timeout: env_secs(
                "CRONLOCK_LOCK_ACQUIRE_TIMEOUT_SECS",
                defaults.lock_acquire_timeout,
            ),
            audit_retention: env_secs("CRONLOCK_AUDIT_RETENTION_SECS", defaults.audit_retention),
            orphaned_audit_threshold: env_secs(
                "CRONLOCK_ORPHANED_AUDIT_THRESHOLD_SECS",
                defaults.orphaned_audit_threshold,
            ),
            inline_sweep_interval: env_secs(
                "CRONLOCK_INLINE_SWEEP_INTERVAL_SECS",
                defaults.inline_sweep_interval,
            ),
        }
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    match env::var(key) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                tracing::warn!(key, value = %raw, "ignoring unparsable duration, using default");
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
        let config = SchedulerConfig::default();
        assert_eq!(config.heartbeat_interval, Duration::from_secs(120));
        assert_eq!(config.stale_lock_threshold, Duration::from_secs(600));
        assert_eq!(config.reaper_interval, Duration::from_secs(300));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
        assert_eq!(config.lock_acquire_timeout, Duration::from_secs(60));
    }

    #[test]
    fn env_secs_falls_back_on_garbage() {
        std::env::set_var("CRONLOCK_TEST_DURATION", "not-a-number");
        assert_eq!(
            env_secs("CRONLOCK_TEST_DURATION", Duration::from_secs(42)),
            Duration::from_secs(42)
        );
        std::env::remove_var("CRONLOCK_TEST_DURATION");
    }
}
