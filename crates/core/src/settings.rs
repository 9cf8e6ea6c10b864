// SPDX-License-Identifier: MIT

//! Env-driven configuration, resolved once at startup. No runtime reload:
//! the only thing re-read live is the collector directory tree itself.

use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;

const DEFAULT_ALLOWED_INACTIVITY_TIME: u64 = 180;
const DEFAULT_MAX_READ_QUEUE_SIZE: usize = 100_000;
const DEFAULT_MAX_SENDQ_SIZE: usize = 10_000;
const DEFAULT_TICK_INTERVAL: u64 = 3;
const DEFAULT_DEDUP_INTERVAL: u64 = 300;
const DEFAULT_EVICT_INTERVAL: u64 = 3600;

#[derive(Debug, Clone)]
pub struct Settings {
    pub base_dir: PathBuf,
    pub collector_dir: PathBuf,
    pub log_path: PathBuf,
    pub pid_path: PathBuf,
    pub allowed_inactivity_time: Duration,
    pub remove_inactive_collectors: HashSet<String>,
    pub max_read_queue_size: usize,
    /// Reserved for sinks that buffer; not consumed by the supervision
    /// engine itself.
    pub max_sendq_size: usize,
    pub send_middlewares: Vec<String>,
    pub tick_interval: Duration,
    pub dedup_interval: u64,
    pub evict_interval: u64,
    pub dedup_only_zero: bool,
}

impl Settings {
    /// Resolve settings from the process environment, falling back to
    /// documented defaults. Fails fast on a malformed value; never panics.
    pub fn from_env() -> Result<Self, CoreError> {
        let base_dir = env_path("BASE_DIR", PathBuf::from("/var/lib/octopus"));
        let collector_dir = base_dir.join("collectors");
        let log_path = base_dir.join("logs").join("octopus.log");
        let pid_path = base_dir.join("octopus.pid");

        let allowed_inactivity_time = Duration::from_secs(env_u64(
            "ALLOWED_INACTIVITY_TIME",
            DEFAULT_ALLOWED_INACTIVITY_TIME,
        )?);

        let remove_inactive_collectors = env::var("REMOVE_INACTIVE_COLLECTORS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let max_read_queue_size =
            env_usize("MAX_READ_QUEUE_SIZE", DEFAULT_MAX_READ_QUEUE_SIZE)?;
        let max_sendq_size = env_usize("MAX_SENDQ_SIZE", DEFAULT_MAX_SENDQ_SIZE)?;

        let send_middlewares = env::var("SEND_MIDDLEWARES")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_else(|| vec!["stdout".to_string()]);

        let tick_interval = Duration::from_secs(env_u64("TICK_INTERVAL", DEFAULT_TICK_INTERVAL)?);
        let dedup_interval = env_u64("DEDUP_INTERVAL", DEFAULT_DEDUP_INTERVAL)?;
        let evict_interval = env_u64("EVICT_INTERVAL", DEFAULT_EVICT_INTERVAL)?;

        if evict_interval <= dedup_interval {
            return Err(CoreError::EvictNotGreaterThanDedup {
                evict: evict_interval,
                dedup: dedup_interval,
            });
        }

        let dedup_only_zero = env_bool("DEDUP_ONLY_ZERO", false)?;

        Ok(Self {
            base_dir,
            collector_dir,
            log_path,
            pid_path,
            allowed_inactivity_time,
            remove_inactive_collectors,
            max_read_queue_size,
            max_sendq_size,
            send_middlewares,
            tick_interval,
            dedup_interval,
            evict_interval,
            dedup_only_zero,
        })
    }
}

fn env_path(name: &'static str, default: PathBuf) -> PathBuf {
    env::var(name).map(PathBuf::from).unwrap_or(default)
}

fn env_u64(name: &'static str, default: u64) -> Result<u64, CoreError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| CoreError::InvalidInt { name, value: raw }),
        Err(_) => Ok(default),
    }
}

fn env_usize(name: &'static str, default: usize) -> Result<usize, CoreError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| CoreError::InvalidInt { name, value: raw }),
        Err(_) => Ok(default),
    }
}

fn env_bool(name: &'static str, default: bool) -> Result<bool, CoreError> {
    match env::var(name) {
        Ok(raw) => parse_bool(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, CoreError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(CoreError::InvalidInt { name, value: raw.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_all() {
        for name in [
            "BASE_DIR",
            "ALLOWED_INACTIVITY_TIME",
            "REMOVE_INACTIVE_COLLECTORS",
            "MAX_READ_QUEUE_SIZE",
            "MAX_SENDQ_SIZE",
            "SEND_MIDDLEWARES",
            "TICK_INTERVAL",
            "DEDUP_INTERVAL",
            "EVICT_INTERVAL",
            "DEDUP_ONLY_ZERO",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn defaults_apply_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.base_dir, PathBuf::from("/var/lib/octopus"));
        assert_eq!(settings.collector_dir, PathBuf::from("/var/lib/octopus/collectors"));
        assert_eq!(settings.allowed_inactivity_time, Duration::from_secs(180));
        assert_eq!(settings.max_read_queue_size, 100_000);
        assert_eq!(settings.send_middlewares, vec!["stdout".to_string()]);
        assert!(!settings.dedup_only_zero);
        clear_all();
    }

    #[test]
    fn invalid_integer_is_a_typed_error_not_a_panic() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        env::set_var("ALLOWED_INACTIVITY_TIME", "not-a-number");
        let err = Settings::from_env().unwrap_err();
        assert!(matches!(err, CoreError::InvalidInt { .. }));
        clear_all();
    }

    #[test]
    fn evict_interval_must_exceed_dedup_interval() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        env::set_var("DEDUP_INTERVAL", "300");
        env::set_var("EVICT_INTERVAL", "100");
        let err = Settings::from_env().unwrap_err();
        assert!(matches!(err, CoreError::EvictNotGreaterThanDedup { .. }));
        clear_all();
    }

    #[yare::parameterized(
        one = { "1", true },
        true_lower = { "true", true },
        yes_lower = { "yes", true },
        true_mixed_case = { "TRUE", true },
        zero = { "0", false },
        false_lower = { "false", false },
        no_lower = { "no", false },
    )]
    fn parse_bool_recognizes_truthy_and_falsy_values(raw: &str, expected: bool) {
        assert_eq!(parse_bool("X", raw).unwrap(), expected);
    }

    #[test]
    fn parse_bool_rejects_an_unrecognized_value() {
        assert!(parse_bool("X", "maybe").is_err());
    }

    #[test]
    fn remove_inactive_collectors_parses_comma_list() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        env::set_var("REMOVE_INACTIVE_COLLECTORS", "foo, bar");
        let settings = Settings::from_env().unwrap();
        assert!(settings.remove_inactive_collectors.contains("foo"));
        assert!(settings.remove_inactive_collectors.contains("bar"));
        clear_all();
    }
}
