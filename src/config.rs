use std::path::PathBuf;
use std::str::FromStr;

use crate::error::AppError;

const ENV_DATA_DIR: &str = "TEAMBOARD_DATA_DIR";
const ENV_DB_FILE: &str = "TEAMBOARD_DB_FILE";
const ENV_LOG_DIR: &str = "TEAMBOARD_LOG_DIR";
const ENV_POOL_SIZE: &str = "TEAMBOARD_POOL_SIZE";
const ENV_HORIZON_DAYS: &str = "TEAMBOARD_RECURRENCE_HORIZON_DAYS";
const ENV_INTERVAL_SECS: &str = "TEAMBOARD_RECURRENCE_INTERVAL_SECS";
const ENV_FEED_CAPACITY: &str = "TEAMBOARD_FEED_CAPACITY";
const ENV_SENTRY_DSN: &str = "SENTRY_DSN";

/// Process-level configuration. Runtime-tunable values live in `app_settings`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub db_file: String,
    pub log_dir: Option<PathBuf>,
    pub pool_size: u32,
    pub recurrence_horizon_days: u32,
    pub recurrence_interval_secs: u64,
    pub feed_capacity: usize,
    pub sentry_dsn: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_file: "teamboard.db".into(),
            log_dir: None,
            pool_size: 8,
            recurrence_horizon_days: 30,
            recurrence_interval_secs: 3600,
            feed_capacity: 256,
            sentry_dsn: None,
        }
    }
}

impl AppConfig {
    /// Load `.env` (if present) and then read the process environment.
    pub fn load() -> Result<Self, AppError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(AppError::Config(format!(".env: {e}"))),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = non_empty(lookup(ENV_DATA_DIR)) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(file) = non_empty(lookup(ENV_DB_FILE)) {
            config.db_file = file;
        }
        config.log_dir = non_empty(lookup(ENV_LOG_DIR)).map(PathBuf::from);
        config.sentry_dsn = non_empty(lookup(ENV_SENTRY_DSN));

        if let Some(v) = parse_var(&lookup, ENV_POOL_SIZE)? {
            config.pool_size = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_HORIZON_DAYS)? {
            config.recurrence_horizon_days = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_INTERVAL_SECS)? {
            config.recurrence_interval_secs = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_FEED_CAPACITY)? {
            config.feed_capacity = v;
        }

        if config.pool_size == 0 {
            return Err(AppError::Config(format!("{ENV_POOL_SIZE} must be at least 1")));
        }
        if config.feed_capacity == 0 {
            return Err(AppError::Config(format!("{ENV_FEED_CAPACITY} must be at least 1")));
        }
        if config.recurrence_interval_secs == 0 {
            return Err(AppError::Config(format!("{ENV_INTERVAL_SECS} must be at least 1")));
        }

        Ok(config)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("teamboard")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match non_empty(lookup(key)) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{key}: invalid value '{raw}'"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.recurrence_horizon_days, 30);
        assert_eq!(config.db_file, "teamboard.db");
        assert!(config.log_dir.is_none());
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("TEAMBOARD_DATA_DIR", "/tmp/tb"),
            ("TEAMBOARD_POOL_SIZE", "3"),
            ("TEAMBOARD_RECURRENCE_HORIZON_DAYS", "14"),
            ("TEAMBOARD_LOG_DIR", "  "),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/tb"));
        assert_eq!(config.db_path(), PathBuf::from("/tmp/tb/teamboard.db"));
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.recurrence_horizon_days, 14);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let err = AppConfig::from_lookup(lookup_from(&[("TEAMBOARD_POOL_SIZE", "many")]))
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let err = AppConfig::from_lookup(lookup_from(&[("TEAMBOARD_POOL_SIZE", "0")]))
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
