//! Chat service configuration.
//!
//! Configuration is loaded once from environment variables at startup,
//! after an optional `.env` file has been merged into the process
//! environment. The database URL is redacted in Debug output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default bind host.
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default period between liveness sweeps in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 15;

/// Default inactivity threshold in seconds.
/// Participants without a heartbeat within this time are evicted.
pub const DEFAULT_INACTIVITY_THRESHOLD_SECONDS: u64 = 10;

/// Default maximum database pool size.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

/// Chat service configuration.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address, built from `BIND_HOST` and `PORT`.
    pub bind_address: String,

    /// Period between liveness sweeps.
    pub sweep_interval_seconds: u64,

    /// Seconds since last heartbeat after which a participant is evicted.
    pub inactivity_threshold_seconds: u64,

    /// Maximum connections in the database pool.
    pub db_max_connections: u32,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("sweep_interval_seconds", &self.sweep_interval_seconds)
            .field(
                "inactivity_threshold_seconds",
                &self.inactivity_threshold_seconds,
            )
            .field("db_max_connections", &self.db_max_connections)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid port configuration: {0}")]
    InvalidPort(String),

    #[error("Invalid sweep interval configuration: {0}")]
    InvalidSweepInterval(String),

    #[error("Invalid inactivity threshold configuration: {0}")]
    InvalidInactivityThreshold(String),

    #[error("Invalid database pool configuration: {0}")]
    InvalidPoolSize(String),
}

/// Merge a `.env` file into the process environment.
///
/// With `None`, searches the current directory and its parents for `.env`.
/// Variables already set in the environment are not overridden. Returns the
/// path of the loaded file, or `None` if there was none to load.
pub fn load_dotenv(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(path) => dotenvy::from_path(path).ok().map(|()| path.to_path_buf()),
        None => dotenvy::dotenv().ok(),
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let port = if let Some(value_str) = vars.get("PORT") {
            value_str.parse::<u16>().map_err(|e| {
                ConfigError::InvalidPort(format!(
                    "PORT must be a valid port number, got '{}': {}",
                    value_str, e
                ))
            })?
        } else {
            DEFAULT_PORT
        };

        let bind_host = vars
            .get("BIND_HOST")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_HOST.to_string());

        let sweep_interval_seconds = parse_positive_seconds(
            vars,
            "SWEEP_INTERVAL_SECONDS",
            DEFAULT_SWEEP_INTERVAL_SECONDS,
        )
        .map_err(ConfigError::InvalidSweepInterval)?;

        let inactivity_threshold_seconds = parse_positive_seconds(
            vars,
            "INACTIVITY_THRESHOLD_SECONDS",
            DEFAULT_INACTIVITY_THRESHOLD_SECONDS,
        )
        .map_err(ConfigError::InvalidInactivityThreshold)?;

        let db_max_connections = if let Some(value_str) = vars.get("DB_MAX_CONNECTIONS") {
            let value: u32 = value_str.parse().map_err(|e| {
                ConfigError::InvalidPoolSize(format!(
                    "DB_MAX_CONNECTIONS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidPoolSize(
                    "DB_MAX_CONNECTIONS must be greater than 0".to_string(),
                ));
            }

            value
        } else {
            DEFAULT_DB_MAX_CONNECTIONS
        };

        Ok(Config {
            database_url,
            bind_address: format!("{}:{}", bind_host, port),
            sweep_interval_seconds,
            inactivity_threshold_seconds,
            db_max_connections,
        })
    }

    /// Period between liveness sweeps.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    /// Inactivity threshold for eviction.
    pub fn inactivity_threshold(&self) -> Duration {
        Duration::from_secs(self.inactivity_threshold_seconds)
    }
}

fn parse_positive_seconds(
    vars: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<u64, String> {
    let Some(value_str) = vars.get(key) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        format!(
            "{} must be a valid positive integer, got '{}': {}",
            key, value_str, e
        )
    })?;

    if value == 0 {
        return Err(format!("{} must be greater than 0", key));
    }

    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_dotenv_sets_missing_vars_only() {
        let path = env::temp_dir().join(format!("chat-service-{}.env", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "CHAT_DOTENV_TEST_FRESH=from-file").unwrap();
        writeln!(file, "CHAT_DOTENV_TEST_PRESET=from-file").unwrap();
        drop(file);

        env::set_var("CHAT_DOTENV_TEST_PRESET", "from-process");
        let loaded = load_dotenv(Some(&path));

        assert_eq!(loaded.as_deref(), Some(path.as_path()));
        assert_eq!(env::var("CHAT_DOTENV_TEST_FRESH").unwrap(), "from-file");
        assert_eq!(env::var("CHAT_DOTENV_TEST_PRESET").unwrap(), "from-process");

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_dotenv_missing_file() {
        let path = env::temp_dir().join("chat-service-does-not-exist.env");
        assert_eq!(load_dotenv(Some(&path)), None);
    }

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([(
            "DATABASE_URL".to_string(),
            "postgresql://localhost/chat_test".to_string(),
        )])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.database_url, "postgresql://localhost/chat_test");
        assert_eq!(config.bind_address, "0.0.0.0:5000");
        assert_eq!(config.sweep_interval_seconds, 15);
        assert_eq!(config.inactivity_threshold_seconds, 10);
        assert_eq!(config.db_max_connections, DEFAULT_DB_MAX_CONNECTIONS);
        assert_eq!(config.sweep_interval(), Duration::from_secs(15));
        assert_eq!(config.inactivity_threshold(), Duration::from_secs(10));
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("PORT".to_string(), "8080".to_string());
        vars.insert("BIND_HOST".to_string(), "127.0.0.1".to_string());
        vars.insert("SWEEP_INTERVAL_SECONDS".to_string(), "30".to_string());
        vars.insert("INACTIVITY_THRESHOLD_SECONDS".to_string(), "20".to_string());
        vars.insert("DB_MAX_CONNECTIONS".to_string(), "4".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:8080");
        assert_eq!(config.sweep_interval_seconds, 30);
        assert_eq!(config.inactivity_threshold_seconds, 20);
        assert_eq!(config.db_max_connections, 4);
    }

    #[test]
    fn test_from_vars_missing_database_url() {
        let result = Config::from_vars(&HashMap::new());
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "DATABASE_URL"));
    }

    #[test]
    fn test_port_rejects_non_numeric() {
        let mut vars = base_vars();
        vars.insert("PORT".to_string(), "http".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidPort(msg)) if msg.contains("must be a valid port number"))
        );
    }

    #[test]
    fn test_port_rejects_out_of_range() {
        let mut vars = base_vars();
        vars.insert("PORT".to_string(), "70000".to_string());

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidPort(_))
        ));
    }

    #[test]
    fn test_sweep_interval_rejects_zero() {
        let mut vars = base_vars();
        vars.insert("SWEEP_INTERVAL_SECONDS".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidSweepInterval(msg)) if msg.contains("must be greater than 0"))
        );
    }

    #[test]
    fn test_inactivity_threshold_rejects_non_numeric() {
        let mut vars = base_vars();
        vars.insert(
            "INACTIVITY_THRESHOLD_SECONDS".to_string(),
            "ten".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidInactivityThreshold(msg)) if msg.contains("must be a valid positive integer"))
        );
    }

    #[test]
    fn test_pool_size_rejects_zero() {
        let mut vars = base_vars();
        vars.insert("DB_MAX_CONNECTIONS".to_string(), "0".to_string());

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidPoolSize(_))
        ));
    }

    #[test]
    fn test_debug_redacts_database_url() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        let debug_output = format!("{:?}", config);

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("postgresql://"));
        assert!(!debug_output.contains("chat_test"));
    }
}
