use std::str::FromStr;
use std::time::Duration;

use pulse_core::error::CoreError;
use pulse_core::pacing::RandomPacing;

/// Error raised when an environment variable holds an unusable value.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid pacing configuration: {0}")]
    Pacing(#[from] CoreError),
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3001`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Time allowed for draining WebSocket sessions after the listener
    /// stops (default: `10`).
    pub shutdown_timeout_secs: u64,
    /// Interval between server Ping frames on every WebSocket.
    pub ws_ping_interval: Duration,
    /// Tree-build tick and benchmark delay ranges.
    pub pacing: RandomPacing,
    /// Telemetry snapshot cadence.
    pub metrics_interval: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `HOST`                   | `0.0.0.0`               |
    /// | `PORT`                   | `3001`                  |
    /// | `CORS_ORIGINS`           | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `10`                    |
    /// | `WS_PING_INTERVAL_SECS`  | `30`                    |
    /// | `TREE_TICK_MS`           | `100`                   |
    /// | `TREE_STEP_CEILING`      | `10.0`                  |
    /// | `BENCHMARK_DELAY_MIN_MS` | `200`                   |
    /// | `BENCHMARK_DELAY_MAX_MS` | `800`                   |
    /// | `METRICS_INTERVAL_MS`    | `1000`                  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup };

        let host = env.string("HOST", "0.0.0.0");
        let port: u16 = env.parse("PORT", 3001)?;

        let cors_origins: Vec<String> = env
            .string("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env.parse("REQUEST_TIMEOUT_SECS", 30)?;
        let shutdown_timeout_secs: u64 = env.parse("SHUTDOWN_TIMEOUT_SECS", 10)?;
        let ws_ping_interval = Duration::from_secs(env.non_zero("WS_PING_INTERVAL_SECS", 30)?);

        let pacing = RandomPacing::new(
            Duration::from_millis(env.non_zero("TREE_TICK_MS", 100)?),
            env.parse("TREE_STEP_CEILING", 10.0)?,
            Duration::from_millis(env.parse("BENCHMARK_DELAY_MIN_MS", 200)?),
            Duration::from_millis(env.parse("BENCHMARK_DELAY_MAX_MS", 800)?),
        )?;

        let metrics_interval = Duration::from_millis(env.non_zero("METRICS_INTERVAL_MS", 1000)?);

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            ws_ping_interval,
            pacing,
            metrics_interval,
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn string(&self, var: &str, default: &str) -> String {
        (self.lookup)(var).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.lookup)(var) {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    var,
                    reason: e.to_string(),
                    value,
                }),
        }
    }

    fn non_zero(&self, var: &'static str, default: u64) -> Result<u64, ConfigError> {
        let value = self.parse(var, default)?;
        if value == 0 {
            return Err(ConfigError::InvalidValue {
                var,
                value: value.to_string(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(value)
    }
}
