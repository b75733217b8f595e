//! Application configuration loaded from environment variables.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use ratewall_core::{ConfigError, FailurePolicy, LimiterConfig, UnknownFailurePolicy};

#[cfg(feature = "redis")]
use ratewall_infra::RedisConfig;

/// Which store backs the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    #[cfg(feature = "redis")]
    Redis,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            #[cfg(feature = "redis")]
            StoreBackend::Redis => "redis",
        }
    }
}

impl Default for StoreBackend {
    fn default() -> Self {
        #[cfg(feature = "redis")]
        return StoreBackend::Redis;

        #[cfg(not(feature = "redis"))]
        return StoreBackend::Memory;
    }
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            #[cfg(feature = "redis")]
            "redis" => Ok(StoreBackend::Redis),
            _ => Err(ConfigError::UnknownVariant {
                key: "STORE_BACKEND",
                value: s.to_string(),
                expected: if cfg!(feature = "redis") {
                    "memory, redis"
                } else {
                    "memory"
                },
            }),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub limiter: LimiterConfig,
    pub store: StoreBackend,
    /// How often the in-memory store sweeps expired keys.
    pub reaper_interval: Duration,
    #[cfg(feature = "redis")]
    pub redis: RedisConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup. Unset or empty keys take their
    /// default; values that are set but do not parse are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let limiter = LimiterConfig {
            ip_threshold: parse_or(&get, "RATE_LIMIT_IP", 100)?,
            token_threshold: parse_or(&get, "RATE_LIMIT_TOKEN", 100)?,
            block_duration: Duration::from_secs(at_least_one(
                "BLOCK_DURATION_SECONDS",
                parse_or(&get, "BLOCK_DURATION_SECONDS", 60)?,
            )?),
            failure_policy: match get("LIMITER_FAILURE_POLICY") {
                Some(v) => v.parse().map_err(|e: UnknownFailurePolicy| ConfigError::UnknownVariant {
                    key: "LIMITER_FAILURE_POLICY",
                    value: e.0,
                    expected: "open, closed",
                })?,
                None => FailurePolicy::default(),
            },
        };

        let store = match get("STORE_BACKEND") {
            Some(v) => v.parse()?,
            None => StoreBackend::default(),
        };

        let reaper_secs = at_least_one(
            "MEMORY_REAPER_INTERVAL_SECS",
            parse_or(&get, "MEMORY_REAPER_INTERVAL_SECS", 5)?,
        )?;

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&get, "PORT", 8080)?,
            limiter,
            store,
            reaper_interval: Duration::from_secs(reaper_secs),
            #[cfg(feature = "redis")]
            redis: redis_config(&get)?,
        })
    }
}

/// `REDIS_URL` wins; otherwise `REDIS_ADDR` is a bare `host:port`.
#[cfg(feature = "redis")]
fn redis_config<G>(get: &G) -> Result<RedisConfig, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let defaults = RedisConfig::default();

    let url = get("REDIS_URL")
        .or_else(|| get("REDIS_ADDR").map(|addr| format!("redis://{addr}")))
        .unwrap_or(defaults.url);

    Ok(RedisConfig {
        url,
        password: get("REDIS_PASSWORD"),
        db: parse_or(get, "REDIS_DB", defaults.db)?,
        connect_timeout: Duration::from_secs(parse_or(
            get,
            "REDIS_CONNECT_TIMEOUT_SECS",
            defaults.connect_timeout.as_secs(),
        )?),
        fallback_to_memory: match get("REDIS_FALLBACK_TO_MEMORY") {
            Some(v) => parse_flag("REDIS_FALLBACK_TO_MEMORY", &v)?,
            None => defaults.fallback_to_memory,
        },
    })
}

fn parse_or<G, T>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(key, raw, e)),
        None => Ok(default),
    }
}

#[cfg(feature = "redis")]
/// Reject zero for settings that are whole-second durations.
fn at_least_one(key: &'static str, secs: u64) -> Result<u64, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::invalid(key, "0", "must be at least 1"));
    }
    Ok(secs)
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::invalid(key, raw, "expected true, false, 1 or 0")),
    }
}
