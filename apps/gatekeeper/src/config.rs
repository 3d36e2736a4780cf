// [[GATEKEEPER]]/apps/gatekeeper/src/config.rs
// Purpose: Boot-time configuration from the environment.
// Architecture: Application Boot
// Dependencies: std::env

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::rate_limit::{DEFAULT_LOCAL_CAP, DEFAULT_WINDOW_MS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateBudget {
    pub read_max: u64,
    pub write_max: u64,
    pub window_ms: u64,
}

impl Default for RateBudget {
    fn default() -> Self {
        RateBudget {
            read_max: 100,
            write_max: 30,
            window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatekeeperConfig {
    pub port: u16,
    pub redis_url: Option<String>,
    pub budget: RateBudget,
    pub backend_timeout: Duration,
    pub local_cap: usize,
    pub sessions_file: String,
    pub resources_file: String,
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        GatekeeperConfig {
            port: 3000,
            redis_url: None,
            budget: RateBudget::default(),
            backend_timeout: Duration::from_millis(250),
            local_cap: DEFAULT_LOCAL_CAP,
            sessions_file: "config/sessions.json".to_string(),
            resources_file: "config/resources.json".to_string(),
        }
    }
}

impl GatekeeperConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = GatekeeperConfig::default();

        let window_ms: u64 = parse_or(&lookup, "RATE_LIMIT_WINDOW_MS", defaults.budget.window_ms)?;
        // Window starts are i64 epoch millis.
        if i64::try_from(window_ms).is_err() {
            return Err(ConfigError::InvalidNumber {
                name: "RATE_LIMIT_WINDOW_MS",
                value: window_ms.to_string(),
            });
        }

        Ok(GatekeeperConfig {
            port: parse_or(&lookup, "GATEKEEPER_PORT", defaults.port)?,
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            budget: RateBudget {
                read_max: parse_or(&lookup, "RATE_LIMIT_READ_MAX", defaults.budget.read_max)?,
                write_max: parse_or(&lookup, "RATE_LIMIT_WRITE_MAX", defaults.budget.write_max)?,
                window_ms,
            },
            backend_timeout: Duration::from_millis(parse_or(
                &lookup,
                "RATE_LIMIT_BACKEND_TIMEOUT_MS",
                defaults.backend_timeout.as_millis() as u64,
            )?),
            local_cap: parse_or(&lookup, "RATE_LIMIT_LOCAL_CAP", defaults.local_cap)?,
            sessions_file: lookup("GATEKEEPER_SESSIONS_FILE").unwrap_or(defaults.sessions_file),
            resources_file: lookup("GATEKEEPER_RESOURCES_FILE").unwrap_or(defaults.resources_file),
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber { name, value: raw.clone() }),
        None => Ok(default),
    }
}
