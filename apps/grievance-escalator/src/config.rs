//! Application configuration loaded from environment variables.
//!
//! Loading is fail-fast: a missing required variable, an unparsable value,
//! or a pilot override in production stops startup with a [`ConfigError`].

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use grievance_api::AdminAccess;
use grievance_escalation::config::{
    normalize_statuses, DEFAULT_BATCH_SIZE, DEFAULT_DB_TIMEOUT_SECS, DEFAULT_LOOKBACK_MINUTES,
    DEFAULT_MAX_LEVEL, DEFAULT_OPEN_STATUSES,
};
use grievance_escalation::worker::DEFAULT_INTERVAL_SECS;
use grievance_escalation::{EngineSettings, WorkerConfig};
use thiserror::Error;

/// Longest accepted `ESCALATION_LOOKBACK_MINUTES` (30 days).
pub const MAX_LOOKBACK_MINUTES: i64 = 43_200;

/// Bounds applied to `ESCALATION_PILOT_INTERVAL_SECS`.
pub const PILOT_INTERVAL_MIN_SECS: u64 = 10;
pub const PILOT_INTERVAL_MAX_SECS: u64 = 60;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Pilot,
    Production,
}

impl AppEnvironment {
    /// Parse an `APP_ENV` value.
    pub fn from_env_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Some(Self::Production),
            "pilot" => Some(Self::Pilot),
            "development" | "dev" => Some(Self::Development),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        *self == Self::Production
    }
}

impl fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Pilot => write!(f, "pilot"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("{0} must not be set when APP_ENV=production")]
    OverrideInProduction(String),
}

/// Application configuration.
#[derive(Clone)]
pub struct Config {
    pub app_env: AppEnvironment,
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub rust_log: String,

    /// Scheduled interval between cycles.
    pub interval: Duration,
    /// Clamped pilot interval, when configured. Replaces `interval`.
    pub pilot_interval: Option<Duration>,
    /// Pilot SLA override in minutes.
    pub sla_override_minutes: Option<f64>,

    pub dry_run: bool,
    pub max_level: i32,
    pub lookback_minutes: i64,
    pub db_timeout: Duration,
    pub concurrency: usize,
    pub batch_size: i64,
    pub open_statuses: Vec<String>,
    pub admin_token: Option<String>,
    /// Admin routes are open when no token is configured.
    pub tokenless_admin: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("app_env", &self.app_env)
            .field("database_url", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("rust_log", &self.rust_log)
            .field("interval", &self.interval)
            .field("pilot_interval", &self.pilot_interval)
            .field("sla_override_minutes", &self.sla_override_minutes)
            .field("dry_run", &self.dry_run)
            .field("max_level", &self.max_level)
            .field("lookback_minutes", &self.lookback_minutes)
            .field("db_timeout", &self.db_timeout)
            .field("concurrency", &self.concurrency)
            .field("batch_size", &self.batch_size)
            .field("open_statuses", &self.open_statuses)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "[REDACTED]"))
            .field("tokenless_admin", &self.tokenless_admin)
            .finish()
    }
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // Unset means development, but only an explicit non-production
        // APP_ENV opens admin routes without a token.
        let (app_env, tokenless_admin) = match get("APP_ENV") {
            None => (AppEnvironment::Development, false),
            Some(raw) => {
                let parsed = AppEnvironment::from_env_str(&raw).ok_or_else(|| {
                    invalid(
                        "APP_ENV",
                        &format!("'{raw}' is not one of production, pilot, development"),
                    )
                })?;
                (parsed, !parsed.is_production())
            }
        };

        let database_url =
            get("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".into()))?;

        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_or(get("PORT"), "PORT", 8080)?;
        if port == 0 {
            return Err(invalid("PORT", "must be between 1 and 65535"));
        }
        let rust_log = get("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let interval_secs: u64 =
            parse_or(get("ESCALATION_INTERVAL_SECS"), "ESCALATION_INTERVAL_SECS", DEFAULT_INTERVAL_SECS)?;
        if interval_secs == 0 {
            return Err(invalid("ESCALATION_INTERVAL_SECS", "must be positive"));
        }

        let pilot_interval = match get("ESCALATION_PILOT_INTERVAL_SECS") {
            None => None,
            Some(_) if app_env.is_production() => {
                return Err(ConfigError::OverrideInProduction(
                    "ESCALATION_PILOT_INTERVAL_SECS".into(),
                ))
            }
            Some(raw) => {
                let secs: u64 = parse("ESCALATION_PILOT_INTERVAL_SECS", &raw)?;
                Some(Duration::from_secs(
                    secs.clamp(PILOT_INTERVAL_MIN_SECS, PILOT_INTERVAL_MAX_SECS),
                ))
            }
        };

        let sla_override_minutes = match get("ESCALATION_SLA_OVERRIDE_MINUTES") {
            None => None,
            Some(_) if app_env.is_production() => {
                return Err(ConfigError::OverrideInProduction(
                    "ESCALATION_SLA_OVERRIDE_MINUTES".into(),
                ))
            }
            Some(raw) => {
                let minutes: f64 = parse("ESCALATION_SLA_OVERRIDE_MINUTES", &raw)?;
                if !minutes.is_finite() || minutes <= 0.0 {
                    return Err(invalid(
                        "ESCALATION_SLA_OVERRIDE_MINUTES",
                        "must be a positive number of minutes",
                    ));
                }
                Some(minutes)
            }
        };

        let dry_run = match get("ESCALATION_DRY_RUN") {
            None => false,
            Some(raw) => parse_bool("ESCALATION_DRY_RUN", &raw)?,
        };

        let max_level: i32 =
            parse_or(get("ESCALATION_MAX_LEVEL"), "ESCALATION_MAX_LEVEL", DEFAULT_MAX_LEVEL)?;
        if max_level < 1 {
            return Err(invalid("ESCALATION_MAX_LEVEL", "must be at least 1"));
        }

        let lookback_minutes: i64 = parse_or(
            get("ESCALATION_LOOKBACK_MINUTES"),
            "ESCALATION_LOOKBACK_MINUTES",
            DEFAULT_LOOKBACK_MINUTES,
        )?;
        if !(0..=MAX_LOOKBACK_MINUTES).contains(&lookback_minutes) {
            return Err(invalid(
                "ESCALATION_LOOKBACK_MINUTES",
                &format!("must be between 0 and {MAX_LOOKBACK_MINUTES}"),
            ));
        }

        let db_timeout_secs: u64 = parse_or(
            get("ESCALATION_DB_TIMEOUT_SECS"),
            "ESCALATION_DB_TIMEOUT_SECS",
            DEFAULT_DB_TIMEOUT_SECS,
        )?;
        if db_timeout_secs == 0 {
            return Err(invalid("ESCALATION_DB_TIMEOUT_SECS", "must be positive"));
        }

        let concurrency: usize =
            parse_or(get("ESCALATION_CONCURRENCY"), "ESCALATION_CONCURRENCY", 1)?;
        if concurrency == 0 {
            return Err(invalid("ESCALATION_CONCURRENCY", "must be at least 1"));
        }

        let batch_size: i64 =
            parse_or(get("ESCALATION_BATCH_SIZE"), "ESCALATION_BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        if batch_size <= 0 {
            return Err(invalid("ESCALATION_BATCH_SIZE", "must be positive"));
        }

        let open_statuses = match get("ESCALATION_OPEN_STATUSES") {
            Some(raw) => normalize_statuses(raw.split(',')),
            None => normalize_statuses(DEFAULT_OPEN_STATUSES.iter().copied()),
        };
        if open_statuses.is_empty() {
            return Err(invalid("ESCALATION_OPEN_STATUSES", "must list at least one status"));
        }

        Ok(Self {
            app_env,
            database_url,
            host,
            port,
            rust_log,
            interval: Duration::from_secs(interval_secs),
            pilot_interval,
            sla_override_minutes,
            dry_run,
            max_level,
            lookback_minutes,
            db_timeout: Duration::from_secs(db_timeout_secs),
            concurrency,
            batch_size,
            open_statuses,
            admin_token: get("ESCALATION_ADMIN_TOKEN"),
            tokenless_admin,
        })
    }

    /// `host:port` for the listener.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Interval the worker actually ticks at.
    #[must_use]
    pub fn effective_interval(&self) -> Duration {
        self.pilot_interval.unwrap_or(self.interval)
    }

    #[must_use]
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings::default()
            .with_dry_run(self.dry_run)
            .with_max_level(self.max_level)
            .with_lookback(chrono::Duration::minutes(self.lookback_minutes))
            .with_open_statuses(self.open_statuses.iter())
            .with_batch_size(self.batch_size)
            .with_concurrency(self.concurrency)
            .with_storage_timeout(self.db_timeout)
    }

    #[must_use]
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            interval: self.effective_interval(),
        }
    }

    /// Admin routes stay closed without a token unless `APP_ENV` is
    /// explicitly `pilot` or `development`.
    #[must_use]
    pub fn admin_access(&self) -> AdminAccess {
        AdminAccess::new(self.admin_token.clone(), self.tokenless_admin)
    }
}

fn invalid(var: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        var: var.to_string(),
        message: message.to_string(),
    }
}

fn parse<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        var: var.to_string(),
        message: format!("'{raw}': {e}"),
    })
}

fn parse_or<T>(raw: Option<String>, var: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.map_or(Ok(default), |raw| parse(var, &raw))
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(var, &format!("'{raw}' is not a boolean"))),
    }
}
