use std::{env, fmt, net::SocketAddr};

use chrono_tz::Tz;

use super::{server_bind_address, DEFAULT_DATABASE_URL, DEFAULT_DEV_AUTH_SECRET};

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Where organizer display names come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    pub base_url: String,
    pub access_token: Option<String>,
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub database_url: String,
    pub auth_secret: Vec<u8>,
    pub identity: Option<IdentityConfig>,
    pub display_tz: Tz,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;
        let database_url =
            non_empty_var("APP_DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let auth_secret = match (non_empty_var("APP_AUTH_SECRET"), environment) {
            (Some(secret), _) => secret.into_bytes(),
            (None, Environment::Production) => return Err(ConfigError::MissingAuthSecret),
            (None, _) => DEFAULT_DEV_AUTH_SECRET.as_bytes().to_vec(),
        };

        let identity = non_empty_var("APP_IDENTITY_URL").map(|base_url| IdentityConfig {
            base_url,
            access_token: non_empty_var("APP_IDENTITY_TOKEN"),
        });

        let tz_value = non_empty_var("APP_DISPLAY_TZ").unwrap_or_else(|| "UTC".to_string());
        let display_tz = tz_value
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(tz_value.clone()))?;

        Ok(Self {
            bind_addr,
            environment,
            database_url,
            auth_secret,
            identity,
            display_tz,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    MissingAuthSecret,
    InvalidTimezone(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::MissingAuthSecret => {
                write!(f, "APP_AUTH_SECRET must be set in production")
            }
            Self::InvalidTimezone(value) => {
                write!(f, "APP_DISPLAY_TZ must be an IANA timezone name (got {value})")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
