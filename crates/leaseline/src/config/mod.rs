use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub lifecycle: LifecyclePolicy,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format =
            LogFormat::from_str(&env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".into()));

        let review_expiry_days = env::var("APP_REVIEW_EXPIRY_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidExpiryWindow)?;
        let autosave_retry_limit = env::var("APP_AUTOSAVE_RETRY_LIMIT")
            .unwrap_or_else(|_| "2".to_string())
            .parse::<u8>()
            .map_err(|_| ConfigError::InvalidRetryLimit)?;
        let intake_fee_cents = env::var("APP_INTAKE_FEE_CENTS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidFeeAmount)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            lifecycle: LifecyclePolicy {
                review_expiry_days,
                autosave_retry_limit,
                intake_fee_cents,
            },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing output controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" => Self::Pretty,
            _ => Self::Compact,
        }
    }
}

/// Policy dials governing the application lifecycle.
#[derive(Debug, Clone, Copy)]
pub struct LifecyclePolicy {
    /// Days of staff inaction after which a pre-decision application expires.
    pub review_expiry_days: u16,
    /// Bounded transparent retries for a timed-out autosave PATCH.
    pub autosave_retry_limit: u8,
    /// Default application fee when the property does not carry one.
    pub intake_fee_cents: u32,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            review_expiry_days: 30,
            autosave_retry_limit: 2,
            intake_fee_cents: 5000,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidExpiryWindow,
    InvalidRetryLimit,
    InvalidFeeAmount,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidExpiryWindow => {
                write!(f, "APP_REVIEW_EXPIRY_DAYS must be a whole number of days")
            }
            ConfigError::InvalidRetryLimit => {
                write!(f, "APP_AUTOSAVE_RETRY_LIMIT must be a small whole number")
            }
            ConfigError::InvalidFeeAmount => {
                write!(f, "APP_INTAKE_FEE_CENTS must be a whole number of cents")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
