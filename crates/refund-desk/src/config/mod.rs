use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub notification: NotificationConfig,
    pub storage: StorageConfig,
    pub operator: OperatorConfig,
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
        let log_format = match env::var("APP_LOG_FORMAT") {
            Ok(value) if value.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        };

        let admin_email =
            env::var("REFUND_ADMIN_EMAIL").unwrap_or_else(|_| "admin@localhost".to_string());
        let from_email =
            env::var("REFUND_FROM_EMAIL").unwrap_or_else(|_| "webmaster@localhost".to_string());
        let mail_backend = MailBackend::parse(
            &env::var("REFUND_MAIL_BACKEND").unwrap_or_else(|_| "log".to_string()),
        )?;

        let notification = NotificationConfig {
            admin_email: checked_address("REFUND_ADMIN_EMAIL", admin_email)?,
            from_email: checked_address("REFUND_FROM_EMAIL", from_email)?,
            backend: mail_backend,
        };

        let storage = match env::var("REFUND_STORE_PATH") {
            Ok(path) if !path.trim().is_empty() => StorageConfig::File(PathBuf::from(path.trim())),
            _ => StorageConfig::Memory,
        };

        let operator_token = env::var("REFUND_OPERATOR_TOKEN")
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
            notification,
            storage,
            operator: OperatorConfig {
                token: operator_token,
            },
        })
    }
}

fn checked_address(key: &'static str, value: String) -> Result<String, ConfigError> {
    let value = value.trim().to_string();
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(value),
        _ => Err(ConfigError::InvalidEmail { key, value }),
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Addresses used when notifying the operator about new refund requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    pub admin_email: String,
    pub from_email: String,
    pub backend: MailBackend,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            admin_email: "admin@localhost".to_string(),
            from_email: "webmaster@localhost".to_string(),
            backend: MailBackend::Log,
        }
    }
}

/// Outbound mail adapter selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailBackend {
    Log,
    Disabled,
}

impl MailBackend {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "log" | "console" => Ok(Self::Log),
            "disabled" | "none" | "off" => Ok(Self::Disabled),
            other => Err(ConfigError::InvalidMailBackend(other.to_string())),
        }
    }
}

/// Where refund requests are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Memory,
    File(PathBuf),
}

/// Access control for the operator-facing routes.
#[derive(Debug, Clone, Default)]
pub struct OperatorConfig {
    pub token: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidEmail { key: &'static str, value: String },
    InvalidMailBackend(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidEmail { key, value } => {
                write!(f, "{key} must be an e-mail address (got '{value}')")
            }
            ConfigError::InvalidMailBackend(value) => write!(
                f,
                "REFUND_MAIL_BACKEND must be one of 'log' or 'disabled' (got '{value}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidEmail { .. }
            | ConfigError::InvalidMailBackend(_) => None,
        }
    }
}
