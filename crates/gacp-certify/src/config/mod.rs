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

/// Top-level configuration for the certification service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub workflow: WorkflowConfig,
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

        let workflow = WorkflowConfig {
            phase1_fee: parse_fee("GACP_PHASE1_FEE", 5_000)?,
            phase2_fee: parse_fee("GACP_PHASE2_FEE", 25_000)?,
            rejection_limit: parse_fee("GACP_REJECTION_LIMIT", 3)?,
            redirect_url: env::var("GACP_PAYMENT_REDIRECT_URL")
                .unwrap_or_else(|_| "http://localhost:3000/payment-complete".to_string()),
            notify_url: env::var("GACP_PAYMENT_NOTIFY_URL")
                .unwrap_or_else(|_| "http://localhost:3000/api/v1/certification/payments/webhook".to_string()),
            webhook_secret: env::var("GACP_WEBHOOK_SECRET")
                .unwrap_or_else(|_| "dev-webhook-secret".to_string()),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            workflow,
        })
    }
}

fn parse_fee(key: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidAmount { key }),
        Err(_) => Ok(default),
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Fee schedule and gateway wiring for the certification workflow.
///
/// Phase 1 gates document review (5,000 THB by default), phase 2 gates the
/// field audit (25,000 THB). The rejection limit is the strike count at which
/// a rejected review forces the applicant back through phase-1 payment.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub phase1_fee: u32,
    pub phase2_fee: u32,
    pub rejection_limit: u32,
    pub redirect_url: String,
    pub notify_url: String,
    pub webhook_secret: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            phase1_fee: 5_000,
            phase2_fee: 25_000,
            rejection_limit: 3,
            redirect_url: "http://localhost:3000/payment-complete".to_string(),
            notify_url: "http://localhost:3000/api/v1/certification/payments/webhook".to_string(),
            webhook_secret: "dev-webhook-secret".to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidAmount { key: &'static str },
    InvalidHost { source: std::net::AddrParseError },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidAmount { key } => {
                write!(f, "{key} must be a non-negative integer amount")
            }
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidAmount { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
