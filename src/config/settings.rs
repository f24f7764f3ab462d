use std::time::Duration;

use serde::Deserialize;

use crate::cache::refresh_policy::{RefreshPolicy, DEFAULT_EXPIRATION_THRESHOLD, DEFAULT_MAX_AGE};
use crate::config::service_config::ServiceConfig;
use crate::error::TokenError;

/// ================================
/// Full application configuration (YAML)
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

impl AppConfig {
    /// Defaults everywhere except the credentials.
    pub fn with_credentials(credentials: CredentialsConfig) -> Self {
        Self {
            credentials,
            http: HttpConfig::default(),
            refresh: RefreshConfig::default(),
            settings: SettingsConfig::default(),
        }
    }
}

/// Raw credential values, validated into a [`ServiceConfig`].
#[derive(Deserialize, Clone)]
pub struct CredentialsConfig {
    pub audience: String,
    pub client_id: String,
    pub client_secret: String,
    pub tenant: String,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("audience", &self.audience)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("tenant", &self.tenant)
            .finish()
    }
}

impl From<&ServiceConfig> for CredentialsConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            audience: config.audience().to_owned(),
            client_id: config.client_id().to_owned(),
            client_secret: config.client_secret().to_owned(),
            tenant: config.tenant().to_owned(),
        }
    }
}

impl CredentialsConfig {
    pub fn to_service_config(&self) -> Result<ServiceConfig, TokenError> {
        ServiceConfig::new(
            self.audience.to_owned(),
            self.client_id.to_owned(),
            self.client_secret.to_owned(),
            self.tenant.to_owned(),
        )
    }
}

/// ================================
/// Transport
/// ================================
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_ms: u64,
    pub call_timeout_ms: u64,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout_seconds: u64,
    pub retry: RetryConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            call_timeout_ms: 10_000,
            pool_max_idle_per_host: 2,
            pool_idle_timeout_seconds: 60,
            retry: RetryConfig::default(),
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    /// will be mutiply by 2 on every attempt until max_delay_ms
    pub base_delay_ms: u64,
    /// invariant: >= base_delay_ms
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { attempts: 1, base_delay_ms: 200, max_delay_ms: 1000 }
    }
}

/// ================================
/// Default refresh policy
/// ================================
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RefreshConfig {
    pub max_age_seconds: u64,
    pub expiration_threshold_seconds: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_age_seconds: DEFAULT_MAX_AGE.as_secs(),
            expiration_threshold_seconds: DEFAULT_EXPIRATION_THRESHOLD.as_secs(),
        }
    }
}

impl RefreshConfig {
    pub fn policy(&self) -> RefreshPolicy {
        RefreshPolicy::new(
            Duration::from_secs(self.max_age_seconds),
            Duration::from_secs(self.expiration_threshold_seconds),
        )
    }
}

/// ================================
/// Global service-wide settings
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SettingsConfig {
    pub metrics: MetricsConfig,
    pub server: ServerConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_path")]
    pub path: String,
    #[serde(default)]
    pub is_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { path: default_metrics_path(), is_enabled: false }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_owned(), port: "8080".to_owned() }
    }
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "compact".to_string())
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}
