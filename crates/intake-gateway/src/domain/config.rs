//! Gateway configuration with validation.
//!
//! Loaded from environment variables by [`GatewayConfig::from_env`]. Every
//! variable is optional; unset variables keep their defaults.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `INTAKE_HTTP_ADDR` | `0.0.0.0:3000` |
//! | `INTAKE_MAX_BODY_BYTES` | `65536` |
//! | `PAYMENT_WEBHOOK_SECRET` | unset |
//! | `INTAKE_WEBHOOK_TOLERANCE` | `300s` |
//! | `INTAKE_RATE_LIMIT_ENABLED` | `true` |
//! | `INTAKE_RATE_LIMIT_GENERAL` | `20/1h` |
//! | `INTAKE_RATE_LIMIT_EXPENSIVE` | `5/1h` |
//! | `INTAKE_RATE_LIMIT_NOTIFICATION` | `10/1h` |
//! | `INTAKE_STORE` | `memory` |
//! | `INTAKE_STORE_PATH` | `./data/intake` |
//! | `INTAKE_STORE_TIMEOUT` | `2s` |
//! | `INTAKE_PROJECT_NAME` | `Intake` |
//! | `INTAKE_CONFIRMATION_EMAIL` | `true` |
//! | `MAIL_API_URL` | `https://api.resend.com/emails` |
//! | `MAIL_API_KEY` | unset |
//! | `MAIL_FROM` | `hello@example.com` |
//! | `MAIL_TIMEOUT` | `5s` |
//! | `INTAKE_JSON_LOGS` | `false` (`true` in containers) |
//! | `INTAKE_LOG_LEVEL` / `RUST_LOG` | `info` |

use intake_core::domain::{RateLimitPolicies, RateLimitPolicy, Secret, DEFAULT_TOLERANCE};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server configuration
    pub http: HttpConfig,
    /// Webhook verification
    pub webhook: WebhookConfig,
    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
    /// Shared store backend
    pub store: StoreConfig,
    /// Confirmation email
    pub notification: NotificationConfig,
    /// Log output
    pub logging: LoggingConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            webhook: WebhookConfig::default(),
            rate_limit: RateLimitConfig::default(),
            store: StoreConfig::default(),
            notification: NotificationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(addr) = get("INTAKE_HTTP_ADDR") {
            config.http.addr = addr
                .parse()
                .map_err(|_| ConfigError::invalid_var("INTAKE_HTTP_ADDR", "not a socket address"))?;
        }
        if let Some(bytes) = get("INTAKE_MAX_BODY_BYTES") {
            config.http.max_body_bytes = bytes
                .parse()
                .map_err(|_| ConfigError::invalid_var("INTAKE_MAX_BODY_BYTES", "not an integer"))?;
        }

        config.webhook.secret = get("PAYMENT_WEBHOOK_SECRET").map(Secret::new);
        if let Some(tolerance) = get("INTAKE_WEBHOOK_TOLERANCE") {
            config.webhook.tolerance = parse_var_duration("INTAKE_WEBHOOK_TOLERANCE", &tolerance)?;
        }

        if let Some(enabled) = get("INTAKE_RATE_LIMIT_ENABLED") {
            config.rate_limit.enabled = parse_bool("INTAKE_RATE_LIMIT_ENABLED", &enabled)?;
        }
        if let Some(policy) = get("INTAKE_RATE_LIMIT_GENERAL") {
            config.rate_limit.general = parse_var_policy("INTAKE_RATE_LIMIT_GENERAL", &policy)?;
        }
        if let Some(policy) = get("INTAKE_RATE_LIMIT_EXPENSIVE") {
            config.rate_limit.expensive = parse_var_policy("INTAKE_RATE_LIMIT_EXPENSIVE", &policy)?;
        }
        if let Some(policy) = get("INTAKE_RATE_LIMIT_NOTIFICATION") {
            config.rate_limit.notification =
                parse_var_policy("INTAKE_RATE_LIMIT_NOTIFICATION", &policy)?;
        }

        if let Some(backend) = get("INTAKE_STORE") {
            config.store.backend = match backend.to_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                "rocksdb" => StoreBackend::RocksDb,
                other => return Err(ConfigError::UnsupportedBackend(other.to_string())),
            };
        }
        if let Some(path) = get("INTAKE_STORE_PATH") {
            config.store.path = path;
        }
        if let Some(timeout) = get("INTAKE_STORE_TIMEOUT") {
            config.store.timeout = parse_var_duration("INTAKE_STORE_TIMEOUT", &timeout)?;
        }

        if let Some(name) = get("INTAKE_PROJECT_NAME") {
            config.notification.project_name = name;
        }
        if let Some(enabled) = get("INTAKE_CONFIRMATION_EMAIL") {
            config.notification.enabled = parse_bool("INTAKE_CONFIRMATION_EMAIL", &enabled)?;
        }
        if let Some(url) = get("MAIL_API_URL") {
            config.notification.api_url = url;
        }
        config.notification.api_key = get("MAIL_API_KEY").map(Secret::new);
        if let Some(from) = get("MAIL_FROM") {
            config.notification.from = from;
        }
        if let Some(timeout) = get("MAIL_TIMEOUT") {
            config.notification.timeout = parse_var_duration("MAIL_TIMEOUT", &timeout)?;
        }

        let in_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();
        config.logging.json = match get("INTAKE_JSON_LOGS") {
            Some(json) => parse_bool("INTAKE_JSON_LOGS", &json)?,
            None => in_container,
        };
        if let Some(level) = get("INTAKE_LOG_LEVEL").or_else(|| get("RUST_LOG")) {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.max_body_bytes == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_body_bytes cannot be 0".into(),
            ));
        }

        for (name, policy) in [
            ("general", self.rate_limit.general),
            ("expensive", self.rate_limit.expensive),
            ("notification", self.rate_limit.notification),
        ] {
            if policy.limit == 0 {
                return Err(ConfigError::InvalidRateLimit(format!(
                    "{name} limit cannot be 0"
                )));
            }
            if policy.window.is_zero() {
                return Err(ConfigError::InvalidRateLimit(format!(
                    "{name} window cannot be 0"
                )));
            }
        }

        if self.webhook.tolerance.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "webhook tolerance cannot be 0".into(),
            ));
        }
        if self.store.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("store timeout cannot be 0".into()));
        }
        if self.notification.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("mail timeout cannot be 0".into()));
        }

        if self.store.backend == StoreBackend::RocksDb && self.store.path.trim().is_empty() {
            return Err(ConfigError::Invalid("store path cannot be empty".into()));
        }

        if self.notification.enabled {
            if self.notification.project_name.trim().is_empty() {
                return Err(ConfigError::Invalid("project name cannot be empty".into()));
            }
            if !self.notification.api_url.starts_with("http://")
                && !self.notification.api_url.starts_with("https://")
            {
                return Err(ConfigError::Invalid(format!(
                    "mail API URL must be http(s): {}",
                    self.notification.api_url
                )));
            }
        }

        Ok(())
    }

    /// Rate-limit policies for the core limiter.
    pub fn policies(&self) -> RateLimitPolicies {
        RateLimitPolicies {
            general: self.rate_limit.general,
            expensive: self.rate_limit.expensive,
            notification: self.rate_limit.notification,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address (default: 0.0.0.0:3000)
    pub addr: SocketAddr,
    /// Max request body size in bytes (default: 64 KiB)
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 3000),
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Webhook verification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Endpoint signing secret. Unset means every webhook is rejected.
    #[serde(skip)]
    pub secret: Option<Secret>,
    /// Accepted clock skew for signed timestamps
    #[serde(with = "humantime_serde")]
    pub tolerance: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: None,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    pub enabled: bool,
    /// Public traffic (webhooks)
    #[serde(with = "policy_serde")]
    pub general: RateLimitPolicy,
    /// Expensive operations
    #[serde(with = "policy_serde")]
    pub expensive: RateLimitPolicy,
    /// Requests that send email (enrollment)
    #[serde(with = "policy_serde")]
    pub notification: RateLimitPolicy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let defaults = RateLimitPolicies::default();
        Self {
            enabled: true,
            general: defaults.general,
            expensive: defaults.expensive,
            notification: defaults.notification,
        }
    }
}

/// Store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local, for development and tests
    Memory,
    /// Durable RocksDB (requires the `rocksdb` feature)
    #[serde(rename = "rocksdb")]
    RocksDb,
}

/// Shared store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Database directory for RocksDB
    pub path: String,
    /// Bound on every store call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: "./data/intake".to_string(),
            timeout: Duration::from_secs(2),
        }
    }
}

/// Confirmation email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Send confirmation emails after enrollment
    pub enabled: bool,
    /// Project name used in the subject line
    pub project_name: String,
    /// Mail provider endpoint
    pub api_url: String,
    /// Mail provider API key
    #[serde(skip)]
    pub api_key: Option<Secret>,
    /// Sender address
    pub from: String,
    /// Bound on one delivery attempt
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            project_name: "Intake".to_string(),
            api_url: "https://api.resend.com/emails".to_string(),
            api_key: None,
            from: "hello@example.com".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// JSON lines instead of human-readable output
    pub json: bool,
    /// `EnvFilter` directive
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            level: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed
    #[error("invalid value for {var}: {message}")]
    InvalidVar { var: &'static str, message: String },
    /// Invalid rate limiting configuration
    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// Unknown store backend
    #[error("unsupported store backend: {0}")]
    UnsupportedBackend(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid_var(var: &'static str, message: impl Into<String>) -> Self {
        ConfigError::InvalidVar {
            var,
            message: message.into(),
        }
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid_var(var, "expected true or false")),
    }
}

fn parse_var_duration(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value).map_err(|e| ConfigError::invalid_var(var, e))
}

fn parse_var_policy(var: &'static str, value: &str) -> Result<RateLimitPolicy, ConfigError> {
    parse_policy(value).map_err(|e| ConfigError::invalid_var(var, e))
}

/// Parse `10`, `250ms`, `30s`, `5m` or `1h`. Plain numbers are seconds.
pub fn parse_duration(s: &str) -> Result<Duration, &'static str> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| "invalid milliseconds")
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| "invalid seconds")
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
            .ok_or("invalid minutes")
    } else if let Some(hours) = s.strip_suffix('h') {
        hours
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|h| h.checked_mul(3600))
            .map(Duration::from_secs)
            .ok_or("invalid hours")
    } else {
        s.parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| "invalid duration format")
    }
}

/// Parse `<limit>/<window>`, for example `20/1h`.
pub fn parse_policy(s: &str) -> Result<RateLimitPolicy, &'static str> {
    let (limit, window) = s.split_once('/').ok_or("expected <limit>/<window>")?;
    let limit = limit.trim().parse::<u32>().map_err(|_| "invalid limit")?;
    let window = parse_duration(window)?;
    Ok(RateLimitPolicy::new(limit, window))
}

fn format_duration(duration: &Duration) -> String {
    let millis = duration.as_millis();
    if millis % 1000 != 0 {
        format!("{millis}ms")
    } else {
        format!("{}s", duration.as_secs())
    }
}

/// Humantime serde module for Duration serialization
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_duration(duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

/// `<limit>/<window>` serde module for rate-limit policies
mod policy_serde {
    use intake_core::domain::RateLimitPolicy;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(policy: &RateLimitPolicy, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!(
            "{}/{}",
            policy.limit,
            super::format_duration(&policy.window)
        ))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<RateLimitPolicy, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_policy(&s).map_err(serde::de::Error::custom)
    }
}
