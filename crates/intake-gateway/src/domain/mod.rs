//! Gateway configuration and error types.

pub mod config;
pub mod error;

pub use config::{
    GatewayConfig, HttpConfig, LoggingConfig, NotificationConfig, RateLimitConfig, StoreBackend,
    StoreConfig, WebhookConfig,
};
pub use error::{ApiError, ApiResult, FieldError, GatewayError, RateLimitInfo};
