//! Log subscriber setup.
//!
//! JSON lines in containers, human-readable output otherwise. The filter
//! comes from [`LoggingConfig::level`], which already honours `RUST_LOG`.

use crate::domain::config::LoggingConfig;
use crate::domain::error::GatewayError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Fails if one is already set.
pub fn init_telemetry(config: &LoggingConfig) -> Result<(), GatewayError> {
    let env_filter = EnvFilter::try_new(&config.level)
        .map_err(|e| GatewayError::Config(format!("invalid log filter: {e}")))?;

    if config.json {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
    }

    tracing::info!(
        json = config.json,
        level = %config.level,
        "Logging initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_rejected() {
        let config = LoggingConfig {
            json: false,
            level: "intake=verbose".to_string(),
        };
        assert!(matches!(
            init_telemetry(&config),
            Err(GatewayError::Config(_))
        ));
    }
}
