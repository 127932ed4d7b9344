//! Intake gateway binary.
//!
//! ## Startup sequence
//!
//! 1. Load configuration from the environment
//! 2. Initialize logging
//! 3. Open the store and wire the pipeline
//! 4. Serve until ctrl-c, then drain in-flight requests

use anyhow::{Context, Result};
use intake_gateway::{init_telemetry, GatewayConfig, IntakeService};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = GatewayConfig::from_env().context("failed to load configuration")?;

    init_telemetry(&config.logging).context("failed to initialize logging")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.http.addr,
        store = ?config.store.backend,
        rate_limiting = config.rate_limit.enabled,
        "Starting intake gateway"
    );

    let service = IntakeService::new(config).context("failed to build intake service")?;
    service.start().await.context("intake gateway failed")?;

    info!("Shutdown complete");
    Ok(())
}
