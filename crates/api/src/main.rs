//! Fleet-Tracking Core - Main Entry Point

use api::{build_state, init_logging, run_server, AppConfig, Collaborators};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.log_filter);

    info!("=== FleetTrace Tracking Core v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Starting vehicle tracking and alerting engine...");

    let state = build_state(config, Collaborators::default()).await?;
    run_server(state).await?;

    Ok(())
}
