/// Blockway: block-graph workflow evaluation engine
///
/// Main entry point. Opens the database and runs the schedule poller until
/// Ctrl-C.

use blockway::{config::Config, service::start_service};

/// Application entry point
///
/// Configuration comes from defaults overridden by BLOCKWAY_* environment variables.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();

    start_service(config).await?;

    Ok(())
}
