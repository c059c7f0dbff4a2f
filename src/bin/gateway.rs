use anyhow::{Error, Result, anyhow};
use tracing_subscriber::EnvFilter;

use minicrm::config::Config;
use minicrm::gateway::api::run_gateway;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;

    run_gateway(config)
        .await
        .map_err(|e| anyhow!("gateway server failed: {}", e))
}
