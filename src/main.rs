use adbhost::adb::AdbServer;
use adbhost::cli::Cli;
use adbhost::config::ServerConfig;
use adbhost::device::MemoryRegistry;
use clap::Parser;
use log::*;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    let mut config = ServerConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);

    let registry = Arc::new(MemoryRegistry::from_config(&config));
    let mut server = AdbServer::from_config(&config, registry)?;
    let addr = server.start().await?;
    info!("Serving {} device(s) on {}", config.devices.len(), addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    server.stop().await;

    Ok(())
}
