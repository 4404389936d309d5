//! Entry point for the mkfsvol volume plugin daemon.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mkfsvol::VolumeDriver;
use mkfsvol_cli::cli::Cli;
use mkfsvol_cli::logging;
use mkfsvol_cli::server::PluginServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref(), cli.log_format);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "mkfsvol starting");

    let driver = VolumeDriver::new(cli.driver_options()).context("invalid configuration")?;
    let server = PluginServer::new(Arc::new(driver), cli.socket, cli.socket_group);
    server.run().await
}
