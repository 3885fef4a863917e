use clap::Parser;
use dht_cli::cli::{self, OverlayKind};
use dht_network::{Network, Overlay};
use dht_types::NodeId;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = cli::Cli::parse();
    match cli.command {
        cli::Commands::Run(config) => run(config).await?,
    }
    Ok(())
}

async fn run(config: cli::RunConfig) -> Result<(), Box<dyn Error>> {
    tracer::init_tracing("dht-cli", Some(&config.common.log_level));

    let overlay = match config.overlay {
        OverlayKind::Chord => Overlay::Chord,
        OverlayKind::Pastry => Overlay::Pastry,
    };
    let network = Network::new(overlay, config.common.host.clone(), config.base_port, config.common.clone(), config.position_pool_size);

    let ids: Vec<NodeId> = (0..config.node_count).map(|i| NodeId::from_hash(&format!("node-{i}"))).collect();
    network.build(ids).await?;
    tracing::info!(nodes = config.node_count, overlay = ?config.overlay, "network is up, awaiting Ctrl-C");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    Ok(())
}
