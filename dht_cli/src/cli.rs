use clap::{Args, Parser, Subcommand, ValueEnum};
use dht_utils::CommandLineConfig;

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Builds a Chord or Pastry network and runs it until interrupted.
    Run(RunConfig),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    Chord,
    Pastry,
}

#[derive(Args, Debug, Clone)]
pub struct RunConfig {
    /// Which structured overlay to run.
    #[arg(long, value_enum, default_value_t = OverlayKind::Chord)]
    pub overlay: OverlayKind,

    /// Number of nodes to create, each with a synthetically hashed id.
    #[arg(long, default_value_t = 4)]
    pub node_count: usize,

    /// Port the first node binds to; subsequent nodes take the next ports.
    #[arg(long, default_value_t = 9000)]
    pub base_port: u16,

    /// Evenly spaced starting positions to hand Pastry joiners, before
    /// falling back to uniform random (ignored for Chord).
    #[arg(long, default_value_t = 16)]
    pub position_pool_size: usize,

    #[clap(flatten)]
    pub common: CommandLineConfig,
}
