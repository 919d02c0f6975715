use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

/// Command line of the beam twin.
#[derive(Parser)]
#[command(author, version, about = "Digital twin of a loaded beam")]
pub struct Cli {
    /// JSON configuration file; fields it omits keep their defaults
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// What to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Drive the analytic source on a demo mesh and print status and stations
    Analytic(AnalyticArgs),

    /// Print the station table for a load
    Stations(StationsArgs),

    /// Colour a demo mesh from a neural-network stress prediction
    Infer(InferArgs),

    /// Stream simulated stress fields to telemetry clients
    Serve(ServeArgs),

    /// Colour a demo mesh from a telemetry stream
    Listen(ListenArgs),
}

/// Arguments of `analytic`.
#[derive(Args)]
pub struct AnalyticArgs {
    /// Final load in newtons
    #[arg(long)]
    pub load: f64,

    /// Ramp the load up in this many equal steps
    #[arg(long, default_value_t = 1)]
    pub steps: usize,

    /// Place a manual crack at this normalized position along the beam
    #[arg(long)]
    pub crack_at: Option<f64>,
}

/// Arguments of `stations`.
#[derive(Args)]
pub struct StationsArgs {
    /// Load in newtons
    #[arg(long)]
    pub load: f64,
}

/// Arguments of `infer`.
#[derive(Args)]
pub struct InferArgs {
    /// Dense network file (overrides the configuration)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub model: Option<PathBuf>,

    /// Scaler statistics file (overrides the configuration)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub scaler: Option<PathBuf>,

    /// Load in newtons
    #[arg(long)]
    pub load: f64,
}

/// Arguments of `serve`.
#[derive(Args)]
pub struct ServeArgs {
    /// Dense network file (overrides the configuration)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub model: Option<PathBuf>,

    /// Scaler statistics file (overrides the configuration)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub scaler: Option<PathBuf>,

    /// Address to listen on (overrides the configuration)
    #[arg(long)]
    pub address: Option<String>,

    /// Stop after streaming this many snapshots to one client
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Arguments of `listen`.
#[derive(Args)]
pub struct ListenArgs {
    /// Address of the telemetry stream (overrides the configuration)
    #[arg(long)]
    pub address: Option<String>,

    /// Number of ticks to run before exiting
    #[arg(long, default_value_t = 20)]
    pub ticks: usize,
}
