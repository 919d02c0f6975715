mod cli;

use std::error::Error;
use std::net::TcpListener;
use std::time::Duration;

use beamtwin::{
    point, render_station_table, AnalyticSource, BeamTwin, DenseNetwork, InferenceSource,
    Point, ResponseSource, ScalerStats, StationTable, StressFieldSimulator, TelemetryAdapter,
    TelemetrySource, TickOutcome, TwinConfig, TwinInputs,
};
use clap::Parser;
use cli::{AnalyticArgs, Cli, Command, InferArgs, ListenArgs, ServeArgs, StationsArgs};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Columns of the analytic demo mesh.
const DEMO_COLUMNS: usize = 21;

/// Rows of the analytic demo mesh.
const DEMO_ROWS: usize = 5;

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();

    // Every field of the configuration has a default, so running without a file
    // models the reference beam.
    let config = match &cli.config {
        Some(path) => TwinConfig::from_path(path)?,
        None => TwinConfig::default(),
    };

    match cli.command {
        Command::Analytic(args) => run_analytic(config, &args),
        Command::Stations(args) => run_stations(&config, &args),
        Command::Infer(args) => run_infer(config, args),
        Command::Serve(args) => run_serve(config, args),
        Command::Listen(args) => run_listen(config, &args),
    }
}

/// Log to stderr, filtered by `RUST_LOG` and defaulting to `info`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);
    let _ = Registry::default().with(filter).with(fmt_layer).try_init();
}

/// Rectangular grid spanning the configured section, rows bottom to top.
fn demo_grid(config: &TwinConfig, columns: usize, rows: usize) -> Vec<Point> {
    let mut vertices = Vec::with_capacity(columns * rows);
    for row in 0..rows {
        for column in 0..columns {
            #[allow(clippy::cast_precision_loss)]
            let u = column as f64 / (columns.max(2) - 1) as f64;
            #[allow(clippy::cast_precision_loss)]
            let v = row as f64 / (rows.max(2) - 1) as f64;
            vertices.push(point(u * config.section.length, v * config.section.depth, 0.0));
        }
    }
    vertices
}

/// Print the status and station table of a twin.
fn print_twin<S: ResponseSource>(twin: &BeamTwin<S>) {
    println!("{}", twin.status());
    println!("{}", render_station_table(twin.stations()));
}

fn run_analytic(config: TwinConfig, args: &AnalyticArgs) -> Result<(), Box<dyn Error>> {
    let mut inputs = config.inputs;
    if let Some(u) = args.crack_at {
        inputs.crack.enabled = true;
        inputs.crack.center_u = u;
    }
    let vertices = demo_grid(&config, DEMO_COLUMNS, DEMO_ROWS);
    let mut twin = BeamTwin::initialize(vertices, config, AnalyticSource)?;

    let steps = args.steps.max(1);
    for step in 1..=steps {
        #[allow(clippy::cast_precision_loss)]
        let load = args.load * step as f64 / steps as f64;
        inputs.load_value = load;
        if twin.tick(&inputs) == TickOutcome::Recomputed {
            println!("{}", twin.status());
        }
    }
    println!("{}", render_station_table(twin.stations()));
    Ok(())
}

fn run_stations(config: &TwinConfig, args: &StationsArgs) -> Result<(), Box<dyn Error>> {
    let inputs = TwinInputs {
        load_value: args.load,
        ..config.inputs
    }
    .sanitized();
    let load_ratio = config.load_state(&inputs).load_ratio();
    let deflection = inputs.deflection_model().deflection_meters(load_ratio);
    let table = StationTable::sample(
        config.segments,
        &config.section,
        load_ratio * config.max_load,
        deflection,
    )?;
    println!("{}", render_station_table(&table));
    Ok(())
}

fn run_infer(mut config: TwinConfig, args: InferArgs) -> Result<(), Box<dyn Error>> {
    if args.model.is_some() {
        config.inference.model_path = args.model;
    }
    if args.scaler.is_some() {
        config.inference.scaler_path = args.scaler;
    }
    let adapter = config.inference.load_adapter()?;
    let inputs = TwinInputs {
        load_value: args.load,
        ..config.inputs
    };
    let vertices = demo_grid(&config, DEMO_COLUMNS, DEMO_ROWS);
    let mut twin = BeamTwin::initialize(vertices, config, InferenceSource::new(adapter))?;
    twin.tick(&inputs);
    print_twin(&twin);
    Ok(())
}

fn run_serve(mut config: TwinConfig, args: ServeArgs) -> Result<(), Box<dyn Error>> {
    if args.model.is_some() {
        config.inference.model_path = args.model;
    }
    if args.scaler.is_some() {
        config.inference.scaler_path = args.scaler;
    }
    let address = args.address.unwrap_or(config.telemetry.address);
    let scaler_path = config
        .inference
        .scaler_path
        .ok_or(beamtwin::ConfigError::MissingResource("scaler_path"))?;
    let model_path = config
        .inference
        .model_path
        .ok_or(beamtwin::ConfigError::MissingResource("model_path"))?;
    let scaler = ScalerStats::from_path(scaler_path)?;
    let network = DenseNetwork::from_path(model_path)?;

    let mut settings = config.simulator;
    settings.material = config.inference.material;
    let mut simulator = StressFieldSimulator::new(settings, scaler, Box::new(network))?;
    let listener = TcpListener::bind(&address)?;
    info!(%address, vertices = settings.vertex_count(), "serving telemetry");
    simulator.serve(&listener, args.limit)?;
    Ok(())
}

fn run_listen(config: TwinConfig, args: &ListenArgs) -> Result<(), Box<dyn Error>> {
    let address = args
        .address
        .clone()
        .unwrap_or_else(|| config.telemetry.address.clone());
    let adapter = TelemetryAdapter::connect(&address)?;
    info!(%address, "listening for telemetry");

    // The stress field is sampled on the simulator's grid, so the demo mesh uses the
    // same layout stretched over the section.
    let vertices: Vec<Point> = config
        .simulator
        .grid()
        .into_iter()
        .map(|p| point(p.x * config.section.length, p.y * config.section.depth, 0.0))
        .collect();
    let interval = Duration::from_millis(config.simulator.interval_ms.max(1));
    let inputs = config.inputs;
    let mut twin = BeamTwin::initialize(vertices, config, TelemetrySource::new(adapter))?;

    for _ in 0..args.ticks {
        if twin.tick(&inputs) == TickOutcome::Recomputed {
            println!("{}", twin.status());
        }
        std::thread::sleep(interval);
    }
    Ok(())
}
