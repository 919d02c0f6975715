#![warn(clippy::pedantic)]

use std::collections::HashMap;
use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

use beamtwin::inference::FeatureScale;
use beamtwin::{
    point, AnalyticSource, BeamTwin, Feature, FnBackend, Point, ScalerStats, SimulatorSettings,
    StressFieldSimulator, TelemetryAdapter, TelemetrySource, TickOutcome, TwinConfig,
    TwinInputs,
};

/// Columns and rows of the test mesh.
const COLUMNS: usize = 11;
const ROWS: usize = 3;

fn beam_mesh() -> Vec<Point> {
    let mut vertices = Vec::new();
    for row in 0..ROWS {
        for column in 0..COLUMNS {
            #[allow(clippy::cast_precision_loss)]
            vertices.push(point(
                column as f64 / (COLUMNS - 1) as f64,
                0.25 * row as f64 / (ROWS - 1) as f64,
                0.0,
            ));
        }
    }
    vertices
}

fn loaded(load_value: f64) -> TwinInputs {
    TwinInputs {
        load_value,
        ..TwinInputs::default()
    }
}

fn unit_scaler() -> ScalerStats {
    let table: HashMap<String, FeatureScale> = Feature::ALL
        .iter()
        .map(|feature| {
            (
                feature.key().to_owned(),
                FeatureScale {
                    mean: 0.0,
                    scale: 1.0,
                },
            )
        })
        .collect();
    ScalerStats::from_map(&table).expect("complete scaler table")
}

#[test]
fn reference_beam_matches_hand_calculation() {
    let mut twin = BeamTwin::initialize(beam_mesh(), TwinConfig::default(), AnalyticSource)
        .expect("twin initializes");
    assert_eq!(twin.tick(&loaded(92_745.0)), TickOutcome::Recomputed);

    let midspan = twin.positions()[COLUMNS / 2];
    assert!((midspan.y + 0.003_35).abs() < 1.0e-12);
    assert!(twin.positions()[0].y.abs() < f64::EPSILON);
    assert!(twin.positions()[COLUMNS - 1].y.abs() < f64::EPSILON);

    let stations = twin.stations();
    assert_eq!(stations.len(), 10);
    let first = stations.get(0).expect("first station");
    let expected_stress = 92_745.0 * 0.05 / 2.0 * 0.125 / 1.953_125e-4;
    assert!((first.bending_stress - expected_stress).abs() / expected_stress < 1.0e-9);
}

#[test]
fn deflection_deepens_monotonically_with_load() {
    let mut twin = BeamTwin::initialize(beam_mesh(), TwinConfig::default(), AnalyticSource)
        .expect("twin initializes");
    let mut previous = 0.0;
    for step in 1..=8 {
        twin.tick(&loaded(f64::from(step) * 25_000.0));
        let depth = -twin.positions()[COLUMNS / 2].y;
        assert!(depth >= previous);
        previous = depth;
    }
    // Beyond the rated load the ratio saturates.
    assert!((previous - 0.0067).abs() < 1.0e-12);
}

#[test]
fn bottom_face_is_hotter_than_top_face() {
    let mut twin = BeamTwin::initialize(beam_mesh(), TwinConfig::default(), AnalyticSource)
        .expect("twin initializes");
    twin.tick(&loaded(150_000.0));
    let bottom = twin.colors()[COLUMNS / 2];
    let top = twin.colors()[(ROWS - 1) * COLUMNS + COLUMNS / 2];
    // Hotter means closer to red: more red than green.
    assert!(bottom.r - bottom.g > top.r - top.g);
}

#[test]
fn negligible_load_neither_moves_nor_shades_the_beam() {
    let mut twin = BeamTwin::initialize(beam_mesh(), TwinConfig::default(), AnalyticSource)
        .expect("twin initializes");
    assert_eq!(twin.tick(&loaded(100.0)), TickOutcome::Recomputed);
    assert!(twin.load_ratio() > 0.0);
    assert_eq!(twin.positions(), beam_mesh().as_slice());
    let no_load = TwinConfig::default().gradient.no_load;
    assert!(twin.colors().iter().all(|color| *color == no_load));
}

#[test]
fn repeated_inputs_are_skipped() {
    let mut twin = BeamTwin::initialize(beam_mesh(), TwinConfig::default(), AnalyticSource)
        .expect("twin initializes");
    let inputs = loaded(40_000.0);
    assert_eq!(twin.tick(&inputs), TickOutcome::Recomputed);
    let status = twin.status().to_owned();
    for _ in 0..5 {
        assert_eq!(twin.tick(&inputs), TickOutcome::Skipped);
    }
    assert_eq!(twin.status(), status);
}

#[test]
fn configuration_file_round_trip() {
    let path = std::env::temp_dir().join(format!("beamtwin-config-{}.json", std::process::id()));
    std::fs::write(&path, r#"{"max_load": 100000.0, "segments": 6}"#).expect("write config");
    let config = TwinConfig::from_path(&path).expect("config loads");
    std::fs::remove_file(&path).expect("remove config");

    let mut twin =
        BeamTwin::initialize(beam_mesh(), config, AnalyticSource).expect("twin initializes");
    twin.tick(&loaded(50_000.0));
    assert_eq!(twin.stations().len(), 6);
    assert!((twin.load_ratio() - 0.5).abs() < f64::EPSILON);
}

#[test]
fn telemetry_streams_from_simulator_to_twin() {
    let settings = SimulatorSettings {
        resolution: 4,
        interval_ms: 0,
        ..SimulatorSettings::default()
    };
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let address = listener.local_addr().expect("local address");
    let server = thread::spawn(move || {
        // Stress grows linearly towards both ends of the beam.
        let backend = FnBackend::new(|row: &[f64]| vec![0.0, row[0].abs() / 525.0, 0.0]);
        let mut simulator =
            StressFieldSimulator::new(settings, unit_scaler(), Box::new(backend))
                .expect("simulator builds");
        simulator.serve(&listener, Some(3))
    });

    let adapter = TelemetryAdapter::connect(address).expect("client connects");
    let vertices: Vec<Point> = settings.grid();
    let mut twin = BeamTwin::initialize(
        vertices,
        TwinConfig::default(),
        TelemetrySource::new(adapter),
    )
    .expect("twin initializes");

    let deadline = Instant::now() + Duration::from_secs(10);
    let inputs = TwinInputs::default();
    while twin.readout().is_none() && Instant::now() < deadline {
        twin.tick(&inputs);
        thread::sleep(Duration::from_millis(5));
    }
    server
        .join()
        .expect("server thread")
        .expect("simulator streams");

    let readout = twin.readout().expect("a snapshot was applied");
    assert!(readout.damage > 0.05);
    assert_eq!(readout.remaining_useful_life, None);
    // Ends of the beam carry the largest predicted stress.
    let gradient = TwinConfig::default().gradient;
    assert_ne!(twin.colors()[0], gradient.no_load);
    assert_eq!(twin.colors()[2], gradient.no_load);
    assert_eq!(twin.positions(), settings.grid().as_slice());
}
