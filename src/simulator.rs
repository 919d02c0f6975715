//! Stress-field simulator producing the telemetry stream the twin listens to.
//!
//! Each step evaluates the stress network on a regular grid over the physical beam,
//! amplifies the field by the current damage, grows the damage according to the peak
//! stress and, once enough history exists, asks a prognostics model for the damage
//! prediction and remaining useful life.

use std::io::Write;
use std::net::TcpListener;
use std::time::Duration;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::InferenceError;
use crate::geometry::{point, AxisBounds, LengthAxis, Point};
use crate::inference::{
    CoordinateMapping, InferenceAdapter, InferenceBackend, MaterialConstants, ScalerStats,
};
use crate::prognosis::{
    remaining_useful_life, DamageEvolution, Prognostics, StressHistory, StressSample,
    FAILURE_THRESHOLD, HISTORY_WINDOW,
};
use crate::telemetry::TelemetrySnapshot;

/// Fixed operating point and timing of the simulated beam.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorSettings {
    /// Grid cells per side; the field has `(resolution + 1)^2` values.
    pub resolution: usize,
    /// Physical span the grid covers.
    pub beam_length: f64,
    /// Physical depth the grid covers.
    pub beam_height: f64,
    /// Applied load fed to the network.
    pub load_mag: f64,
    /// Global deflection fed to the network.
    pub global_deflection: f64,
    /// Material constants fed to the network.
    pub material: MaterialConstants,
    /// Damage at which the beam is considered failed.
    pub failure_threshold: f64,
    /// Simulated time per step.
    pub time_step: f64,
    /// Wall-clock pause between streamed snapshots, in milliseconds.
    pub interval_ms: u64,
    /// Damage at the first step.
    pub initial_damage: f64,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            resolution: 50,
            beam_length: 1050.0,
            beam_height: 300.0,
            load_mag: 50_000.0,
            global_deflection: 5.5,
            material: MaterialConstants::default(),
            failure_threshold: FAILURE_THRESHOLD,
            time_step: 1.0,
            interval_ms: 500,
            initial_damage: DamageEvolution::default().damage,
        }
    }
}

impl SimulatorSettings {
    /// Number of values in every stress field.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        (self.resolution + 1) * (self.resolution + 1)
    }

    /// Unit grid in the order the stress field is streamed: rows bottom to top, each
    /// row left to right.
    #[must_use]
    pub fn grid(&self) -> Vec<Point> {
        let cells = self.resolution.max(1);
        #[allow(clippy::cast_precision_loss)]
        let step = 1.0 / cells as f64;
        let mut grid = Vec::with_capacity(self.vertex_count());
        for row in 0..=self.resolution {
            for column in 0..=self.resolution {
                #[allow(clippy::cast_precision_loss)]
                grid.push(point(column as f64 * step, row as f64 * step, 0.0));
            }
        }
        grid
    }
}

/// Evolving beam whose stress field is sampled once per step.
pub struct StressFieldSimulator {
    /// Operating point.
    settings: SimulatorSettings,
    /// Stress network behind the scaler.
    adapter: InferenceAdapter,
    /// Evaluation grid.
    grid: Vec<Point>,
    /// Bounds of the evaluation grid.
    bounds: AxisBounds,
    /// Undamaged stress field, evaluated once.
    base_field: Option<Vec<f64>>,
    /// Damage state.
    damage: DamageEvolution,
    /// Recent peak and mean stresses.
    history: StressHistory,
    /// Sequence model used once the history window is full.
    prognostics: Option<Box<dyn Prognostics>>,
    /// Time stamped on the next snapshot.
    time: f64,
}

impl StressFieldSimulator {
    /// Simulator evaluating `backend` on the settings' grid.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::Backend`] when the grid resolution is zero.
    pub fn new(
        settings: SimulatorSettings,
        scaler: ScalerStats,
        backend: Box<dyn InferenceBackend>,
    ) -> Result<Self, InferenceError> {
        if settings.resolution == 0 {
            return Err(InferenceError::Backend(
                "simulator grid needs at least one cell".to_owned(),
            ));
        }
        let grid = settings.grid();
        let bounds = AxisBounds::from_vertices(&grid, LengthAxis::X)
            .map_err(|err| InferenceError::Backend(err.to_string()))?;
        let adapter = InferenceAdapter::new(scaler, backend, settings.material);
        Ok(Self {
            settings,
            adapter,
            grid,
            bounds,
            base_field: None,
            damage: DamageEvolution {
                damage: settings.initial_damage,
                ..DamageEvolution::default()
            },
            history: StressHistory::with_capacity(HISTORY_WINDOW),
            prognostics: None,
            time: 0.0,
        })
    }

    /// Use `model` for the damage prediction once the history window is full.
    #[must_use]
    pub fn with_prognostics(mut self, model: Box<dyn Prognostics>) -> Self {
        self.prognostics = Some(model);
        self
    }

    /// Settings in use.
    #[must_use]
    pub fn settings(&self) -> &SimulatorSettings {
        &self.settings
    }

    /// Current damage state.
    #[must_use]
    pub fn damage(&self) -> f64 {
        self.damage.damage
    }

    /// Time stamped on the next snapshot.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Undamaged stress field, evaluated on first use.
    fn base_field(&mut self) -> Result<&[f64], InferenceError> {
        if self.base_field.is_none() {
            let mapping = CoordinateMapping::Physical {
                length: self.settings.beam_length,
                height: self.settings.beam_height,
            };
            let features: Array2<f64> = self.adapter.feature_batch(
                &self.grid,
                &self.bounds,
                &mapping,
                self.settings.load_mag,
                self.settings.global_deflection,
            );
            let field = self.adapter.predict_stress(features.view())?;
            debug!(values = field.len(), "evaluated base stress field");
            self.base_field = Some(field);
        }
        Ok(self.base_field.as_deref().unwrap_or_default())
    }

    /// Advance one step and return its snapshot.
    ///
    /// # Errors
    ///
    /// Returns the stress network's or the prognostics model's error. The simulator
    /// state is left unchanged in that case.
    pub fn step(&mut self) -> Result<TelemetrySnapshot, InferenceError> {
        let amplification = 1.0 + 2.5 * self.damage.damage;
        let stress_field: Vec<f64> = self
            .base_field()?
            .iter()
            .map(|stress| stress * amplification)
            .collect();
        let sample = StressSample::from_field(&stress_field);

        let mut damage = self.damage;
        damage.advance(sample.max);
        let mut history = self.history.clone();
        history.push(sample);

        let (damage_prediction, rul) = if history.is_full() {
            let predicted = match &self.prognostics {
                Some(model) => model.predict_damage(&history.window())?,
                None => damage.damage,
            };
            let rul = remaining_useful_life(
                predicted,
                self.settings.failure_threshold,
                self.settings.time_step,
            );
            (predicted, Some(rul))
        } else {
            (damage.damage, None)
        };

        let snapshot = TelemetrySnapshot {
            time: self.time,
            stress_field,
            damage_prediction,
            rul,
        };
        debug!(
            time = self.time,
            damage = damage.damage,
            max_stress = sample.max,
            "simulator step"
        );
        self.damage = damage;
        self.history = history;
        self.time += self.settings.time_step;
        Ok(snapshot)
    }

    /// Stream snapshots as JSON lines to `sink`, pausing `interval` between them.
    ///
    /// Stops after `limit` snapshots when given, or when the sink fails.
    ///
    /// # Errors
    ///
    /// Returns the error of a failed step, or [`InferenceError::Parse`] when a snapshot
    /// cannot be encoded.
    pub fn stream<W: Write>(
        &mut self,
        sink: &mut W,
        interval: Duration,
        limit: Option<usize>,
    ) -> Result<usize, InferenceError> {
        let mut sent = 0;
        while limit.map_or(true, |limit| sent < limit) {
            let snapshot = self.step()?;
            let line = serde_json::to_string(&snapshot)?;
            if let Err(err) = writeln!(sink, "{line}").and_then(|()| sink.flush()) {
                info!(%err, sent, "telemetry client went away");
                break;
            }
            sent += 1;
            if !interval.is_zero() {
                std::thread::sleep(interval);
            }
        }
        Ok(sent)
    }

    /// Accept clients on `listener` one at a time and stream to each until it
    /// disconnects. The simulation keeps its state across clients.
    ///
    /// # Errors
    ///
    /// Returns the first step failure.
    pub fn serve(
        &mut self,
        listener: &TcpListener,
        limit: Option<usize>,
    ) -> Result<(), InferenceError> {
        let interval = Duration::from_millis(self.settings.interval_ms);
        for stream in listener.incoming() {
            let mut stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(%err, "failed to accept telemetry client");
                    continue;
                }
            };
            let peer = stream
                .peer_addr()
                .map_or_else(|_| "unknown".to_owned(), |addr| addr.to_string());
            info!(%peer, "telemetry client connected");
            let sent = self.stream(&mut stream, interval, limit)?;
            info!(%peer, sent, "telemetry client finished");
            if limit.is_some() {
                break;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for StressFieldSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StressFieldSimulator")
            .field("settings", &self.settings)
            .field("damage", &self.damage)
            .field("history", &self.history.len())
            .field("time", &self.time)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use approx::assert_relative_eq;

    use super::*;
    use crate::inference::{Feature, FeatureScale, FnBackend};

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
        ScalerStats::from_map(&table).expect("complete table")
    }

    fn small_settings() -> SimulatorSettings {
        SimulatorSettings {
            resolution: 2,
            interval_ms: 0,
            ..SimulatorSettings::default()
        }
    }

    fn constant_backend(stress: f64) -> Box<dyn InferenceBackend> {
        Box::new(FnBackend::new(move |_: &[f64]| vec![0.0, stress, 0.0]))
    }

    #[test]
    fn grid_covers_the_physical_beam_row_by_row() {
        let settings = small_settings();
        let grid = settings.grid();
        assert_eq!(grid.len(), 9);
        assert_eq!(settings.vertex_count(), 9);
        assert_eq!(grid[1], point(0.5, 0.0, 0.0));
        assert_eq!(grid[3], point(0.0, 0.5, 0.0));
        assert_eq!(SimulatorSettings::default().vertex_count(), 2601);
    }

    #[test]
    fn network_sees_centred_physical_coordinates() {
        let backend = FnBackend::new(|row: &[f64]| vec![0.0, row[0] + row[1] / 1000.0, 0.0]);
        let mut simulator =
            StressFieldSimulator::new(small_settings(), unit_scaler(), Box::new(backend))
                .expect("simulator");
        let snapshot = simulator.step().expect("step");
        let amplification = 1.0 + 2.5 * 0.05;
        assert_relative_eq!(
            snapshot.stress_field[0],
            (-525.0 - 0.15) * amplification,
            max_relative = 1.0e-12
        );
        assert_relative_eq!(
            snapshot.stress_field[8],
            (525.0 + 0.15) * amplification,
            max_relative = 1.0e-12
        );
    }

    #[test]
    fn damage_amplifies_stress_and_grows_each_step() {
        let mut simulator =
            StressFieldSimulator::new(small_settings(), unit_scaler(), constant_backend(1.0e6))
                .expect("simulator");
        let first = simulator.step().expect("first step");
        assert_relative_eq!(first.stress_field[4], 1.0e6 * 1.125, max_relative = 1.0e-12);
        assert_relative_eq!(simulator.damage(), 0.05 + 0.002 + 0.045, max_relative = 1.0e-12);
        assert_eq!(first.time, 0.0);
        assert_eq!(first.rul, None);

        let second = simulator.step().expect("second step");
        assert_eq!(second.time, 1.0);
        assert!(second.stress_field[4] > first.stress_field[4]);
    }

    #[test]
    fn rul_appears_once_the_history_window_is_full() {
        let mut simulator =
            StressFieldSimulator::new(small_settings(), unit_scaler(), constant_backend(0.0))
                .expect("simulator")
                .with_prognostics(Box::new(|_: &[StressSample]| 0.4));
        for _ in 0..HISTORY_WINDOW - 1 {
            let snapshot = simulator.step().expect("warm-up step");
            assert_eq!(snapshot.rul, None);
        }
        let snapshot = simulator.step().expect("full window");
        assert_relative_eq!(snapshot.damage_prediction, 0.4);
        assert_relative_eq!(snapshot.rul.expect("rul"), 0.5, epsilon = 1.0e-12);
    }

    #[test]
    fn without_prognostics_the_damage_state_is_reported() {
        let mut simulator =
            StressFieldSimulator::new(small_settings(), unit_scaler(), constant_backend(0.0))
                .expect("simulator");
        let snapshot = simulator.step().expect("step");
        assert_relative_eq!(snapshot.damage_prediction, 0.052, epsilon = 1.0e-12);
    }

    #[test]
    fn streamed_lines_parse_as_snapshots() {
        let mut simulator =
            StressFieldSimulator::new(small_settings(), unit_scaler(), constant_backend(2.0))
                .expect("simulator");
        let mut sink = Vec::new();
        let sent = simulator
            .stream(&mut sink, Duration::ZERO, Some(3))
            .expect("stream");
        assert_eq!(sent, 3);
        let text = String::from_utf8(sink).expect("utf-8");
        let snapshots: Vec<TelemetrySnapshot> = text
            .lines()
            .map(|line| TelemetrySnapshot::parse(line).expect("valid line"))
            .collect();
        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots[2].time, 2.0);
        assert_eq!(snapshots[0].stress_field.len(), 9);
    }

    #[test]
    fn zero_resolution_is_rejected() {
        let settings = SimulatorSettings {
            resolution: 0,
            ..SimulatorSettings::default()
        };
        assert!(StressFieldSimulator::new(settings, unit_scaler(), constant_backend(0.0)).is_err());
    }
}
