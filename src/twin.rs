//! The beam twin controller and the response sources that drive it.
//!
//! A [`BeamTwin`] owns the vertex and colour buffers of one mesh. Every tick it checks
//! whether the host's inputs changed observably (or the source has fresh data), asks
//! its [`ResponseSource`] for a displacement field and per-vertex shades, writes them
//! into the buffers and regenerates the station table and status text.

use tracing::{debug, info, trace, warn};

use crate::color::Color;
use crate::config::{TwinConfig, TwinInputs};
use crate::errors::TwinError;
use crate::gate::StaleStateGate;
use crate::geometry::{AxisBounds, Point, VertexBuffer};
use crate::inference::InferenceAdapter;
use crate::intensity::{IntensityModel, Shade, NO_LOAD_RATIO};
use crate::report::{render_status, StatusSummary};
use crate::stations::StationTable;
use crate::telemetry::{DamageReadout, TelemetryAdapter};

/// Read-only view of one recompute handed to a [`ResponseSource`].
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    /// Undisplaced vertices.
    pub vertices: &'a [Point],
    /// Extents of the undisplaced mesh.
    pub bounds: &'a AxisBounds,
    /// Sanitized inputs of this recompute.
    pub inputs: &'a TwinInputs,
    /// Load divided by the rated load, in `[0, 1]`.
    pub load_ratio: f64,
}

/// Produces the per-vertex response of the beam.
///
/// Returning `None` keeps the previous buffer, so a failing source degrades to a
/// frozen mesh instead of a broken one.
pub trait ResponseSource {
    /// Short name shown in the status text.
    fn name(&self) -> &'static str;

    /// Vertical displacement per vertex.
    fn produce_displacement(&mut self, frame: &Frame<'_>) -> Option<Vec<f64>>;

    /// Shade per vertex.
    fn produce_intensity(&mut self, frame: &Frame<'_>) -> Option<Vec<Shade>>;

    /// Whether the source holds data that should trigger a recompute on its own.
    fn has_pending(&self) -> bool {
        false
    }

    /// Latest damage readout for a display.
    fn readout(&self) -> Option<DamageReadout> {
        None
    }
}

/// Closed-form deflection with the bottom-tension crack heuristic.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnalyticSource;

impl ResponseSource for AnalyticSource {
    fn name(&self) -> &'static str {
        "analytic"
    }

    fn produce_displacement(&mut self, frame: &Frame<'_>) -> Option<Vec<f64>> {
        Some(frame.inputs.deflection_model().displace_all(
            frame.load_ratio,
            frame.vertices,
            frame.bounds,
        ))
    }

    fn produce_intensity(&mut self, frame: &Frame<'_>) -> Option<Vec<Shade>> {
        let model = IntensityModel {
            params: frame.inputs.intensity,
        };
        let point_load = frame.inputs.point_load.localize(&frame.inputs.pose);
        Some(model.shade_all(
            frame.vertices,
            frame.bounds,
            frame.load_ratio,
            point_load.as_ref(),
            Some(&frame.inputs.crack),
        ))
    }
}

/// Closed-form deflection with stress predicted by a neural network.
#[derive(Debug)]
pub struct InferenceSource {
    /// Normalization and forward pass.
    adapter: InferenceAdapter,
}

impl InferenceSource {
    /// Source backed by `adapter`.
    #[must_use]
    pub fn new(adapter: InferenceAdapter) -> Self {
        Self { adapter }
    }
}

impl ResponseSource for InferenceSource {
    fn name(&self) -> &'static str {
        "inference"
    }

    fn produce_displacement(&mut self, frame: &Frame<'_>) -> Option<Vec<f64>> {
        Some(frame.inputs.deflection_model().displace_all(
            frame.load_ratio,
            frame.vertices,
            frame.bounds,
        ))
    }

    fn produce_intensity(&mut self, frame: &Frame<'_>) -> Option<Vec<Shade>> {
        if frame.load_ratio <= NO_LOAD_RATIO {
            return Some(vec![Shade::NoLoad; frame.vertices.len()]);
        }
        let inputs = frame.inputs;
        let features = self.adapter.feature_batch(
            frame.vertices,
            frame.bounds,
            &inputs.mapping,
            inputs.load_value,
            frame.load_ratio * inputs.max_deflection_mm,
        );
        match self.adapter.predict_stress(features.view()) {
            Ok(stress) => Some(InferenceAdapter::shade(
                &stress,
                inputs.sensitivity,
                inputs.crack_threshold,
            )),
            Err(err) => {
                warn!(%err, "inference failed; keeping previous colours");
                None
            }
        }
    }
}

/// Colours from streamed stress fields; geometry is left as it is.
#[derive(Debug, Default)]
pub struct TelemetrySource {
    /// Mailbox and optional receive thread.
    adapter: TelemetryAdapter,
    /// Readout of the last applied snapshot.
    last: Option<DamageReadout>,
}

impl TelemetrySource {
    /// Source reading snapshots through `adapter`.
    #[must_use]
    pub fn new(adapter: TelemetryAdapter) -> Self {
        Self {
            adapter,
            last: None,
        }
    }

    /// Adapter in use, e.g. to store snapshots into its slot.
    #[must_use]
    pub fn adapter(&self) -> &TelemetryAdapter {
        &self.adapter
    }
}

impl ResponseSource for TelemetrySource {
    fn name(&self) -> &'static str {
        "telemetry"
    }

    fn produce_displacement(&mut self, _frame: &Frame<'_>) -> Option<Vec<f64>> {
        None
    }

    fn produce_intensity(&mut self, frame: &Frame<'_>) -> Option<Vec<Shade>> {
        let snapshot = self.adapter.slot().take()?;
        match TelemetryAdapter::shade(
            &snapshot,
            frame.vertices.len(),
            frame.inputs.telemetry_sensitivity,
        ) {
            Ok(shades) => {
                self.last = Some(snapshot.readout());
                Some(shades)
            }
            Err(err) => {
                warn!(%err, time = snapshot.time, "dropping telemetry snapshot");
                None
            }
        }
    }

    fn has_pending(&self) -> bool {
        self.adapter.slot().has_pending()
    }

    fn readout(&self) -> Option<DamageReadout> {
        self.last
    }
}

impl<S: ResponseSource + ?Sized> ResponseSource for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn produce_displacement(&mut self, frame: &Frame<'_>) -> Option<Vec<f64>> {
        (**self).produce_displacement(frame)
    }

    fn produce_intensity(&mut self, frame: &Frame<'_>) -> Option<Vec<Shade>> {
        (**self).produce_intensity(frame)
    }

    fn has_pending(&self) -> bool {
        (**self).has_pending()
    }

    fn readout(&self) -> Option<DamageReadout> {
        (**self).readout()
    }
}

/// Receives the displaced positions and colours after a recompute.
pub trait MeshWriter {
    /// Replace the mesh's positions and colours. Both slices have one entry per vertex.
    fn write(&mut self, positions: &[Point], colors: &[Color]);
}

/// Mesh buffers owned on the host side.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshBuffers {
    /// Vertex positions.
    pub positions: Vec<Point>,
    /// Vertex colours.
    pub colors: Vec<Color>,
    /// Number of writes received.
    pub writes: usize,
}

impl MeshWriter for MeshBuffers {
    fn write(&mut self, positions: &[Point], colors: &[Color]) {
        self.positions.clear();
        self.positions.extend_from_slice(positions);
        self.colors.clear();
        self.colors.extend_from_slice(colors);
        self.writes += 1;
    }
}

/// Whether a tick changed the buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Buffers, stations and status were regenerated.
    Recomputed,
    /// Nothing observable changed; buffers are untouched.
    Skipped,
}

/// Digital twin of one beam mesh.
///
/// # Examples
/// ```
/// use beamtwin::{point, AnalyticSource, BeamTwin, TickOutcome, TwinConfig, TwinInputs};
///
/// let vertices = vec![
///     point(0.0, 0.0, 0.0),
///     point(0.5, 0.0, 0.0),
///     point(1.0, 0.0, 0.0),
///     point(0.5, 0.25, 0.0),
/// ];
/// let mut twin = BeamTwin::initialize(vertices, TwinConfig::default(), AnalyticSource).unwrap();
/// let inputs = TwinInputs {
///     load_value: 92_745.0,
///     ..TwinInputs::default()
/// };
/// assert_eq!(twin.tick(&inputs), TickOutcome::Recomputed);
/// assert_eq!(twin.tick(&inputs), TickOutcome::Skipped);
/// assert!((twin.positions()[1].y + 0.00335).abs() < 1.0e-9);
/// ```
#[derive(Debug)]
pub struct BeamTwin<S> {
    /// Static settings.
    config: TwinConfig,
    /// Base and displaced vertices.
    vertices: VertexBuffer,
    /// Extents of the base mesh, measured once.
    bounds: AxisBounds,
    /// Colour per vertex.
    colors: Vec<Color>,
    /// Stations regenerated on every recompute.
    stations: StationTable,
    /// Decides whether a tick recomputes.
    gate: StaleStateGate<TwinInputs>,
    /// Produces displacement and shades.
    source: S,
    /// Text for a status display.
    status: String,
    /// Damage readout from the source.
    readout: Option<DamageReadout>,
    /// Load ratio of the last recompute.
    load_ratio: f64,
}

impl<S: ResponseSource> BeamTwin<S> {
    /// Measure the mesh, allocate the buffers and validate the configuration.
    ///
    /// Colours start at the no-load colour and the station table at zero load.
    ///
    /// # Errors
    ///
    /// Returns [`TwinError::EmptyGeometry`] for an empty vertex buffer and
    /// [`TwinError::Config`] for an invalid configuration. No twin exists afterwards.
    pub fn initialize(
        vertices: Vec<Point>,
        config: TwinConfig,
        source: S,
    ) -> Result<Self, TwinError> {
        config.validate()?;
        let vertices = VertexBuffer::new(vertices)?;
        let bounds = AxisBounds::from_vertices(vertices.base(), config.axis)?;
        if bounds.is_degenerate() {
            warn!(?bounds, "mesh bounds are degenerate; responses will be flat");
        }
        let stations = StationTable::sample(config.segments, &config.section, 0.0, 0.0)?;
        let colors = vec![config.gradient.no_load; vertices.len()];
        let inputs = config.inputs.sanitized();
        let status = render_status(&StatusSummary {
            source: source.name(),
            load: inputs.load_value,
            load_ratio: 0.0,
            midspan_deflection_mm: 0.0,
            crack: None,
            readout: None,
        });
        info!(
            vertices = vertices.len(),
            source = source.name(),
            "beam twin initialized"
        );
        Ok(Self {
            config,
            vertices,
            bounds,
            colors,
            stations,
            gate: StaleStateGate::new(),
            source,
            status,
            readout: None,
            load_ratio: 0.0,
        })
    }

    /// Recompute if `inputs` changed observably or the source has fresh data.
    ///
    /// Never fails: source errors are logged and the previous buffers kept.
    pub fn tick(&mut self, inputs: &TwinInputs) -> TickOutcome {
        let inputs = inputs.sanitized();
        if !self.source.has_pending() && !self.gate.needs_recompute(&inputs) {
            trace!("inputs unchanged; skipping recompute");
            return TickOutcome::Skipped;
        }
        self.recompute(&inputs);
        self.gate.commit(&inputs);
        TickOutcome::Recomputed
    }

    /// Tick and hand the buffers to `writer` when they changed.
    pub fn tick_into(&mut self, inputs: &TwinInputs, writer: &mut dyn MeshWriter) -> TickOutcome {
        let outcome = self.tick(inputs);
        if outcome == TickOutcome::Recomputed {
            writer.write(self.vertices.working(), &self.colors);
        }
        outcome
    }

    /// Regenerate the station table from the last applied inputs, independent of the
    /// tick.
    pub fn force_recompute(&mut self) -> &StationTable {
        let inputs = self
            .gate
            .applied()
            .copied()
            .unwrap_or_else(|| self.config.inputs.sanitized());
        let load_ratio = self.config.load_state(&inputs).load_ratio();
        self.refresh_stations(&inputs, load_ratio);
        &self.stations
    }

    /// Regenerate buffers, stations and status for `inputs`.
    fn recompute(&mut self, inputs: &TwinInputs) {
        let load_ratio = self.config.load_state(inputs).load_ratio();
        let frame = Frame {
            vertices: self.vertices.base(),
            bounds: &self.bounds,
            inputs,
            load_ratio,
        };
        let displacement = self.source.produce_displacement(&frame);
        let shades = self.source.produce_intensity(&frame);

        if let Some(displacement) = displacement {
            if displacement.iter().all(|dy| dy.is_finite()) {
                if let Err(err) = self.vertices.apply_vertical(&displacement) {
                    warn!(%err, "ignoring displacement field");
                }
            } else {
                warn!("ignoring displacement field with non-finite values");
            }
        }

        if let Some(shades) = shades {
            if shades.len() == self.colors.len() {
                let gradient = self.config.gradient;
                for (color, shade) in self.colors.iter_mut().zip(shades) {
                    *color = gradient.resolve(shade);
                }
            } else {
                warn!(
                    expected = self.colors.len(),
                    received = shades.len(),
                    "ignoring shade buffer of the wrong length"
                );
            }
        }

        self.load_ratio = load_ratio;
        self.readout = self.source.readout().or(self.readout);
        self.refresh_stations(inputs, load_ratio);
        self.status = render_status(&StatusSummary {
            source: self.source.name(),
            load: inputs.load_value,
            load_ratio,
            midspan_deflection_mm: load_ratio * inputs.max_deflection_mm,
            crack: inputs.crack.enabled.then_some(inputs.crack),
            readout: self.readout,
        });
        debug!(load_ratio, "beam twin recomputed");
    }

    /// Resample the station table for the given load ratio.
    fn refresh_stations(&mut self, inputs: &TwinInputs, load_ratio: f64) {
        let deflection = inputs.deflection_model().deflection_meters(load_ratio);
        let load = load_ratio * self.config.max_load;
        match StationTable::sample(self.config.segments, &self.config.section, load, deflection) {
            Ok(stations) => self.stations = stations,
            Err(err) => warn!(%err, "keeping previous station table"),
        }
    }
}

impl<S> BeamTwin<S> {
    /// Displaced vertex positions.
    #[must_use]
    pub fn positions(&self) -> &[Point] {
        self.vertices.working()
    }

    /// Undisplaced vertex positions.
    #[must_use]
    pub fn base_positions(&self) -> &[Point] {
        self.vertices.base()
    }

    /// Vertex colours.
    #[must_use]
    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    /// Station table of the last recompute.
    #[must_use]
    pub fn stations(&self) -> &StationTable {
        &self.stations
    }

    /// Extents of the base mesh.
    #[must_use]
    pub fn bounds(&self) -> &AxisBounds {
        &self.bounds
    }

    /// Multi-line status text.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Latest damage readout, if the source provides one.
    #[must_use]
    pub fn readout(&self) -> Option<DamageReadout> {
        self.readout
    }

    /// Load ratio of the last recompute.
    #[must_use]
    pub fn load_ratio(&self) -> f64 {
        self.load_ratio
    }

    /// Static settings.
    #[must_use]
    pub fn config(&self) -> &TwinConfig {
        &self.config
    }

    /// Response source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }
}
