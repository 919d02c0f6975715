#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]
#![doc = include_str!("../README.md")]

pub mod color;
pub mod config;
pub mod deflection;
pub mod errors;
pub mod gate;
pub mod geometry;
pub mod inference;
pub mod intensity;
pub mod math;
pub mod prognosis;
/// Human-readable status and station tables.
pub mod report;
pub mod simulator;
pub mod stations;
pub mod telemetry;
pub mod twin;

pub use color::{Color, Gradient};
pub use config::{InferenceSettings, TelemetrySettings, TwinConfig, TwinInputs};
pub use deflection::{DeflectionModel, LoadState};
pub use errors::{ConfigError, InferenceError, SnapshotError, StationError, TwinError};
pub use gate::StaleStateGate;
pub use geometry::{point, AxisBounds, BeamPose, LengthAxis, Point, VertexBuffer};
pub use inference::{
    CoordinateMapping, DenseNetwork, Feature, FnBackend, InferenceAdapter, InferenceBackend,
    MaterialConstants, ScalerStats,
};
pub use intensity::{CrackSpec, IntensityModel, IntensityParams, PointLoadSpec, Shade};
pub use prognosis::{DamageEvolution, Prognostics, StressHistory, StressSample};
pub use report::{render_station_table, render_status, StatusSummary};
pub use simulator::{SimulatorSettings, StressFieldSimulator};
pub use stations::{SectionProperties, Station, StationTable};
pub use telemetry::{
    DamageReadout, SnapshotSlot, TelemetryAdapter, TelemetryReceiver, TelemetrySnapshot,
};
pub use twin::{
    AnalyticSource, BeamTwin, Frame, InferenceSource, MeshBuffers, MeshWriter, ResponseSource,
    TelemetrySource, TickOutcome,
};
