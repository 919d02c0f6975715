//! Error types produced while configuring or driving a beam twin.

use std::path::PathBuf;

use thiserror::Error;

/// Error returned when a twin cannot be brought up or its buffers are misused.
///
/// Initialization failures are terminal: no [`BeamTwin`](crate::BeamTwin) exists when
/// one of these is returned, so a broken instance can never run on invalid state.
#[derive(Debug, Error)]
pub enum TwinError {
    /// Returned when the supplied vertex buffer holds no vertices.
    #[error("vertex buffer is empty")]
    EmptyGeometry,
    /// Returned when a per-vertex array does not match the mesh vertex count.
    #[error("per-vertex buffer has {received} entries but the mesh has {expected} vertices")]
    BufferLength {
        /// Vertex count of the mesh.
        expected: usize,
        /// Length of the rejected buffer.
        received: usize,
    },
    /// Returned when the configuration fails validation.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// Returned when a required inference resource cannot be loaded.
    #[error("inference resource unavailable: {0}")]
    Inference(#[from] InferenceError),
    /// Returned when the station table cannot be sampled.
    #[error("station table unavailable: {0}")]
    Stations(#[from] StationError),
    /// Returned when the telemetry transport cannot be opened.
    #[error("telemetry transport unavailable: {0}")]
    Transport(#[from] std::io::Error),
}

/// Error returned while loading or validating a [`TwinConfig`](crate::TwinConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Returned when the configuration file cannot be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File that failed to open.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Returned when the configuration is not valid JSON for the expected schema.
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
    /// Returned when the rated load is zero, negative or not finite.
    #[error("max load must be positive (received {0})")]
    NonPositiveMaxLoad(f64),
    /// Returned when fewer than two stations are requested.
    #[error("station table needs at least two segments (received {0})")]
    TooFewSegments(usize),
    /// Returned when a section dimension or modulus is not strictly positive.
    #[error("section {field} must be positive and finite (received {value})")]
    InvalidSection {
        /// Name of the offending section property.
        field: &'static str,
        /// Rejected value.
        value: f64,
    },
    /// Returned when a data source needs a resource path the configuration omits.
    #[error("no {0} configured")]
    MissingResource(&'static str),
}

/// Error returned by the station sampler.
#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum StationError {
    /// Returned when fewer than two segments are requested.
    #[error("station table needs at least two segments (received {0})")]
    TooFewSegments(usize),
}

/// Error returned by the inference boundary.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Returned when a scaler or model resource cannot be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File that failed to open.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Returned when a scaler or model resource is not valid JSON.
    #[error("malformed resource: {0}")]
    Parse(#[from] serde_json::Error),
    /// Returned when the scaler table lacks one of the six input features.
    #[error("scaler statistics are missing feature `{0}`")]
    MissingFeature(&'static str),
    /// Returned when a feature's scale would divide by zero.
    #[error("scaler statistics for `{feature}` have unusable scale {scale}")]
    DegenerateScale {
        /// Feature key.
        feature: &'static str,
        /// Rejected scale.
        scale: f64,
    },
    /// Returned when a batch does not have the width a model expects.
    #[error("input batch has {received} columns, expected {expected}")]
    InputShape {
        /// Expected column count.
        expected: usize,
        /// Supplied column count.
        received: usize,
    },
    /// Returned when a backend answers with an unexpected tensor layout.
    #[error("output tensor is {rows}x{cols}; need {expected_rows} rows and channel {channel}")]
    OutputShape {
        /// Rows returned.
        rows: usize,
        /// Columns returned.
        cols: usize,
        /// Rows expected (one per input row).
        expected_rows: usize,
        /// Output channel that must exist.
        channel: usize,
    },
    /// Returned when consecutive dense layers do not chain.
    #[error("layer {layer} expects {expected} inputs but receives {received}")]
    LayerShape {
        /// Zero-based layer index.
        layer: usize,
        /// Inputs the layer weights accept.
        expected: usize,
        /// Width produced by the previous layer.
        received: usize,
    },
    /// Returned when a backend fails for its own reasons.
    #[error("inference backend failed: {0}")]
    Backend(String),
}

/// Error returned when a telemetry snapshot cannot be applied.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Returned when a message is not a valid snapshot.
    #[error("malformed telemetry message: {0}")]
    Parse(#[from] serde_json::Error),
    /// Returned when a snapshot carries NaN or infinite values.
    #[error("telemetry field `{0}` contains a non-finite value")]
    NonFinite(&'static str),
    /// Returned when the stress field does not cover the mesh exactly.
    #[error("stress field has {received} values but the mesh has {expected} vertices")]
    LengthMismatch {
        /// Vertex count of the mesh.
        expected: usize,
        /// Stress values received.
        received: usize,
    },
}
