//! Static twin configuration and the per-frame inputs a host pushes every tick.

use std::path::{Path, PathBuf};

use approx::{AbsDiffEq, RelativeEq};
use serde::{Deserialize, Serialize};

use crate::color::Gradient;
use crate::deflection::{DeflectionModel, LoadState};
use crate::errors::{ConfigError, TwinError};
use crate::geometry::{BeamPose, LengthAxis};
use crate::inference::{
    CoordinateMapping, DenseNetwork, InferenceAdapter, MaterialConstants, ScalerStats,
    STRESS_CHANNEL,
};
use crate::intensity::{CrackSpec, IntensityParams, PointLoadSpec};
use crate::math::{clamp01, RADIUS_FLOOR};
use crate::simulator::SimulatorSettings;
use crate::stations::SectionProperties;

/// Rated load of the reference beam in newtons.
pub const DEFAULT_MAX_LOAD: f64 = 185_490.0;

/// Midspan deflection of the reference beam at its rated load, in millimetres.
pub const DEFAULT_MAX_DEFLECTION_MM: f64 = 6.7;

/// Default number of stations.
pub const DEFAULT_SEGMENTS: usize = 10;

/// Smallest sensitivity a colour mapping divides by.
pub const SENSITIVITY_FLOOR: f64 = 1.0e-6;

/// Settings read once when a twin is created.
///
/// Every field has a default, so a partial JSON file only overrides what it names.
///
/// # Examples
/// ```
/// use beamtwin::TwinConfig;
///
/// let config = TwinConfig::from_json_str(r#"{"max_load": 1000.0, "segments": 4}"#).unwrap();
/// assert_eq!(config.segments, 4);
/// assert_eq!(config.inference.output_channel, 1);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwinConfig {
    /// Horizontal axis the beam's length runs along.
    pub axis: LengthAxis,
    /// Rated load in newtons.
    pub max_load: f64,
    /// Colours of the intensity ramp.
    pub gradient: Gradient,
    /// Physical section used by the station table.
    pub section: SectionProperties,
    /// Number of stations.
    pub segments: usize,
    /// Neural-network source settings.
    pub inference: InferenceSettings,
    /// Telemetry source settings.
    pub telemetry: TelemetrySettings,
    /// Settings of the stress-field simulator that feeds telemetry.
    pub simulator: SimulatorSettings,
    /// Fallback inputs for `force_recompute` before any tick has applied inputs, and
    /// the starting inputs of the command line.
    pub inputs: TwinInputs,
}

impl Default for TwinConfig {
    fn default() -> Self {
        Self {
            axis: LengthAxis::default(),
            max_load: DEFAULT_MAX_LOAD,
            gradient: Gradient::default(),
            section: SectionProperties::default(),
            segments: DEFAULT_SEGMENTS,
            inference: InferenceSettings::default(),
            telemetry: TelemetrySettings::default(),
            simulator: SimulatorSettings::default(),
            inputs: TwinInputs::default(),
        }
    }
}

impl TwinConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON, otherwise as
    /// [`TwinConfig::validate`].
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// [`TwinConfig::from_json_str`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Check the settings a twin cannot run without.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NonPositiveMaxLoad`], [`ConfigError::TooFewSegments`] or
    /// [`ConfigError::InvalidSection`] naming the first offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_load.is_finite() && self.max_load > 0.0) {
            return Err(ConfigError::NonPositiveMaxLoad(self.max_load));
        }
        if self.segments < 2 {
            return Err(ConfigError::TooFewSegments(self.segments));
        }
        let section = [
            ("length", self.section.length),
            ("width", self.section.width),
            ("depth", self.section.depth),
            ("elastic_modulus", self.section.elastic_modulus),
        ];
        for (field, value) in section {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidSection { field, value });
            }
        }
        Ok(())
    }

    /// Load state for the given per-frame inputs.
    #[must_use]
    pub fn load_state(&self, inputs: &TwinInputs) -> LoadState {
        LoadState {
            load_value: inputs.load_value,
            max_load: self.max_load,
            max_deflection_mm: inputs.max_deflection_mm,
            exaggeration: inputs.exaggeration,
        }
    }
}

/// Resources and batching of the neural-network source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    /// Scaler statistics file.
    pub scaler_path: Option<PathBuf>,
    /// Dense network file.
    pub model_path: Option<PathBuf>,
    /// Output column holding stress.
    pub output_channel: usize,
    /// Rows per backend call; zero sends the whole mesh at once.
    pub batch_size: usize,
    /// Material constants fed to the network.
    pub material: MaterialConstants,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            scaler_path: None,
            model_path: None,
            output_channel: STRESS_CHANNEL,
            batch_size: 0,
            material: MaterialConstants::default(),
        }
    }
}

impl InferenceSettings {
    /// Load the scaler and network and assemble an adapter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingResource`] when a path is not configured and the
    /// inference error when a resource cannot be loaded.
    pub fn load_adapter(&self) -> Result<InferenceAdapter, TwinError> {
        let scaler_path = self
            .scaler_path
            .as_ref()
            .ok_or(ConfigError::MissingResource("scaler_path"))?;
        let model_path = self
            .model_path
            .as_ref()
            .ok_or(ConfigError::MissingResource("model_path"))?;
        let scaler = ScalerStats::from_path(scaler_path)?;
        let network = DenseNetwork::from_path(model_path)?;
        Ok(InferenceAdapter::new(scaler, Box::new(network), self.material)
            .with_output_channel(self.output_channel)
            .with_batch_size(self.batch_size))
    }
}

/// Where the telemetry stream is served and read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// `host:port` of the stream.
    pub address: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8765".to_owned(),
        }
    }
}

/// Everything a host may change between frames.
///
/// The staleness gate compares successive values of this struct field by field.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwinInputs {
    /// Applied load in newtons.
    pub load_value: f64,
    /// Midspan deflection at the rated load, in millimetres.
    pub max_deflection_mm: f64,
    /// Visual deflection multiplier.
    pub exaggeration: f64,
    /// Tuning of the analytic heuristic.
    pub intensity: IntensityParams,
    /// Manual crack overlay.
    pub crack: CrackSpec,
    /// Optional localized load.
    pub point_load: PointLoadSpec,
    /// World placement of the beam.
    pub pose: BeamPose,
    /// Stress that maps to full intensity for the neural-network source.
    pub sensitivity: f64,
    /// Normalized stress at which the neural-network source paints a hard crack.
    pub crack_threshold: f64,
    /// How mesh coordinates become network features.
    pub mapping: CoordinateMapping,
    /// Stress that maps to full intensity for the telemetry source.
    pub telemetry_sensitivity: f64,
}

impl Default for TwinInputs {
    fn default() -> Self {
        Self {
            load_value: 0.0,
            max_deflection_mm: DEFAULT_MAX_DEFLECTION_MM,
            exaggeration: 1.0,
            intensity: IntensityParams::default(),
            crack: CrackSpec::default(),
            point_load: PointLoadSpec::default(),
            pose: BeamPose::default(),
            sensitivity: 1.0,
            crack_threshold: 0.9,
            mapping: CoordinateMapping::default(),
            telemetry_sensitivity: 1.0,
        }
    }
}

/// `value` unless it is NaN or infinite.
fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

impl TwinInputs {
    /// Copy with every tunable pulled back into its valid range.
    ///
    /// Non-finite numbers fall back to their defaults.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let mut inputs = *self;
        inputs.load_value = finite_or(inputs.load_value, defaults.load_value);
        inputs.max_deflection_mm =
            finite_or(inputs.max_deflection_mm, defaults.max_deflection_mm).max(0.0);
        inputs.exaggeration = finite_or(inputs.exaggeration, defaults.exaggeration).max(0.0);

        inputs.intensity.bottom_bias =
            finite_or(inputs.intensity.bottom_bias, defaults.intensity.bottom_bias).max(0.5);
        inputs.intensity.upward_growth =
            finite_or(inputs.intensity.upward_growth, defaults.intensity.upward_growth).max(0.0);

        inputs.crack.center_u = clamp01(inputs.crack.center_u);
        inputs.crack.center_v = clamp01(inputs.crack.center_v);
        inputs.crack.radius =
            finite_or(inputs.crack.radius, defaults.crack.radius).max(RADIUS_FLOOR);
        inputs.crack.severity = clamp01(inputs.crack.severity);
        inputs.crack.sharpness =
            finite_or(inputs.crack.sharpness, defaults.crack.sharpness).max(0.1);

        inputs.point_load.radius =
            finite_or(inputs.point_load.radius, defaults.point_load.radius).max(RADIUS_FLOOR);

        inputs.sensitivity =
            finite_or(inputs.sensitivity, defaults.sensitivity).max(SENSITIVITY_FLOOR);
        inputs.crack_threshold = finite_or(inputs.crack_threshold, defaults.crack_threshold);
        inputs.telemetry_sensitivity =
            finite_or(inputs.telemetry_sensitivity, defaults.telemetry_sensitivity)
                .max(SENSITIVITY_FLOOR);
        inputs
    }

    /// Deflection model for these inputs.
    #[must_use]
    pub fn deflection_model(&self) -> DeflectionModel {
        DeflectionModel {
            max_deflection_mm: self.max_deflection_mm,
            exaggeration: self.exaggeration,
            vertical_scale: self.pose.vertical_scale(),
        }
    }
}

impl AbsDiffEq for TwinInputs {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.load_value.abs_diff_eq(&other.load_value, epsilon)
            && self
                .max_deflection_mm
                .abs_diff_eq(&other.max_deflection_mm, epsilon)
            && self.exaggeration.abs_diff_eq(&other.exaggeration, epsilon)
            && self.intensity.abs_diff_eq(&other.intensity, epsilon)
            && self.crack.abs_diff_eq(&other.crack, epsilon)
            && self.point_load.abs_diff_eq(&other.point_load, epsilon)
            && self.pose.abs_diff_eq(&other.pose, epsilon)
            && self.sensitivity.abs_diff_eq(&other.sensitivity, epsilon)
            && self
                .crack_threshold
                .abs_diff_eq(&other.crack_threshold, epsilon)
            && self.mapping.abs_diff_eq(&other.mapping, epsilon)
            && self
                .telemetry_sensitivity
                .abs_diff_eq(&other.telemetry_sensitivity, epsilon)
    }
}

impl RelativeEq for TwinInputs {
    fn default_max_relative() -> f64 {
        f64::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f64, max_relative: f64) -> bool {
        self.load_value
            .relative_eq(&other.load_value, epsilon, max_relative)
            && self
                .max_deflection_mm
                .relative_eq(&other.max_deflection_mm, epsilon, max_relative)
            && self
                .exaggeration
                .relative_eq(&other.exaggeration, epsilon, max_relative)
            && self
                .intensity
                .relative_eq(&other.intensity, epsilon, max_relative)
            && self.crack.relative_eq(&other.crack, epsilon, max_relative)
            && self
                .point_load
                .relative_eq(&other.point_load, epsilon, max_relative)
            && self.pose.relative_eq(&other.pose, epsilon, max_relative)
            && self
                .sensitivity
                .relative_eq(&other.sensitivity, epsilon, max_relative)
            && self
                .crack_threshold
                .relative_eq(&other.crack_threshold, epsilon, max_relative)
            && self.mapping.relative_eq(&other.mapping, epsilon, max_relative)
            && self
                .telemetry_sensitivity
                .relative_eq(&other.telemetry_sensitivity, epsilon, max_relative)
    }
}
