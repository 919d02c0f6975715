//! Neural-network data source: feature normalization, the opaque inference boundary
//! and conversion of predicted stress into shades.
//!
//! The network is trained on six physical features per point (`x`, `y`, `load_mag`,
//! `global_deflection`, `fc`, `fy`) standardized with stored scaler statistics, and
//! predicts three channels (`strain`, `stress`, `damage`). Only the stress channel is
//! used for colouring.

use std::collections::HashMap;
use std::path::Path;

use approx::{AbsDiffEq, RelativeEq};
use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::errors::InferenceError;
use crate::geometry::{AxisBounds, Point};
use crate::intensity::Shade;
use crate::math::{clamp01, DEGENERATE_EPSILON};

/// Number of input features per point.
pub const FEATURE_COUNT: usize = 6;

/// Output channel carrying the stress prediction.
pub const STRESS_CHANNEL: usize = 1;

/// Input features in the order the network expects them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Position along the beam.
    X,
    /// Position through the depth.
    Y,
    /// Applied load magnitude.
    LoadMag,
    /// Global midspan deflection.
    GlobalDeflection,
    /// Concrete compressive strength.
    Fc,
    /// Reinforcement yield strength.
    Fy,
}

impl Feature {
    /// All features in column order.
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::X,
        Feature::Y,
        Feature::LoadMag,
        Feature::GlobalDeflection,
        Feature::Fc,
        Feature::Fy,
    ];

    /// Key used in the scaler statistics file.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Feature::X => "x",
            Feature::Y => "y",
            Feature::LoadMag => "load_mag",
            Feature::GlobalDeflection => "global_deflection",
            Feature::Fc => "fc",
            Feature::Fy => "fy",
        }
    }

    /// Column of this feature in a batch.
    #[must_use]
    pub const fn column(self) -> usize {
        self as usize
    }
}

/// Standardization statistics of one feature.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureScale {
    /// Mean subtracted from the raw value.
    pub mean: f64,
    /// Scale the centred value is divided by.
    pub scale: f64,
}

/// Scaler statistics for the six input features. Immutable once loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalerStats {
    /// Statistics indexed by [`Feature::column`].
    scales: [FeatureScale; FEATURE_COUNT],
}

impl ScalerStats {
    /// Build from a key to statistics table; extra keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::MissingFeature`] when a feature is absent and
    /// [`InferenceError::DegenerateScale`] when a scale would divide by zero.
    pub fn from_map(table: &HashMap<String, FeatureScale>) -> Result<Self, InferenceError> {
        let mut scales = [FeatureScale {
            mean: 0.0,
            scale: 1.0,
        }; FEATURE_COUNT];
        for feature in Feature::ALL {
            let stats = table
                .get(feature.key())
                .ok_or(InferenceError::MissingFeature(feature.key()))?;
            if !stats.mean.is_finite()
                || !stats.scale.is_finite()
                || stats.scale.abs() <= DEGENERATE_EPSILON
            {
                return Err(InferenceError::DegenerateScale {
                    feature: feature.key(),
                    scale: stats.scale,
                });
            }
            scales[feature.column()] = *stats;
        }
        Ok(Self { scales })
    }

    /// Parse a JSON object of the form `{"x": {"mean": .., "scale": ..}, ..}`.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::Parse`] for malformed JSON and the errors of
    /// [`ScalerStats::from_map`].
    ///
    /// # Examples
    /// ```
    /// use beamtwin::{Feature, ScalerStats};
    ///
    /// let json = r#"{
    ///     "x": {"mean": 0.0, "scale": 100.0},
    ///     "y": {"mean": 0.0, "scale": 50.0},
    ///     "load_mag": {"mean": 50000.0, "scale": 10000.0},
    ///     "global_deflection": {"mean": 5.0, "scale": 1.0},
    ///     "fc": {"mean": 25.0, "scale": 5.0},
    ///     "fy": {"mean": 314.0, "scale": 20.0}
    /// }"#;
    /// let scaler = ScalerStats::from_json_str(json).unwrap();
    /// assert_eq!(scaler.normalize(Feature::LoadMag, 60000.0), 1.0);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, InferenceError> {
        let table: HashMap<String, FeatureScale> = serde_json::from_str(json)?;
        Self::from_map(&table)
    }

    /// Read and parse a scaler statistics file.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::Io`] when the file cannot be read, otherwise as
    /// [`ScalerStats::from_json_str`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, InferenceError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| InferenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Statistics of one feature.
    #[must_use]
    pub fn get(&self, feature: Feature) -> FeatureScale {
        self.scales[feature.column()]
    }

    /// `(value - mean) / scale` for one feature.
    #[must_use]
    pub fn normalize(&self, feature: Feature, value: f64) -> f64 {
        let stats = self.get(feature);
        (value - stats.mean) / stats.scale
    }

    /// Normalize a full raw feature row.
    #[must_use]
    pub fn normalize_row(&self, raw: [f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut row = raw;
        for feature in Feature::ALL {
            row[feature.column()] = self.normalize(feature, raw[feature.column()]);
        }
        row
    }
}

/// How mesh coordinates become the network's `x` and `y` features.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CoordinateMapping {
    /// Raw local coordinates along the beam and vertically.
    Local,
    /// Normalized mesh position stretched over a physical beam centred on the origin.
    Physical {
        /// Physical span in the units the network was trained on.
        length: f64,
        /// Physical depth in the same units.
        height: f64,
    },
}

impl Default for CoordinateMapping {
    fn default() -> Self {
        Self::Physical {
            length: 1050.0,
            height: 300.0,
        }
    }
}

impl CoordinateMapping {
    /// Physical `(x, y)` features of a base vertex.
    #[must_use]
    pub fn map(&self, vertex: Point, bounds: &AxisBounds) -> (f64, f64) {
        match *self {
            Self::Local => (bounds.axis.along(vertex), vertex.y),
            Self::Physical { length, height } => (
                (bounds.length_fraction(vertex) - 0.5) * length,
                (bounds.height_fraction(vertex) - 0.5) * height,
            ),
        }
    }
}

impl AbsDiffEq for CoordinateMapping {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        match (self, other) {
            (Self::Local, Self::Local) => true,
            (
                Self::Physical { length, height },
                Self::Physical {
                    length: other_length,
                    height: other_height,
                },
            ) => {
                length.abs_diff_eq(other_length, epsilon)
                    && height.abs_diff_eq(other_height, epsilon)
            }
            _ => false,
        }
    }
}

impl RelativeEq for CoordinateMapping {
    fn default_max_relative() -> f64 {
        f64::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f64, max_relative: f64) -> bool {
        match (self, other) {
            (Self::Local, Self::Local) => true,
            (
                Self::Physical { length, height },
                Self::Physical {
                    length: other_length,
                    height: other_height,
                },
            ) => {
                length.relative_eq(other_length, epsilon, max_relative)
                    && height.relative_eq(other_height, epsilon, max_relative)
            }
            _ => false,
        }
    }
}

/// Material constants fed to the network for every point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialConstants {
    /// Concrete compressive strength in megapascals.
    pub fc: f64,
    /// Reinforcement yield strength in megapascals.
    pub fy: f64,
}

impl Default for MaterialConstants {
    fn default() -> Self {
        Self {
            fc: 25.0,
            fy: 314.0,
        }
    }
}

/// Opaque forward pass from normalized features to output channels.
///
/// Implementations receive a batch of shape `(rows, 6)` and must return one output
/// row per input row.
pub trait InferenceBackend {
    /// Run the forward pass on a batch.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError`] when the backend cannot produce a prediction.
    fn predict(&self, batch: ArrayView2<'_, f64>) -> Result<Array2<f64>, InferenceError>;
}

/// Backend built from a plain row function, evaluated row by row.
pub struct FnBackend<F> {
    /// Maps one normalized feature row to its output channels.
    function: F,
}

impl<F> FnBackend<F>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    /// Wrap a row function.
    pub fn new(function: F) -> Self {
        Self { function }
    }
}

impl<F> InferenceBackend for FnBackend<F>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    fn predict(&self, batch: ArrayView2<'_, f64>) -> Result<Array2<f64>, InferenceError> {
        let mut rows = Vec::with_capacity(batch.nrows());
        let mut width = None;
        for row in batch.rows() {
            let output = (self.function)(&row.to_vec());
            match width {
                None => width = Some(output.len()),
                Some(expected) if expected != output.len() => {
                    return Err(InferenceError::Backend(format!(
                        "row function returned {} channels after returning {expected}",
                        output.len()
                    )));
                }
                Some(_) => {}
            }
            rows.extend(output);
        }
        let width = width.unwrap_or(0);
        Array2::from_shape_vec((batch.nrows(), width), rows)
            .map_err(|err| InferenceError::Backend(err.to_string()))
    }
}

/// Activation applied after a dense layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Hyperbolic tangent.
    Tanh,
    /// Identity.
    Linear,
}

/// Serialized form of one dense layer; `weights` is `inputs x outputs`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DenseLayerSpec {
    /// Kernel rows, one per input.
    pub weights: Vec<Vec<f64>>,
    /// Bias, one per output.
    pub bias: Vec<f64>,
    /// Activation after the affine map.
    pub activation: Activation,
}

/// Dense layer ready for evaluation.
#[derive(Clone, Debug)]
struct DenseLayer {
    /// Kernel of shape `inputs x outputs`.
    weights: Array2<f64>,
    /// Bias of length `outputs`.
    bias: Array1<f64>,
    /// Activation after the affine map.
    activation: Activation,
}

/// Fully connected feed-forward network (the 6-64-128-128-64-3 tanh stack the stress
/// model uses), evaluated with `ndarray`.
#[derive(Clone, Debug)]
pub struct DenseNetwork {
    /// Layers in evaluation order.
    layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    /// Assemble a network from layer specifications.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::LayerShape`] when kernels are ragged or consecutive
    /// layers do not chain, and [`InferenceError::Backend`] for an empty network.
    pub fn new(specs: Vec<DenseLayerSpec>) -> Result<Self, InferenceError> {
        if specs.is_empty() {
            return Err(InferenceError::Backend("network has no layers".to_owned()));
        }
        let mut layers = Vec::with_capacity(specs.len());
        let mut width = None;
        for (index, spec) in specs.into_iter().enumerate() {
            let inputs = spec.weights.len();
            let outputs = spec.bias.len();
            if let Some(previous) = width {
                if previous != inputs {
                    return Err(InferenceError::LayerShape {
                        layer: index,
                        expected: inputs,
                        received: previous,
                    });
                }
            }
            if let Some(row) = spec.weights.iter().find(|row| row.len() != outputs) {
                return Err(InferenceError::LayerShape {
                    layer: index,
                    expected: outputs,
                    received: row.len(),
                });
            }
            let flat: Vec<f64> = spec.weights.into_iter().flatten().collect();
            let weights = Array2::from_shape_vec((inputs, outputs), flat)
                .map_err(|err| InferenceError::Backend(err.to_string()))?;
            layers.push(DenseLayer {
                weights,
                bias: Array1::from(spec.bias),
                activation: spec.activation,
            });
            width = Some(outputs);
        }
        Ok(Self { layers })
    }

    /// Parse a JSON array of layer specifications.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::Parse`] for malformed JSON, otherwise as
    /// [`DenseNetwork::new`].
    pub fn from_json_str(json: &str) -> Result<Self, InferenceError> {
        let specs: Vec<DenseLayerSpec> = serde_json::from_str(json)?;
        Self::new(specs)
    }

    /// Read and parse a network file.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::Io`] when the file cannot be read, otherwise as
    /// [`DenseNetwork::from_json_str`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, InferenceError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| InferenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Width of the first layer.
    #[must_use]
    pub fn input_width(&self) -> usize {
        self.layers.first().map_or(0, |layer| layer.weights.nrows())
    }
}

impl InferenceBackend for DenseNetwork {
    fn predict(&self, batch: ArrayView2<'_, f64>) -> Result<Array2<f64>, InferenceError> {
        if batch.ncols() != self.input_width() {
            return Err(InferenceError::InputShape {
                expected: self.input_width(),
                received: batch.ncols(),
            });
        }
        let mut activations = batch.to_owned();
        for layer in &self.layers {
            let mut next = activations.dot(&layer.weights) + &layer.bias;
            if layer.activation == Activation::Tanh {
                next.mapv_inplace(f64::tanh);
            }
            activations = next;
        }
        Ok(activations)
    }
}

/// Normalizes vertices, runs the backend and reads the stress channel back.
pub struct InferenceAdapter {
    /// Feature statistics.
    scaler: ScalerStats,
    /// Forward pass.
    backend: Box<dyn InferenceBackend>,
    /// Output column holding stress.
    output_channel: usize,
    /// Rows per backend call; zero sends the whole mesh at once.
    batch_size: usize,
    /// Material constants appended to every row.
    material: MaterialConstants,
}

impl InferenceAdapter {
    /// Adapter reading [`STRESS_CHANNEL`] in a single batch.
    #[must_use]
    pub fn new(
        scaler: ScalerStats,
        backend: Box<dyn InferenceBackend>,
        material: MaterialConstants,
    ) -> Self {
        Self {
            scaler,
            backend,
            output_channel: STRESS_CHANNEL,
            batch_size: 0,
            material,
        }
    }

    /// Read a different output channel.
    #[must_use]
    pub fn with_output_channel(mut self, channel: usize) -> Self {
        self.output_channel = channel;
        self
    }

    /// Split backend calls into batches of at most `batch_size` rows.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Scaler statistics in use.
    #[must_use]
    pub fn scaler(&self) -> &ScalerStats {
        &self.scaler
    }

    /// Normalized feature matrix of shape `(vertices, 6)`.
    #[must_use]
    pub fn feature_batch(
        &self,
        vertices: &[Point],
        bounds: &AxisBounds,
        mapping: &CoordinateMapping,
        load_mag: f64,
        global_deflection: f64,
    ) -> Array2<f64> {
        let mut batch = Array2::zeros((vertices.len(), FEATURE_COUNT));
        for (mut row, vertex) in batch.rows_mut().into_iter().zip(vertices) {
            let (x, y) = mapping.map(*vertex, bounds);
            let normalized = self.scaler.normalize_row([
                x,
                y,
                load_mag,
                global_deflection,
                self.material.fc,
                self.material.fy,
            ]);
            for (slot, value) in row.iter_mut().zip(normalized) {
                *slot = value;
            }
        }
        batch
    }

    /// Stress prediction for every row of `features`.
    ///
    /// The result does not depend on the batch size.
    ///
    /// # Errors
    ///
    /// Returns the backend's error, or [`InferenceError::OutputShape`] when the output
    /// has the wrong number of rows or lacks the stress channel.
    pub fn predict_stress(&self, features: ArrayView2<'_, f64>) -> Result<Vec<f64>, InferenceError> {
        let rows = features.nrows();
        let chunk = if self.batch_size == 0 {
            rows.max(1)
        } else {
            self.batch_size
        };
        let mut stress = Vec::with_capacity(rows);
        for batch in features.axis_chunks_iter(Axis(0), chunk) {
            let output = self.backend.predict(batch)?;
            if output.nrows() != batch.nrows() || output.ncols() <= self.output_channel {
                return Err(InferenceError::OutputShape {
                    rows: output.nrows(),
                    cols: output.ncols(),
                    expected_rows: batch.nrows(),
                    channel: self.output_channel,
                });
            }
            stress.extend(output.slice(s![.., self.output_channel]).iter().copied());
        }
        Ok(stress)
    }

    /// Convert predictions into shades.
    ///
    /// `|stress| / sensitivity` at or above `crack_threshold` is a hard
    /// [`Shade::Crack`]; below it the value is blended. Non-finite predictions fall back
    /// to zero intensity.
    #[must_use]
    pub fn shade(stress: &[f64], sensitivity: f64, crack_threshold: f64) -> Vec<Shade> {
        let sensitivity = sensitivity.max(DEGENERATE_EPSILON);
        stress
            .iter()
            .map(|value| {
                let t = value.abs() / sensitivity;
                if !t.is_finite() {
                    Shade::Blend(0.0)
                } else if t >= crack_threshold {
                    Shade::Crack
                } else {
                    Shade::Blend(clamp01(t))
                }
            })
            .collect()
    }
}

impl std::fmt::Debug for InferenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceAdapter")
            .field("scaler", &self.scaler)
            .field("output_channel", &self.output_channel)
            .field("batch_size", &self.batch_size)
            .field("material", &self.material)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::geometry::{point, LengthAxis};

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

    fn bounds() -> AxisBounds {
        AxisBounds::from_vertices(&[point(-1.0, 0.0, 0.0), point(1.0, 0.5, 0.0)], LengthAxis::X)
            .expect("bounds")
    }

    #[test]
    fn missing_feature_is_reported() {
        let mut table: HashMap<String, FeatureScale> = HashMap::new();
        table.insert(
            "x".to_owned(),
            FeatureScale {
                mean: 0.0,
                scale: 1.0,
            },
        );
        let error = ScalerStats::from_map(&table).expect_err("incomplete table");
        assert!(matches!(error, InferenceError::MissingFeature("y")));
    }

    #[test]
    fn zero_scale_is_rejected() {
        let json = r#"{
            "x": {"mean": 0.0, "scale": 1.0},
            "y": {"mean": 0.0, "scale": 1.0},
            "load_mag": {"mean": 0.0, "scale": 0.0},
            "global_deflection": {"mean": 0.0, "scale": 1.0},
            "fc": {"mean": 0.0, "scale": 1.0},
            "fy": {"mean": 0.0, "scale": 1.0},
            "stress": {"mean": 3.0, "scale": 2.0}
        }"#;
        let error = ScalerStats::from_json_str(json).expect_err("zero scale");
        assert!(matches!(
            error,
            InferenceError::DegenerateScale {
                feature: "load_mag",
                ..
            }
        ));
    }

    #[test]
    fn physical_mapping_centres_the_beam() {
        let mapping = CoordinateMapping::default();
        let (x, y) = mapping.map(point(1.0, 0.0, 0.0), &bounds());
        assert_relative_eq!(x, 525.0);
        assert_relative_eq!(y, -150.0);
        let (x, y) = CoordinateMapping::Local.map(point(0.25, 0.3, 9.0), &bounds());
        assert_eq!((x, y), (0.25, 0.3));
    }

    #[test]
    fn features_are_normalized_in_column_order() {
        let adapter = InferenceAdapter::new(
            unit_scaler(),
            Box::new(FnBackend::new(|row: &[f64]| row.to_vec())),
            MaterialConstants::default(),
        );
        let batch = adapter.feature_batch(
            &[point(0.0, 0.25, 0.0)],
            &bounds(),
            &CoordinateMapping::Local,
            50_000.0,
            5.5,
        );
        assert_eq!(batch.shape(), &[1, FEATURE_COUNT]);
        assert_eq!(batch.row(0).to_vec(), vec![0.0, 0.25, 50_000.0, 5.5, 25.0, 314.0]);
    }

    #[test]
    fn stress_channel_is_extracted_per_row() {
        let adapter = InferenceAdapter::new(
            unit_scaler(),
            Box::new(FnBackend::new(|row: &[f64]| vec![0.0, row[0] * 2.0, -1.0])),
            MaterialConstants::default(),
        );
        let vertices = [point(-1.0, 0.0, 0.0), point(0.5, 0.0, 0.0)];
        let batch = adapter.feature_batch(&vertices, &bounds(), &CoordinateMapping::Local, 0.0, 0.0);
        let stress = adapter.predict_stress(batch.view()).expect("prediction");
        assert_eq!(stress, vec![-2.0, 1.0]);
    }

    #[test]
    fn missing_output_channel_is_an_error() {
        let adapter = InferenceAdapter::new(
            unit_scaler(),
            Box::new(FnBackend::new(|_: &[f64]| vec![0.0])),
            MaterialConstants::default(),
        );
        let batch = Array2::zeros((3, FEATURE_COUNT));
        let error = adapter.predict_stress(batch.view()).expect_err("one channel");
        assert!(matches!(error, InferenceError::OutputShape { channel: 1, .. }));
    }

    #[test]
    fn batch_size_does_not_change_predictions() {
        let network = tiny_network();
        let vertices: Vec<_> = (0..7)
            .map(|i| point(f64::from(i) / 3.0 - 1.0, f64::from(i % 3) / 4.0, 0.0))
            .collect();
        let whole = InferenceAdapter::new(
            unit_scaler(),
            Box::new(network.clone()),
            MaterialConstants::default(),
        );
        let single = InferenceAdapter::new(
            unit_scaler(),
            Box::new(network),
            MaterialConstants::default(),
        )
        .with_batch_size(1);
        let batch = whole.feature_batch(&vertices, &bounds(), &CoordinateMapping::Local, 0.3, 0.1);
        let a = whole.predict_stress(batch.view()).expect("whole batch");
        let b = single.predict_stress(batch.view()).expect("row by row");
        assert_eq!(a.len(), 7);
        for (left, right) in a.iter().zip(&b) {
            assert_relative_eq!(*left, *right, epsilon = 1.0e-12);
        }
    }

    fn tiny_network() -> DenseNetwork {
        DenseNetwork::new(vec![
            DenseLayerSpec {
                weights: vec![
                    vec![1.0, 0.0],
                    vec![0.0, 1.0],
                    vec![0.0, 0.0],
                    vec![0.0, 0.0],
                    vec![0.0, 0.0],
                    vec![0.0, 0.0],
                ],
                bias: vec![0.0, 0.5],
                activation: Activation::Tanh,
            },
            DenseLayerSpec {
                weights: vec![vec![1.0, 2.0, 0.0], vec![0.0, 1.0, 1.0]],
                bias: vec![0.0, 0.0, 0.1],
                activation: Activation::Linear,
            },
        ])
        .expect("valid network")
    }

    #[test]
    fn dense_network_matches_hand_evaluation() {
        let network = tiny_network();
        let input = Array2::from_shape_vec((1, 6), vec![0.5, -0.5, 9.0, 9.0, 9.0, 9.0])
            .expect("shape");
        let output = network.predict(input.view()).expect("forward pass");
        let h0 = 0.5_f64.tanh();
        let h1 = 0.0_f64.tanh();
        assert_relative_eq!(output[[0, 0]], h0, epsilon = 1.0e-12);
        assert_relative_eq!(output[[0, 1]], 2.0 * h0 + h1, epsilon = 1.0e-12);
        assert_relative_eq!(output[[0, 2]], h1 + 0.1, epsilon = 1.0e-12);
    }

    #[test]
    fn dense_network_rejects_wrong_width_and_broken_chains() {
        let network = tiny_network();
        let input = Array2::zeros((2, 4));
        assert!(matches!(
            network.predict(input.view()),
            Err(InferenceError::InputShape {
                expected: 6,
                received: 4
            })
        ));

        let broken = DenseNetwork::new(vec![
            DenseLayerSpec {
                weights: vec![vec![1.0, 0.0]; 6],
                bias: vec![0.0, 0.0],
                activation: Activation::Tanh,
            },
            DenseLayerSpec {
                weights: vec![vec![1.0]; 3],
                bias: vec![0.0],
                activation: Activation::Linear,
            },
        ]);
        assert!(matches!(
            broken,
            Err(InferenceError::LayerShape {
                layer: 1,
                expected: 3,
                received: 2
            })
        ));
    }

    #[test]
    fn network_loads_from_json() {
        let json = r#"[
            {"weights": [[1.0], [0.0], [0.0], [0.0], [0.0], [0.0]], "bias": [0.0], "activation": "linear"}
        ]"#;
        let network = DenseNetwork::from_json_str(json).expect("valid json");
        assert_eq!(network.input_width(), 6);
    }

    #[test]
    fn shading_applies_the_hard_crack_threshold() {
        let shades = InferenceAdapter::shade(&[0.0, -0.4, 0.89, 0.9, 5.0, f64::NAN], 1.0, 0.9);
        assert_eq!(
            shades,
            vec![
                Shade::Blend(0.0),
                Shade::Blend(0.4),
                Shade::Blend(0.89),
                Shade::Crack,
                Shade::Crack,
                Shade::Blend(0.0),
            ]
        );
    }
}
