//! Tension and crack intensity heuristic.
//!
//! The intensity concentrates on the bottom (tension) face of a bending beam, spreads
//! upward as the load grows, is weighted by the same parabola that shapes the
//! deflection, and may be localized around a point load or raised by a single manually
//! placed crack. The blend constants are visual tuning rather than mechanics.

use approx::{AbsDiffEq, RelativeEq};
use serde::{Deserialize, Serialize};

use crate::geometry::{AxisBounds, BeamPose, Point};
use crate::math::{bend_shape, clamp01, lerp, smoothstep, RADIUS_FLOOR};

/// Load ratios at or below this value render the whole beam in the no-load colour.
pub const NO_LOAD_RATIO: f64 = 1.0e-3;

/// Visual intensity of one vertex, resolved to a colour by a
/// [`Gradient`](crate::Gradient).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shade {
    /// Global unloaded state.
    NoLoad,
    /// Position on the no-load to crack gradient, in `[0, 1]`.
    Blend(f64),
    /// Hard crack override, bypassing the gradient.
    Crack,
}

/// Tuning of the bottom-tension heuristic.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntensityParams {
    /// Exponent concentrating intensity on the bottom face; at least 0.5.
    pub bottom_bias: f64,
    /// Rate at which intensity climbs the section as load grows.
    pub upward_growth: f64,
}

impl Default for IntensityParams {
    fn default() -> Self {
        Self {
            bottom_bias: 2.0,
            upward_growth: 1.5,
        }
    }
}

/// A single user-placed damage hotspot in normalized beam coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrackSpec {
    /// Whether the crack participates in the evaluation.
    pub enabled: bool,
    /// Position along the beam in `[0, 1]`.
    pub center_u: f64,
    /// Height in `[0, 1]`; 0 is the bottom face.
    pub center_v: f64,
    /// Influence radius in normalized units.
    pub radius: f64,
    /// Peak intensity at the centre.
    pub severity: f64,
    /// Falloff exponent.
    pub sharpness: f64,
}

impl Default for CrackSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            center_u: 0.5,
            center_v: 0.0,
            radius: 0.1,
            severity: 1.0,
            sharpness: 2.0,
        }
    }
}

impl CrackSpec {
    /// Intensity contributed at normalized coordinates `(u, v)`.
    #[must_use]
    pub fn intensity_at(&self, u: f64, v: f64) -> f64 {
        let radius = self.radius.max(RADIUS_FLOOR);
        let distance = (u - self.center_u).hypot(v - self.center_v);
        clamp01(1.0 - distance / radius).powf(self.sharpness) * self.severity
    }
}

/// Optional localization of the intensity around a world-space load point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointLoadSpec {
    /// Whether the localization applies.
    pub enabled: bool,
    /// Load point in world coordinates.
    pub world_position: Point,
    /// Radius in local units beyond which the weight is zero.
    pub radius: f64,
}

impl Default for PointLoadSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            world_position: Point::default(),
            radius: 0.25,
        }
    }
}

impl PointLoadSpec {
    /// Convert the load point into the beam's frame, or `None` when disabled.
    #[must_use]
    pub fn localize(&self, pose: &BeamPose) -> Option<LocalPointLoad> {
        self.enabled.then(|| LocalPointLoad {
            position: pose.to_local(self.world_position),
            radius: self.radius.max(RADIUS_FLOOR),
        })
    }
}

/// Point load already expressed in the beam's local frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalPointLoad {
    /// Load point in local coordinates.
    pub position: Point,
    /// Floored influence radius.
    pub radius: f64,
}

impl LocalPointLoad {
    /// Weight in `[0, 1]`: 1 under the load, 0 beyond the radius.
    ///
    /// Distance is measured in the horizontal plane only.
    #[must_use]
    pub fn weight(&self, vertex: Point) -> f64 {
        let distance = (vertex.x - self.position.x).hypot(vertex.z - self.position.z);
        clamp01(1.0 - smoothstep(0.0, self.radius, distance))
    }
}

/// Per-vertex intensity from the analytic heuristic.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntensityModel {
    /// Heuristic tuning.
    pub params: IntensityParams,
}

impl IntensityModel {
    /// Bottom-face weight after upward growth for a vertex at height fraction `y01`.
    #[must_use]
    pub fn grown_bottom(&self, y01: f64, load_ratio: f64) -> f64 {
        let bottom = (1.0 - y01).powf(self.params.bottom_bias);
        let growth = lerp(0.0, self.params.upward_growth, load_ratio);
        clamp01(bottom + growth * (1.0 - bottom) * bottom)
    }

    /// Intensity in `[0, 1]` for one base vertex.
    ///
    /// Returns zero at or below [`NO_LOAD_RATIO`]; callers wanting the no-load colour
    /// should go through [`IntensityModel::shade_all`].
    #[must_use]
    pub fn evaluate(
        &self,
        vertex: Point,
        bounds: &AxisBounds,
        load_ratio: f64,
        point_load: Option<&LocalPointLoad>,
        crack: Option<&CrackSpec>,
    ) -> f64 {
        if load_ratio <= NO_LOAD_RATIO {
            return 0.0;
        }
        let u = bounds.length_fraction(vertex);
        let v = bounds.height_fraction(vertex);
        let load_weight = point_load.map_or(1.0, |load| load.weight(vertex));
        let base = bend_shape(u) * self.grown_bottom(v, load_ratio) * load_weight * load_ratio;
        match crack {
            Some(crack) => clamp01(base.max(crack.intensity_at(u, v))),
            None => clamp01(base),
        }
    }

    /// Shade every vertex, short-circuiting to [`Shade::NoLoad`] when unloaded.
    #[must_use]
    pub fn shade_all(
        &self,
        vertices: &[Point],
        bounds: &AxisBounds,
        load_ratio: f64,
        point_load: Option<&LocalPointLoad>,
        crack: Option<&CrackSpec>,
    ) -> Vec<Shade> {
        if load_ratio <= NO_LOAD_RATIO {
            return vec![Shade::NoLoad; vertices.len()];
        }
        let crack = crack.filter(|crack| crack.enabled);
        vertices
            .iter()
            .map(|vertex| {
                Shade::Blend(self.evaluate(*vertex, bounds, load_ratio, point_load, crack))
            })
            .collect()
    }
}

impl AbsDiffEq for IntensityParams {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.bottom_bias.abs_diff_eq(&other.bottom_bias, epsilon)
            && self.upward_growth.abs_diff_eq(&other.upward_growth, epsilon)
    }
}

impl RelativeEq for IntensityParams {
    fn default_max_relative() -> f64 {
        f64::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f64, max_relative: f64) -> bool {
        self.bottom_bias
            .relative_eq(&other.bottom_bias, epsilon, max_relative)
            && self
                .upward_growth
                .relative_eq(&other.upward_growth, epsilon, max_relative)
    }
}

impl AbsDiffEq for CrackSpec {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.enabled == other.enabled
            && self.center_u.abs_diff_eq(&other.center_u, epsilon)
            && self.center_v.abs_diff_eq(&other.center_v, epsilon)
            && self.radius.abs_diff_eq(&other.radius, epsilon)
            && self.severity.abs_diff_eq(&other.severity, epsilon)
            && self.sharpness.abs_diff_eq(&other.sharpness, epsilon)
    }
}

impl RelativeEq for CrackSpec {
    fn default_max_relative() -> f64 {
        f64::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f64, max_relative: f64) -> bool {
        self.enabled == other.enabled
            && self
                .center_u
                .relative_eq(&other.center_u, epsilon, max_relative)
            && self
                .center_v
                .relative_eq(&other.center_v, epsilon, max_relative)
            && self.radius.relative_eq(&other.radius, epsilon, max_relative)
            && self
                .severity
                .relative_eq(&other.severity, epsilon, max_relative)
            && self
                .sharpness
                .relative_eq(&other.sharpness, epsilon, max_relative)
    }
}

impl AbsDiffEq for PointLoadSpec {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.enabled == other.enabled
            && self
                .world_position
                .abs_diff_eq(&other.world_position, epsilon)
            && self.radius.abs_diff_eq(&other.radius, epsilon)
    }
}

impl RelativeEq for PointLoadSpec {
    fn default_max_relative() -> f64 {
        f64::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f64, max_relative: f64) -> bool {
        self.enabled == other.enabled
            && self
                .world_position
                .relative_eq(&other.world_position, epsilon, max_relative)
            && self.radius.relative_eq(&other.radius, epsilon, max_relative)
    }
}
