//! Closed-form bending profile used to displace the mesh.

use crate::geometry::{AxisBounds, Point};
use crate::intensity::NO_LOAD_RATIO;
use crate::math::{bend_shape, clamp01, inverse_lerp, DEGENERATE_EPSILON};

/// Externally driven load together with the beam's rating.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoadState {
    /// Current load in newtons.
    pub load_value: f64,
    /// Rated load in newtons at which the maximum deflection is reached.
    pub max_load: f64,
    /// Real deflection at midspan under the rated load, in millimetres.
    pub max_deflection_mm: f64,
    /// Visual multiplier applied on top of the real deflection.
    pub exaggeration: f64,
}

impl LoadState {
    /// Load divided by the rated load, clamped to `[0, 1]`.
    ///
    /// # Examples
    /// ```
    /// use beamtwin::LoadState;
    ///
    /// let state = LoadState {
    ///     load_value: 92_745.0,
    ///     max_load: 185_490.0,
    ///     max_deflection_mm: 6.7,
    ///     exaggeration: 1.0,
    /// };
    /// assert_eq!(state.load_ratio(), 0.5);
    /// ```
    #[must_use]
    pub fn load_ratio(&self) -> f64 {
        if self.max_load <= 0.0 || !self.max_load.is_finite() {
            return 0.0;
        }
        clamp01(self.load_value / self.max_load)
    }
}

/// Maps a load ratio and a position along the beam to a vertical displacement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeflectionModel {
    /// Midspan deflection at the rated load, in millimetres.
    pub max_deflection_mm: f64,
    /// Visual multiplier.
    pub exaggeration: f64,
    /// Vertical scale of the rendered object; world deflection is divided by it.
    pub vertical_scale: f64,
}

impl DeflectionModel {
    /// Midspan deflection in mesh units for the given load ratio.
    ///
    /// Vertical scales at or below the degenerate epsilon are not compensated.
    #[must_use]
    pub fn deflection_meters(&self, load_ratio: f64) -> f64 {
        let deflection_mm = load_ratio * self.max_deflection_mm;
        let compensation = if self.vertical_scale.abs() > DEGENERATE_EPSILON {
            self.vertical_scale
        } else {
            1.0
        };
        deflection_mm / 1000.0 * self.exaggeration / compensation
    }

    /// Vertical displacement of a point at `position_along_length`.
    ///
    /// Negative values move the vertex down. Both beam ends are exactly zero, as is
    /// every point at or below [`NO_LOAD_RATIO`].
    #[must_use]
    pub fn displacement(
        &self,
        load_ratio: f64,
        position_along_length: f64,
        bounds: &AxisBounds,
    ) -> f64 {
        if load_ratio <= NO_LOAD_RATIO {
            return 0.0;
        }
        let normalized = inverse_lerp(bounds.min_length, bounds.max_length, position_along_length);
        -bend_shape(normalized) * self.deflection_meters(load_ratio)
    }

    /// Displacement for every vertex of `vertices`, in order.
    #[must_use]
    pub fn displace_all(
        &self,
        load_ratio: f64,
        vertices: &[Point],
        bounds: &AxisBounds,
    ) -> Vec<f64> {
        vertices
            .iter()
            .map(|vertex| self.displacement(load_ratio, bounds.axis.along(*vertex), bounds))
            .collect()
    }
}
