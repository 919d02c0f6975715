//! Vertex storage, axis bounds and the beam's placement in the world.

use approx::{AbsDiffEq, RelativeEq};
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::errors::TwinError;
use crate::math::{inverse_lerp, DEGENERATE_EPSILON};

/// Position in three dimensional space measured in metres.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Distance along the X axis.
    pub x: f64,
    /// Distance along the Y (vertical) axis.
    pub y: f64,
    /// Distance along the Z axis.
    pub z: f64,
}

impl Point {
    /// Create a [`Point`] with explicit coordinates.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Convert the point into an algebraic vector.
    #[must_use]
    pub fn to_vector(self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

impl From<Vector3<f64>> for Point {
    fn from(value: Vector3<f64>) -> Self {
        Self::new(value.x, value.y, value.z)
    }
}

impl From<Point> for Vector3<f64> {
    fn from(value: Point) -> Self {
        value.to_vector()
    }
}

impl AbsDiffEq for Point {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.to_vector().abs_diff_eq(&other.to_vector(), epsilon)
    }
}

impl RelativeEq for Point {
    fn default_max_relative() -> f64 {
        f64::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f64, max_relative: f64) -> bool {
        self.to_vector()
            .relative_eq(&other.to_vector(), epsilon, max_relative)
    }
}

/// Convenience helper for creating [`Point`] instances.
///
/// # Examples
/// ```
/// use beamtwin::point;
///
/// let origin = point(0.0, 0.0, 0.0);
/// assert_eq!(origin.x, 0.0);
/// ```
#[must_use]
pub const fn point(x: f64, y: f64, z: f64) -> Point {
    Point::new(x, y, z)
}

/// Horizontal axis the beam runs along. Height is always the Y axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthAxis {
    /// The beam spans the X axis.
    #[default]
    X,
    /// The beam spans the Z axis.
    Z,
}

impl LengthAxis {
    /// Coordinate of `p` along the beam.
    #[must_use]
    pub fn along(self, p: Point) -> f64 {
        match self {
            Self::X => p.x,
            Self::Z => p.z,
        }
    }

    /// Coordinate of `p` along the other horizontal axis.
    #[must_use]
    pub fn across(self, p: Point) -> f64 {
        match self {
            Self::X => p.z,
            Self::Z => p.x,
        }
    }
}

/// Extents of the base mesh along the length and height axes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisBounds {
    /// Axis the length extents were measured on.
    pub axis: LengthAxis,
    /// Smallest coordinate along the beam.
    pub min_length: f64,
    /// Largest coordinate along the beam.
    pub max_length: f64,
    /// Lowest vertex height.
    pub min_height: f64,
    /// Highest vertex height.
    pub max_height: f64,
}

impl AxisBounds {
    /// Scan `vertices` once and record their extents.
    ///
    /// # Errors
    ///
    /// Returns [`TwinError::EmptyGeometry`] when `vertices` is empty.
    ///
    /// # Examples
    /// ```
    /// use beamtwin::{point, AxisBounds, LengthAxis};
    ///
    /// let vertices = [point(-0.5, 0.0, 0.0), point(0.5, 0.25, 0.1)];
    /// let bounds = AxisBounds::from_vertices(&vertices, LengthAxis::X).unwrap();
    /// assert_eq!(bounds.max_length - bounds.min_length, 1.0);
    /// assert_eq!(bounds.max_height, 0.25);
    /// ```
    pub fn from_vertices(vertices: &[Point], axis: LengthAxis) -> Result<Self, TwinError> {
        let first = vertices.first().ok_or(TwinError::EmptyGeometry)?;
        let mut bounds = Self {
            axis,
            min_length: axis.along(*first),
            max_length: axis.along(*first),
            min_height: first.y,
            max_height: first.y,
        };
        for vertex in &vertices[1..] {
            let along = axis.along(*vertex);
            bounds.min_length = bounds.min_length.min(along);
            bounds.max_length = bounds.max_length.max(along);
            bounds.min_height = bounds.min_height.min(vertex.y);
            bounds.max_height = bounds.max_height.max(vertex.y);
        }
        Ok(bounds)
    }

    /// Normalized position of `p` along the beam in `[0, 1]`.
    #[must_use]
    pub fn length_fraction(&self, p: Point) -> f64 {
        inverse_lerp(self.min_length, self.max_length, self.axis.along(p))
    }

    /// Normalized height of `p` in `[0, 1]`; 0 is the bottom face.
    #[must_use]
    pub fn height_fraction(&self, p: Point) -> f64 {
        inverse_lerp(self.min_height, self.max_height, p.y)
    }

    /// Whether either axis has zero extent.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        (self.max_length - self.min_length).abs() <= DEGENERATE_EPSILON
            || (self.max_height - self.min_height).abs() <= DEGENERATE_EPSILON
    }
}

/// Immutable base positions plus a working copy of the same length.
#[derive(Clone, Debug)]
pub struct VertexBuffer {
    /// Undeformed positions.
    base: Vec<Point>,
    /// Positions after the latest displacement.
    working: Vec<Point>,
}

impl VertexBuffer {
    /// Take ownership of the base positions.
    ///
    /// # Errors
    ///
    /// Returns [`TwinError::EmptyGeometry`] when `base` is empty.
    pub fn new(base: Vec<Point>) -> Result<Self, TwinError> {
        if base.is_empty() {
            return Err(TwinError::EmptyGeometry);
        }
        let working = base.clone();
        Ok(Self { base, working })
    }

    /// Number of vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.base.len()
    }

    /// Always false; an empty buffer cannot be constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// Undeformed positions.
    #[must_use]
    pub fn base(&self) -> &[Point] {
        &self.base
    }

    /// Positions after the latest displacement.
    #[must_use]
    pub fn working(&self) -> &[Point] {
        &self.working
    }

    /// Offset every base vertex vertically. Horizontal coordinates are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`TwinError::BufferLength`] and leaves the working copy unchanged when
    /// `displacement` does not have one entry per vertex.
    pub fn apply_vertical(&mut self, displacement: &[f64]) -> Result<(), TwinError> {
        if displacement.len() != self.base.len() {
            return Err(TwinError::BufferLength {
                expected: self.base.len(),
                received: displacement.len(),
            });
        }
        for ((working, base), dy) in self
            .working
            .iter_mut()
            .zip(&self.base)
            .zip(displacement)
        {
            *working = Point::new(base.x, base.y + dy, base.z);
        }
        Ok(())
    }
}

/// World placement of the beam object.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeamPose {
    /// World position of the beam's local origin.
    pub translation: Vector3<f64>,
    /// World orientation.
    pub rotation: UnitQuaternion<f64>,
    /// Per-axis scale of the beam object.
    pub scale: Vector3<f64>,
}

impl Default for BeamPose {
    fn default() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl BeamPose {
    /// Bring a world-space point into the beam's local frame.
    ///
    /// Scale components at or below the degenerate epsilon are skipped rather than
    /// divided by.
    #[must_use]
    pub fn to_local(&self, world: Point) -> Point {
        let rotated = self
            .rotation
            .inverse_transform_vector(&(world.to_vector() - self.translation));
        let unscale = |value: f64, scale: f64| {
            if scale.abs() > DEGENERATE_EPSILON {
                value / scale
            } else {
                value
            }
        };
        Point::new(
            unscale(rotated.x, self.scale.x),
            unscale(rotated.y, self.scale.y),
            unscale(rotated.z, self.scale.z),
        )
    }

    /// Vertical scale used to keep world-space deflection independent of scaling.
    #[must_use]
    pub fn vertical_scale(&self) -> f64 {
        self.scale.y
    }
}

impl AbsDiffEq for BeamPose {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.translation.abs_diff_eq(&other.translation, epsilon)
            && self.rotation.abs_diff_eq(&other.rotation, epsilon)
            && self.scale.abs_diff_eq(&other.scale, epsilon)
    }
}

impl RelativeEq for BeamPose {
    fn default_max_relative() -> f64 {
        f64::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f64, max_relative: f64) -> bool {
        self.translation
            .relative_eq(&other.translation, epsilon, max_relative)
            && self
                .rotation
                .relative_eq(&other.rotation, epsilon, max_relative)
            && self.scale.relative_eq(&other.scale, epsilon, max_relative)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    use super::*;

    #[test]
    fn point_to_vector_roundtrip() {
        let origin = Point::new(1.0, 2.0, 3.0);
        let vector: Vector3<f64> = origin.into();
        assert_eq!(vector, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(Point::from(vector), origin);
    }

    #[test]
    fn bounds_follow_the_chosen_axis() {
        let vertices = [point(0.0, -0.1, -2.0), point(1.0, 0.2, 3.0)];
        let along_x = AxisBounds::from_vertices(&vertices, LengthAxis::X).expect("bounds");
        let along_z = AxisBounds::from_vertices(&vertices, LengthAxis::Z).expect("bounds");
        assert_eq!((along_x.min_length, along_x.max_length), (0.0, 1.0));
        assert_eq!((along_z.min_length, along_z.max_length), (-2.0, 3.0));
        assert_eq!((along_z.min_height, along_z.max_height), (-0.1, 0.2));
    }

    #[test]
    fn empty_geometry_is_rejected() {
        assert!(matches!(
            AxisBounds::from_vertices(&[], LengthAxis::X),
            Err(TwinError::EmptyGeometry)
        ));
        assert!(matches!(
            VertexBuffer::new(Vec::new()),
            Err(TwinError::EmptyGeometry)
        ));
    }

    #[test]
    fn degenerate_bounds_do_not_divide_by_zero() {
        let vertices = [point(0.5, 1.0, 0.0); 3];
        let bounds = AxisBounds::from_vertices(&vertices, LengthAxis::X).expect("bounds");
        assert!(bounds.is_degenerate());
        assert_eq!(bounds.length_fraction(vertices[0]), 0.0);
        assert_eq!(bounds.height_fraction(vertices[0]), 0.0);
    }

    #[test]
    fn vertical_offsets_leave_horizontal_coordinates_alone() {
        let mut buffer =
            VertexBuffer::new(vec![point(0.0, 0.0, 0.5), point(1.0, 0.2, -0.5)]).expect("buffer");
        buffer.apply_vertical(&[-0.01, 0.02]).expect("lengths match");
        assert_eq!(buffer.working()[0], point(0.0, -0.01, 0.5));
        assert_relative_eq!(buffer.working()[1].y, 0.22, epsilon = 1.0e-12);
        assert_eq!(buffer.working()[1].x, 1.0);
        assert_eq!(buffer.base()[1].y, 0.2);
    }

    #[test]
    fn mismatched_displacement_is_rejected_without_side_effects() {
        let mut buffer = VertexBuffer::new(vec![point(0.0, 0.0, 0.0); 2]).expect("buffer");
        let error = buffer.apply_vertical(&[1.0]).expect_err("length mismatch");
        assert!(matches!(
            error,
            TwinError::BufferLength {
                expected: 2,
                received: 1
            }
        ));
        assert_eq!(buffer.working(), buffer.base());
    }

    #[test]
    fn pose_maps_world_points_into_the_beam_frame() {
        let pose = BeamPose {
            translation: Vector3::new(10.0, 0.0, 0.0),
            rotation: UnitQuaternion::from_axis_angle(
                &Vector3::y_axis(),
                std::f64::consts::FRAC_PI_2,
            ),
            scale: Vector3::new(2.0, 1.0, 1.0),
        };
        // Local +X maps to world -Z under a quarter turn about +Y.
        let local = pose.to_local(point(10.0, 0.0, -4.0));
        assert_relative_eq!(local.x, 2.0, epsilon = 1.0e-12);
        assert_relative_eq!(local.y, 0.0, epsilon = 1.0e-12);
        assert_relative_eq!(local.z, 0.0, epsilon = 1.0e-12);
    }
}
