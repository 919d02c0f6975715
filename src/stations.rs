//! Discrete stations along the beam evaluated with simple-beam formulas.
//!
//! The beam is treated as simply supported with a single mid-span point load, so the
//! bending moment is `P x / 2` on the left half and `P (L - x) / 2` on the right half.
//! See <https://en.wikipedia.org/wiki/Euler%E2%80%93Bernoulli_beam_theory>.

use serde::{Deserialize, Serialize};

use crate::errors::StationError;
use crate::math::{bend_shape, DEGENERATE_EPSILON};

/// Rectangular cross-section and material of the physical beam.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionProperties {
    /// Span in metres.
    pub length: f64,
    /// Section width in metres.
    pub width: f64,
    /// Section depth in metres.
    pub depth: f64,
    /// Young's modulus in pascals.
    pub elastic_modulus: f64,
}

impl Default for SectionProperties {
    fn default() -> Self {
        Self {
            length: 1.0,
            width: 0.15,
            depth: 0.25,
            elastic_modulus: 25.0e9,
        }
    }
}

impl SectionProperties {
    /// Second moment of area `b h^3 / 12`.
    ///
    /// # Examples
    /// ```
    /// use beamtwin::SectionProperties;
    ///
    /// let section = SectionProperties::default();
    /// assert!((section.second_moment() - 1.953125e-4).abs() < 1.0e-12);
    /// ```
    #[must_use]
    pub fn second_moment(&self) -> f64 {
        self.width * self.depth.powi(3) / 12.0
    }

    /// Bending moment at `x` under a mid-span point load `load`.
    #[must_use]
    pub fn bending_moment(&self, load: f64, x: f64) -> f64 {
        if x <= self.length / 2.0 {
            load * x / 2.0
        } else {
            load * (self.length - x) / 2.0
        }
    }
}

/// Response at one station.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Station {
    /// Distance from the left support in metres.
    pub position: f64,
    /// Extreme-fibre bending stress in pascals.
    pub bending_stress: f64,
    /// Strain at the extreme fibre.
    pub strain: f64,
    /// Visual displacement in mesh units; negative is downward.
    pub displacement: f64,
}

/// Ordered stations, regenerated in full whenever the twin recomputes.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StationTable {
    /// Stations ordered from the left support.
    stations: Vec<Station>,
}

impl StationTable {
    /// Sample `segments` stations at the midpoint of each segment.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::TooFewSegments`] when `segments < 2`.
    ///
    /// # Examples
    /// ```
    /// use beamtwin::{SectionProperties, StationTable};
    ///
    /// let table = StationTable::sample(10, &SectionProperties::default(), 10_000.0, 0.0)
    ///     .unwrap();
    /// assert_eq!(table.len(), 10);
    /// assert!((table.positions()[0] - 0.05).abs() < 1.0e-12);
    /// ```
    pub fn sample(
        segments: usize,
        section: &SectionProperties,
        load: f64,
        deflection_meters: f64,
    ) -> Result<Self, StationError> {
        if segments < 2 {
            return Err(StationError::TooFewSegments(segments));
        }
        let inertia = section.second_moment();
        #[allow(clippy::cast_precision_loss)]
        let count = segments as f64;
        let stations = (0..segments)
            .map(|index| {
                #[allow(clippy::cast_precision_loss)]
                let fraction = (index as f64 + 0.5) / count;
                let position = fraction * section.length;
                let moment = section.bending_moment(load, position);
                let bending_stress = if inertia > DEGENERATE_EPSILON * DEGENERATE_EPSILON {
                    moment * (section.depth / 2.0) / inertia
                } else {
                    0.0
                };
                let strain = if section.elastic_modulus > DEGENERATE_EPSILON {
                    bending_stress / section.elastic_modulus
                } else {
                    0.0
                };
                Station {
                    position,
                    bending_stress,
                    strain,
                    displacement: -bend_shape(fraction) * deflection_meters,
                }
            })
            .collect();
        Ok(Self { stations })
    }

    /// Number of stations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    /// Whether the table has not been sampled yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Station at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Station> {
        self.stations.get(index)
    }

    /// Iterate over the stations from the left support.
    pub fn iter(&self) -> std::slice::Iter<'_, Station> {
        self.stations.iter()
    }

    /// Station positions in metres.
    #[must_use]
    pub fn positions(&self) -> Vec<f64> {
        self.stations.iter().map(|s| s.position).collect()
    }

    /// Bending stresses in pascals.
    #[must_use]
    pub fn stresses(&self) -> Vec<f64> {
        self.stations.iter().map(|s| s.bending_stress).collect()
    }

    /// Extreme-fibre strains.
    #[must_use]
    pub fn strains(&self) -> Vec<f64> {
        self.stations.iter().map(|s| s.strain).collect()
    }

    /// Visual displacements.
    #[must_use]
    pub fn displacements(&self) -> Vec<f64> {
        self.stations.iter().map(|s| s.displacement).collect()
    }
}

impl<'a> IntoIterator for &'a StationTable {
    type Item = &'a Station;
    type IntoIter = std::slice::Iter<'a, Station>;

    fn into_iter(self) -> Self::IntoIter {
        self.stations.iter()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn first_station_matches_hand_calculation() {
        let section = SectionProperties::default();
        let table = StationTable::sample(10, &section, 10_000.0, 0.0).expect("sampled");
        let first = table.get(0).expect("first station");

        assert_relative_eq!(first.position, 0.05, epsilon = 1.0e-12);
        assert_relative_eq!(section.bending_moment(10_000.0, 0.05), 250.0, epsilon = 1.0e-9);
        assert_relative_eq!(section.second_moment(), 1.953_125e-4, epsilon = 1.0e-15);
        assert_relative_eq!(first.bending_stress, 160_000.0, max_relative = 1.0e-9);
        assert_relative_eq!(first.strain, 6.4e-6, max_relative = 1.0e-9);
    }

    #[test]
    fn stations_equidistant_from_midspan_share_stress() {
        let section = SectionProperties::default();
        let table = StationTable::sample(10, &section, 10_000.0, 0.002).expect("sampled");
        for i in 0..5 {
            let left = table.get(i).expect("left");
            let right = table.get(9 - i).expect("right");
            assert_relative_eq!(
                left.bending_stress.abs(),
                right.bending_stress.abs(),
                max_relative = 1.0e-9
            );
            assert_relative_eq!(left.displacement, right.displacement, epsilon = 1.0e-15);
        }
    }

    #[test]
    fn quarter_points_share_stress() {
        let section = SectionProperties::default();
        let table = StationTable::sample(4, &section, 5_000.0, 0.0).expect("sampled");
        // Stations at 0.125, 0.375, 0.625 and 0.875 of the span.
        assert_relative_eq!(table.stresses()[1], table.stresses()[2], max_relative = 1.0e-12);
        assert_relative_eq!(table.stresses()[0], table.stresses()[3], max_relative = 1.0e-12);
    }

    #[test]
    fn stations_never_touch_the_supports() {
        let table =
            StationTable::sample(2, &SectionProperties::default(), 1.0, 0.01).expect("sampled");
        assert_eq!(table.positions(), vec![0.25, 0.75]);
        assert!(table.displacements().iter().all(|d| *d < 0.0));
    }

    #[test]
    fn too_few_segments_are_rejected() {
        let error = StationTable::sample(1, &SectionProperties::default(), 1.0, 0.0)
            .expect_err("one segment rejected");
        assert_eq!(error, StationError::TooFewSegments(1));
    }

    #[test]
    fn degenerate_section_yields_zero_instead_of_nan() {
        let section = SectionProperties {
            width: 0.0,
            elastic_modulus: 0.0,
            ..SectionProperties::default()
        };
        let table = StationTable::sample(3, &section, 1_000.0, 0.0).expect("sampled");
        assert!(table.stresses().iter().all(|s| *s == 0.0));
        assert!(table.strains().iter().all(|s| *s == 0.0));
    }
}
