//! Two-colour gradient used by every data source.

use serde::{Deserialize, Serialize};

use crate::intensity::Shade;
use crate::math::clamp01;

/// Linear RGBA colour with channels in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red channel.
    pub r: f32,
    /// Green channel.
    pub g: f32,
    /// Blue channel.
    pub b: f32,
    /// Alpha channel.
    pub a: f32,
}

impl Color {
    /// Create an opaque colour.
    #[must_use]
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Channel-wise linear interpolation; `t` is clamped to `[0, 1]`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let t = clamp01(t) as f32;
        let mix = |a: f32, b: f32| a + (b - a) * t;
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }
}

/// Maps intensities onto a blend between the unloaded and cracked colours.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gradient {
    /// Colour of an unloaded beam, and of zero intensity.
    pub no_load: Color,
    /// Colour of full intensity and of the hard crack override.
    pub crack: Color,
}

impl Default for Gradient {
    fn default() -> Self {
        Self {
            no_load: Color::rgb(0.75, 0.75, 0.75),
            crack: Color::rgb(1.0, 0.0, 0.0),
        }
    }
}

impl Gradient {
    /// Colour at intensity `t`.
    #[must_use]
    pub fn sample(&self, t: f64) -> Color {
        self.no_load.lerp(self.crack, t)
    }

    /// Colour for a resolved [`Shade`].
    #[must_use]
    pub fn resolve(&self, shade: Shade) -> Color {
        match shade {
            Shade::NoLoad => self.no_load,
            Shade::Blend(t) => self.sample(t),
            Shade::Crack => self.crack,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_endpoints() {
        let gradient = Gradient::default();
        assert_eq!(gradient.sample(0.0), gradient.no_load);
        assert_eq!(gradient.sample(1.0), gradient.crack);
        assert_eq!(gradient.resolve(Shade::NoLoad), gradient.no_load);
        assert_eq!(gradient.resolve(Shade::Crack), gradient.crack);
    }

    #[test]
    fn blend_is_linear_per_channel() {
        let gradient = Gradient {
            no_load: Color::rgb(0.0, 1.0, 0.0),
            crack: Color::rgb(1.0, 0.0, 0.5),
        };
        let mid = gradient.resolve(Shade::Blend(0.5));
        assert!((mid.r - 0.5).abs() < 1.0e-6);
        assert!((mid.g - 0.5).abs() < 1.0e-6);
        assert!((mid.b - 0.25).abs() < 1.0e-6);
        assert!((mid.a - 1.0).abs() < 1.0e-6);
    }

    #[test]
    fn nan_intensity_falls_back_to_no_load() {
        let gradient = Gradient::default();
        assert_eq!(gradient.sample(f64::NAN), gradient.no_load);
    }
}
