//! Damage evolution, stress history and remaining-useful-life estimation used by the
//! telemetry simulator.

use std::collections::VecDeque;

use serde::Serialize;

use crate::errors::InferenceError;
use crate::math::clamp01;

/// Number of samples a prognostics model looks at.
pub const HISTORY_WINDOW: usize = 10;

/// Damage at which the beam is considered failed.
pub const FAILURE_THRESHOLD: f64 = 0.9;

/// Damage state that grows faster under higher stress.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DamageEvolution {
    /// Current damage in `[0, 1]`.
    pub damage: f64,
    /// Growth per step regardless of stress.
    pub base_rate: f64,
    /// Additional growth per unit of peak stress.
    pub stress_coefficient: f64,
}

impl Default for DamageEvolution {
    fn default() -> Self {
        Self {
            damage: 0.05,
            base_rate: 0.002,
            stress_coefficient: 4.0e-8,
        }
    }
}

impl DamageEvolution {
    /// Grow the damage by one step given the peak stress of the step.
    pub fn advance(&mut self, max_stress: f64) -> f64 {
        let growth = self.base_rate + self.stress_coefficient * max_stress;
        self.damage = clamp01(self.damage + growth);
        self.damage
    }
}

/// Peak and mean stress of one step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct StressSample {
    /// Largest stress in the field.
    pub max: f64,
    /// Mean stress of the field.
    pub mean: f64,
}

impl StressSample {
    /// Summarize a stress field; an empty field summarizes to zeros.
    #[must_use]
    pub fn from_field(field: &[f64]) -> Self {
        if field.is_empty() {
            return Self { max: 0.0, mean: 0.0 };
        }
        let max = field.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        #[allow(clippy::cast_precision_loss)]
        let mean = field.iter().sum::<f64>() / field.len() as f64;
        Self { max, mean }
    }
}

/// Rolling window of the most recent stress samples.
#[derive(Clone, Debug)]
pub struct StressHistory {
    /// Samples, oldest first.
    samples: VecDeque<StressSample>,
    /// Window length.
    capacity: usize,
}

impl Default for StressHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_WINDOW)
    }
}

impl StressHistory {
    /// Window holding at most `capacity` samples.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest when full.
    pub fn push(&mut self, sample: StressSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Whether the window is complete.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    /// Samples currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples, oldest first.
    #[must_use]
    pub fn window(&self) -> Vec<StressSample> {
        self.samples.iter().copied().collect()
    }
}

/// Opaque sequence model predicting damage from a full stress window.
pub trait Prognostics {
    /// Predicted damage for the window, oldest sample first.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError`] when the model cannot produce a prediction.
    fn predict_damage(&self, window: &[StressSample]) -> Result<f64, InferenceError>;
}

impl<F> Prognostics for F
where
    F: Fn(&[StressSample]) -> f64,
{
    fn predict_damage(&self, window: &[StressSample]) -> Result<f64, InferenceError> {
        Ok(self(window))
    }
}

/// Steps left until `predicted` damage reaches `failure_threshold`.
///
/// # Examples
/// ```
/// use beamtwin::prognosis::remaining_useful_life;
///
/// assert!((remaining_useful_life(0.4, 0.9, 1.0) - 0.5).abs() < 1.0e-12);
/// assert_eq!(remaining_useful_life(0.95, 0.9, 1.0), 0.0);
/// ```
#[must_use]
pub fn remaining_useful_life(predicted: f64, failure_threshold: f64, time_step: f64) -> f64 {
    if predicted < failure_threshold && time_step > 0.0 {
        (failure_threshold - predicted) / time_step
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn damage_grows_with_peak_stress_and_saturates() {
        let mut calm = DamageEvolution::default();
        let mut stressed = DamageEvolution::default();
        calm.advance(0.0);
        stressed.advance(1.0e6);
        assert_relative_eq!(calm.damage, 0.052, epsilon = 1.0e-12);
        assert_relative_eq!(stressed.damage, 0.052 + 0.04, epsilon = 1.0e-12);

        for _ in 0..100 {
            stressed.advance(1.0e7);
        }
        assert_eq!(stressed.damage, 1.0);
    }

    #[test]
    fn history_keeps_the_latest_window() {
        let mut history = StressHistory::with_capacity(3);
        for i in 0..5 {
            history.push(StressSample {
                max: f64::from(i),
                mean: 0.0,
            });
        }
        assert!(history.is_full());
        let maxima: Vec<f64> = history.window().iter().map(|s| s.max).collect();
        assert_eq!(maxima, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn field_summary() {
        let sample = StressSample::from_field(&[1.0, -3.0, 5.0]);
        assert_eq!(sample.max, 5.0);
        assert_relative_eq!(sample.mean, 1.0);
        assert_eq!(StressSample::from_field(&[]), StressSample { max: 0.0, mean: 0.0 });
    }

    #[test]
    fn closures_act_as_prognostics() {
        let model = |window: &[StressSample]| window.len() as f64 / 100.0;
        let window = vec![StressSample { max: 0.0, mean: 0.0 }; 10];
        assert_relative_eq!(model.predict_damage(&window).expect("prediction"), 0.1);
    }
}
