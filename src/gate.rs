//! Staleness gate deciding whether a tick needs to recompute.

use approx::RelativeEq;

/// Absolute tolerance used when no explicit tolerance is configured.
pub const DEFAULT_EPSILON: f64 = 1.0e-6;

/// Relative tolerance used when no explicit tolerance is configured.
pub const DEFAULT_MAX_RELATIVE: f64 = 1.0e-6;

/// Remembers the last applied inputs and reports when new inputs differ observably.
///
/// Inputs are always compared with the last *applied* snapshot, so slow drift below
/// the tolerance accumulates until it becomes observable.
///
/// # Examples
/// ```
/// use beamtwin::StaleStateGate;
///
/// let mut gate = StaleStateGate::<f64>::new();
/// assert!(gate.needs_recompute(&1.0));
/// gate.commit(&1.0);
/// assert!(!gate.needs_recompute(&(1.0 + 1.0e-9)));
/// assert!(gate.needs_recompute(&1.1));
/// ```
#[derive(Clone, Debug)]
pub struct StaleStateGate<T> {
    /// Inputs of the last recompute, if any.
    applied: Option<T>,
    /// Absolute tolerance.
    epsilon: f64,
    /// Relative tolerance.
    max_relative: f64,
}

impl<T> Default for StaleStateGate<T>
where
    T: RelativeEq<Epsilon = f64> + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StaleStateGate<T>
where
    T: RelativeEq<Epsilon = f64> + Clone,
{
    /// Gate with the default tolerances and nothing applied yet.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tolerance(DEFAULT_EPSILON, DEFAULT_MAX_RELATIVE)
    }

    /// Gate with explicit tolerances.
    #[must_use]
    pub fn with_tolerance(epsilon: f64, max_relative: f64) -> Self {
        Self {
            applied: None,
            epsilon,
            max_relative,
        }
    }

    /// Whether `inputs` differ from the applied snapshot beyond the tolerance.
    #[must_use]
    pub fn needs_recompute(&self, inputs: &T) -> bool {
        match &self.applied {
            Some(applied) => !applied.relative_eq(inputs, self.epsilon, self.max_relative),
            None => true,
        }
    }

    /// Record `inputs` as applied.
    pub fn commit(&mut self, inputs: &T) {
        self.applied = Some(inputs.clone());
    }

    /// Forget the applied snapshot so the next check reports stale.
    pub fn invalidate(&mut self) {
        self.applied = None;
    }

    /// Inputs of the last recompute.
    #[must_use]
    pub fn applied(&self) -> Option<&T> {
        self.applied.as_ref()
    }
}
