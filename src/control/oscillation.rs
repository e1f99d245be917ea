//! Detection of sustained small error oscillation on one axis.
//!
//! An axis oscillates when its recent positional errors straddle zero and
//! the current error is small compared to the swing of the window.  The
//! tracking loop then swaps to the damped gain set.  Gains swap back only
//! after the commanded speed has decayed to [`RELEASE_RATIO`] of the speed
//! seen when they were engaged.

use super::stats::Statistics;

/// Fraction of the engage-time speed below which the damped gains are
/// released.
pub const RELEASE_RATIO: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OscillationTransition {
    /// Switch to the oscillation gain set.
    Engaged,
    /// Back to the tracking gain set.
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OscillationState {
    /// `|error| / range` must stay below this to count as oscillation.
    threshold: f64,
    /// Samples needed in the window before detection starts.
    min_samples: usize,
    /// Commanded speed magnitude recorded on engagement.
    engaged_at: Option<f64>,
}

impl OscillationState {
    pub fn new(threshold: f64, min_samples: usize) -> Self {
        Self {
            threshold,
            min_samples,
            engaged_at: None,
        }
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged_at.is_some()
    }

    /// Speed recorded when the oscillation gains were engaged.
    pub fn engaged_speed(&self) -> Option<f64> {
        self.engaged_at
    }

    /// Feed one control cycle: the error window (current error included),
    /// the current error and the commanded speed.
    pub fn update<const N: usize>(
        &mut self,
        errors: &Statistics<N>,
        error: f64,
        speed: f64,
    ) -> Option<OscillationTransition> {
        match self.engaged_at {
            Some(recorded) => {
                if speed.abs() <= RELEASE_RATIO * recorded {
                    self.engaged_at = None;
                    Some(OscillationTransition::Released)
                } else {
                    None
                }
            }
            None => {
                if self.oscillating(errors, error) {
                    self.engaged_at = Some(speed.abs());
                    Some(OscillationTransition::Engaged)
                } else {
                    None
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.engaged_at = None;
    }

    fn oscillating<const N: usize>(&self, errors: &Statistics<N>, error: f64) -> bool {
        if errors.len() < self.min_samples {
            return false;
        }
        let (min, max) = (errors.min(), errors.max());
        if !(min < 0.0 && max > 0.0) {
            return false;
        }
        error.abs() / (max - min) < self.threshold
    }
}
