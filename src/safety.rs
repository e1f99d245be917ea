//! Fault supervision.
//!
//! Force One controllers multiplex the axis fault word into the "last"
//! field of every status frame.  The supervisor runs **on every status
//! frame** and feeds each axis word through an [`ErrorLatch`], so a
//! persistent fault is reported once and every new distinct fault is
//! reported again.
//!
//! ## Fault lifecycle
//!
//! 1. A nonzero word arrives: the latch raises, the fault is logged with
//!    its decoded description and the hardware-error flag is set.
//! 2. The same word keeps arriving: nothing happens.
//! 3. A different nonzero word arrives: raised and logged again.
//! 4. Zero arrives: the latch clears.  When both axes are clear the
//!    hardware-error flag drops.
//!
//! Machine decisions (stop on limit) test [`AxisFault`] bits directly,
//! never the decoded strings.

use log::{error, info};

use crate::link::ControllerGeneration;
use crate::protocol::{Axes, Axis, AxisFault, AxisStatus, describe_errors};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchTransition {
    /// New fault word, or a different one replacing the previous.
    Raised(u16),
    /// The fault word went back to zero.
    Cleared,
}

/// Debounces the fault word of one axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorLatch {
    last: u16,
}

impl ErrorLatch {
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    /// Last word seen.
    pub fn word(&self) -> u16 {
        self.last
    }

    pub fn is_active(&self) -> bool {
        self.last != 0
    }

    /// Feed one word; returns the transition worth reporting, if any.
    pub fn update(&mut self, word: u16) -> Option<LatchTransition> {
        if word == self.last {
            return None;
        }
        self.last = word;
        if word == 0 {
            Some(LatchTransition::Cleared)
        } else {
            Some(LatchTransition::Raised(word))
        }
    }
}

/// Outcome of one supervisor pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultReport {
    pub x: Option<LatchTransition>,
    pub y: Option<LatchTransition>,
    /// First axis found on a limit switch, with its fault word.
    pub limit: Option<(Axis, u16)>,
}

impl FaultReport {
    pub fn transitions(&self) -> impl Iterator<Item = (Axis, LatchTransition)> + '_ {
        [(Axis::X, self.x), (Axis::Y, self.y)]
            .into_iter()
            .filter_map(|(axis, t)| t.map(|t| (axis, t)))
    }
}

/// Fault supervisor for both axes.
#[derive(Debug, Clone, Default)]
pub struct FaultSupervisor {
    latches: Axes<ErrorLatch>,
}

impl FaultSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate the fault words carried by `status`.  Frames from
    /// generations without fault reporting, and frames multiplexing some
    /// other reading, leave the latches untouched.
    pub fn evaluate(&mut self, status: &AxisStatus, generation: &ControllerGeneration) -> FaultReport {
        let mut report = FaultReport::default();

        // ── X axis ────────────────────────────────────────────────
        if let Some(word) = status.x_telemetry(generation).fault_word() {
            report.x = self.eval_fault(Axis::X, word);
            if AxisFault::from_bits_truncate(word).on_limit() {
                report.limit = Some((Axis::X, word));
            }
        }

        // ── Y axis ────────────────────────────────────────────────
        if let Some(word) = status.y_telemetry(generation).fault_word() {
            report.y = self.eval_fault(Axis::Y, word);
            if report.limit.is_none() && AxisFault::from_bits_truncate(word).on_limit() {
                report.limit = Some((Axis::Y, word));
            }
        }

        report
    }

    /// True while any axis reports a nonzero fault word.
    pub fn hardware_error(&self) -> bool {
        self.latches.x.is_active() || self.latches.y.is_active()
    }

    pub fn latch(&self, axis: Axis) -> &ErrorLatch {
        self.latches.get(axis)
    }

    /// Forget all faults, after the controller errors were reset.
    pub fn clear(&mut self) {
        self.latches = Axes::default();
    }

    // ── Internal ──────────────────────────────────────────────────

    fn eval_fault(&mut self, axis: Axis, word: u16) -> Option<LatchTransition> {
        let transition = self.latches.get_mut(axis).update(word);
        match transition {
            Some(LatchTransition::Raised(w)) => {
                error!("{axis} axis error: {}", describe_errors(w));
            }
            Some(LatchTransition::Cleared) => {
                info!("{axis} axis errors cleared");
            }
            None => {}
        }
        transition
    }
}
