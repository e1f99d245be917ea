//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured mount events through
//! the `log` facade.  A telemetry or remote-control adapter would
//! implement the same trait.

use log::{debug, error, info, warn};

use crate::app::events::MountEvent;
use crate::app::ports::EventSink;
use crate::protocol::describe_errors;

/// Adapter that logs every [`MountEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &MountEvent) {
        match event {
            MountEvent::Telemetry(t) => {
                debug!(
                    "TELEM | pos={}/{} | target={}/{} | speed={:.1}/{:.1} | \
                     err={:.1}/{:.1} | look={:.1}s | dist={:.5}\u{00b0}",
                    t.position.x,
                    t.position.y,
                    t.target.x,
                    t.target.y,
                    t.speed.x,
                    t.speed.y,
                    t.error.x,
                    t.error.y,
                    t.look_ahead,
                    t.target_distance,
                );
            }
            MountEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            MountEvent::FaultRaised { axis, word } => {
                error!("FAULT | {axis} {word:#05x}: {}", describe_errors(*word));
            }
            MountEvent::FaultCleared { axis } => {
                info!("FAULT | {axis} cleared");
            }
            MountEvent::OscillationEngaged { axis, speed } => {
                warn!("OSC   | {axis} engaged at {speed:.1}");
            }
            MountEvent::OscillationReleased { axis } => {
                info!("OSC   | {axis} released");
            }
            MountEvent::LookAheadChanged(secs) => {
                info!("LOOK  | {secs:.1}s");
            }
            MountEvent::SoftStopTruncated { from, to } => {
                info!("SOFT  | truncated {}/{} -> {}/{}", from.x, from.y, to.x, to.y);
            }
            MountEvent::TrackingAborted(e) => {
                error!("ABORT | {e}");
            }
            MountEvent::SlewTimedOut => {
                error!("SLEW  | timed out");
            }
            MountEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
        }
    }
}
