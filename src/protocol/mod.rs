//! Sitech wire protocol: pure encode/decode, no I/O.
//!
//! Two framings share one serial line:
//!
//! ```text
//!  ASCII command     <axis><TEXT><CR>[checksum8]     checksum only in binary mode
//!  axis status       41 bytes   ... [checksum16 LE]  invert_high = true
//!  configuration    130 bytes   ... [checksum16 LE]  invert_high = false
//!  X request         21 bytes   ... [checksum16 LE]  invert_high = true
//!  Y request         34 bytes   ... [checksum16 LE]  invert_high = true
//! ```

pub mod checksum;
pub mod command;
pub mod configuration;
pub mod faults;
pub mod request;
pub mod status;

use core::fmt;

use serde::{Deserialize, Serialize};

pub use checksum::{checksum8, checksum16};
pub use command::{CommandFrame, encode_command, encode_prefixed, parse_reply_value};
pub use configuration::{CONFIGURATION_FRAME_LEN, ControllerConfiguration, decode_configuration};
pub use faults::{AxisFault, decode_errors, describe_errors};
pub use request::{MotionRequest, XAxisRequest, YAxisRequest};
pub use status::{AXIS_STATUS_FRAME_LEN, AxisStatus, AxisTelemetry, LastReading, decode_axis_status};

/// Motor axis addressed by a command.
///
/// X drives altitude (or declination), Y drives azimuth (or right ascension).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub const BOTH: [Axis; 2] = [Axis::X, Axis::Y];

    /// Address byte prefixed to every command.
    pub const fn prefix(self) -> u8 {
        match self {
            Self::X => b'X',
            Self::Y => b'Y',
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => write!(f, "X"),
            Self::Y => write!(f, "Y"),
        }
    }
}

/// Framing currently active on the serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingMode {
    /// Plain `<CR>` terminated commands.
    Ascii,
    /// Every command carries a trailing checksum byte; replies may be binary.
    Binary,
}

/// A value per motor axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Axes<T> {
    pub x: T,
    pub y: T,
}

impl<T> Axes<T> {
    pub const fn new(x: T, y: T) -> Self {
        Self { x, y }
    }

    pub fn get(&self, axis: Axis) -> &T {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
        }
    }

    pub fn get_mut(&mut self, axis: Axis) -> &mut T {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Axes<U> {
        Axes {
            x: f(self.x),
            y: f(self.y),
        }
    }
}

/// Bounds-checked little-endian / big-endian field readers over a frame.
///
/// All offsets are compile-time constants of fixed-length frames; the
/// slice conversions can only fail if a caller passes a truncated frame,
/// which the decoders rule out by taking `&[u8; N]`.
pub(crate) mod field {
    pub fn u16_le(buf: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([buf[at], buf[at + 1]])
    }

    pub fn i16_le(buf: &[u8], at: usize) -> i16 {
        i16::from_le_bytes([buf[at], buf[at + 1]])
    }

    pub fn i16_be(buf: &[u8], at: usize) -> i16 {
        i16::from_be_bytes([buf[at], buf[at + 1]])
    }

    pub fn u32_le(buf: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
    }

    pub fn i32_le(buf: &[u8], at: usize) -> i32 {
        i32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
    }

    pub fn i32_be(buf: &[u8], at: usize) -> i32 {
        i32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
    }

    pub fn bytes4(buf: &[u8], at: usize) -> [u8; 4] {
        [buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]
    }
}
