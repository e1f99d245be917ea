//! Dual-axis motion requests (`XXR` / `YXR`).
//!
//! Both variants carry destination and speed for both axes; the wide Y
//! variant adds rate adders, the narrow X variant carries the axis bit
//! bytes instead.  Speeds are magnitudes: direction follows from the sign
//! of `dest - position`.

use heapless::Vec;

use super::Axis;
use super::checksum::{seal, verify_trailing};

pub const X_REQUEST_LEN: usize = 21;
pub const Y_REQUEST_LEN: usize = 34;

/// Bit in `x_bits` telling the controller the request is a tracking update.
pub const XBIT_TRACKING: u8 = 1 << 4;

/// Narrow request, sent with `XXR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XAxisRequest {
    pub x_dest: i32,
    pub x_speed: u32,
    pub y_dest: i32,
    pub y_speed: u32,
    pub x_bits: u8,
    pub y_bits: u8,
}

/// Wide request, sent with `YXR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct YAxisRequest {
    pub x_dest: i32,
    pub x_speed: u32,
    pub y_dest: i32,
    pub y_speed: u32,
    pub x_rate_adder: i32,
    pub y_rate_adder: i32,
    /// Rate adder duration in servo loops.
    pub x_rate_adder_t: u32,
    pub y_rate_adder_t: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionRequest {
    X(XAxisRequest),
    Y(YAxisRequest),
}

/// Encoded request frame.
pub type RequestFrame = Vec<u8, Y_REQUEST_LEN>;

impl XAxisRequest {
    pub fn encode(&self) -> [u8; X_REQUEST_LEN] {
        let mut data = [0u8; X_REQUEST_LEN];
        data[0..4].copy_from_slice(&self.x_dest.to_le_bytes());
        data[4..8].copy_from_slice(&self.x_speed.to_le_bytes());
        data[8..12].copy_from_slice(&self.y_dest.to_le_bytes());
        data[12..16].copy_from_slice(&self.y_speed.to_le_bytes());
        // Bits-present marker; the controller expects it always set.
        data[16] = 1;
        data[17] = self.x_bits;
        data[18] = self.y_bits;
        seal(&mut data, true);
        data
    }
}

impl YAxisRequest {
    pub fn encode(&self) -> [u8; Y_REQUEST_LEN] {
        let mut data = [0u8; Y_REQUEST_LEN];
        data[0..4].copy_from_slice(&self.x_dest.to_le_bytes());
        data[4..8].copy_from_slice(&self.x_speed.to_le_bytes());
        data[8..12].copy_from_slice(&self.y_dest.to_le_bytes());
        data[12..16].copy_from_slice(&self.y_speed.to_le_bytes());
        data[16..20].copy_from_slice(&self.x_rate_adder.to_le_bytes());
        data[20..24].copy_from_slice(&self.y_rate_adder.to_le_bytes());
        data[24..28].copy_from_slice(&self.x_rate_adder_t.to_le_bytes());
        data[28..32].copy_from_slice(&self.y_rate_adder_t.to_le_bytes());
        seal(&mut data, true);
        data
    }
}

impl MotionRequest {
    /// Axis whose `XR` command announces this request.
    pub fn command_axis(&self) -> Axis {
        match self {
            Self::X(_) => Axis::X,
            Self::Y(_) => Axis::Y,
        }
    }

    pub fn destination(&self) -> (i32, i32) {
        match self {
            Self::X(r) => (r.x_dest, r.y_dest),
            Self::Y(r) => (r.x_dest, r.y_dest),
        }
    }

    pub fn encode(&self) -> RequestFrame {
        // Both fixed arrays fit the Y capacity.
        match self {
            Self::X(r) => Vec::from_slice(&r.encode()).unwrap_or_default(),
            Self::Y(r) => Vec::from_slice(&r.encode()).unwrap_or_default(),
        }
    }
}

impl From<XAxisRequest> for MotionRequest {
    fn from(r: XAxisRequest) -> Self {
        Self::X(r)
    }
}

impl From<YAxisRequest> for MotionRequest {
    fn from(r: YAxisRequest) -> Self {
        Self::Y(r)
    }
}

/// True when the trailing checksum of an encoded request is valid.
pub fn request_checksum_valid(frame: &[u8]) -> bool {
    verify_trailing(frame, true).is_ok()
}
