//! Controller configuration frame (reply to `YXC`).
//!
//! 130 bytes: 128 bytes of settings followed by a little-endian checksum
//! computed without high-byte inversion.  Numeric fields are little-endian
//! except the latitude and the four ticks-per-revolution fields, which the
//! firmware stores most significant byte first.

use super::checksum::verify_trailing;
use super::field;
use crate::error::ProtocolError;

pub const CONFIGURATION_FRAME_LEN: usize = 130;

/// Servo parameters of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisConfiguration {
    pub acceleration: i32,
    pub backlash: i32,
    pub error_limit: i16,
    pub p_gain: i16,
    pub i_gain: i16,
    pub d_gain: i16,
    pub output_limit: i16,
    pub current_limit: i16,
    pub integral_limit: i16,
    pub bits: u8,
    /// Scope encoder ticks per axis revolution.
    pub encoder_ticks: i32,
    /// Motor encoder ticks per axis revolution.
    pub motor_ticks: i32,
    pub slew_rate: i32,
    pub pan_rate: i32,
    pub guide_rate: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerConfiguration {
    pub x: AxisConfiguration,
    pub y: AxisConfiguration,
    pub address: u8,
    pub equatorial_rate: i32,
    pub equatorial_up_down: i32,
    pub tracking_goal: i32,
    /// Latitude in hundredths of a degree.
    pub latitude: i16,
    pub pec_auto: u8,
    pub local_search_distance: i32,
    pub backlash_speed: i32,
    pub pec_ticks: i32,
    pub pec_ratio: i16,
}

impl ControllerConfiguration {
    pub fn latitude_degrees(&self) -> f64 {
        f64::from(self.latitude) / 100.0
    }
}

mod offset {
    pub const X_BLOCK: usize = 0;
    pub const Y_BLOCK: usize = 24;
    pub const ADDRESS: usize = 48;
    pub const EQ_RATE: usize = 50;
    pub const EQ_UP_DOWN: usize = 54;
    pub const TRACKING_GOAL: usize = 58;
    pub const LATITUDE: usize = 62;
    pub const Y_ENC_TICKS: usize = 64;
    pub const X_ENC_TICKS: usize = 68;
    pub const Y_MOT_TICKS: usize = 72;
    pub const X_MOT_TICKS: usize = 76;
    pub const X_SLEW: usize = 80;
    pub const Y_SLEW: usize = 84;
    pub const X_PAN: usize = 88;
    pub const Y_PAN: usize = 92;
    pub const X_GUIDE: usize = 96;
    pub const Y_GUIDE: usize = 100;
    pub const PEC_AUTO: usize = 104;
    pub const LOCAL_SEARCH: usize = 108;
    pub const BACKLASH_SPEED: usize = 112;
    pub const PEC_TICKS: usize = 116;
    pub const PEC_RATIO: usize = 120;
}

/// Decode and checksum-verify a configuration frame.
pub fn decode_configuration(
    frame: &[u8; CONFIGURATION_FRAME_LEN],
) -> Result<ControllerConfiguration, ProtocolError> {
    verify_trailing(frame, false).map_err(|(transmitted, computed)| {
        ProtocolError::ChecksumMismatch {
            transmitted,
            computed,
        }
    })?;

    let mut x = decode_axis_block(frame, offset::X_BLOCK);
    x.encoder_ticks = field::i32_be(frame, offset::X_ENC_TICKS);
    x.motor_ticks = field::i32_be(frame, offset::X_MOT_TICKS);
    x.slew_rate = field::i32_le(frame, offset::X_SLEW);
    x.pan_rate = field::i32_le(frame, offset::X_PAN);
    x.guide_rate = field::i32_le(frame, offset::X_GUIDE);

    let mut y = decode_axis_block(frame, offset::Y_BLOCK);
    y.encoder_ticks = field::i32_be(frame, offset::Y_ENC_TICKS);
    y.motor_ticks = field::i32_be(frame, offset::Y_MOT_TICKS);
    y.slew_rate = field::i32_le(frame, offset::Y_SLEW);
    y.pan_rate = field::i32_le(frame, offset::Y_PAN);
    y.guide_rate = field::i32_le(frame, offset::Y_GUIDE);

    Ok(ControllerConfiguration {
        x,
        y,
        address: frame[offset::ADDRESS],
        equatorial_rate: field::i32_le(frame, offset::EQ_RATE),
        equatorial_up_down: field::i32_le(frame, offset::EQ_UP_DOWN),
        tracking_goal: field::i32_le(frame, offset::TRACKING_GOAL),
        latitude: field::i16_be(frame, offset::LATITUDE),
        pec_auto: frame[offset::PEC_AUTO],
        local_search_distance: field::i32_le(frame, offset::LOCAL_SEARCH),
        backlash_speed: field::i32_le(frame, offset::BACKLASH_SPEED),
        pec_ticks: field::i32_le(frame, offset::PEC_TICKS),
        pec_ratio: field::i16_le(frame, offset::PEC_RATIO),
    })
}

/// The 24-byte servo block shared by both axes.
fn decode_axis_block(frame: &[u8], at: usize) -> AxisConfiguration {
    AxisConfiguration {
        acceleration: field::i32_le(frame, at),
        backlash: field::i32_le(frame, at + 4),
        error_limit: field::i16_le(frame, at + 8),
        p_gain: field::i16_le(frame, at + 10),
        i_gain: field::i16_le(frame, at + 12),
        d_gain: field::i16_le(frame, at + 14),
        output_limit: field::i16_le(frame, at + 16),
        current_limit: field::i16_le(frame, at + 18),
        integral_limit: field::i16_le(frame, at + 20),
        bits: frame[at + 22],
        ..AxisConfiguration::default()
    }
}
