//! Axis status frame (reply to `XS` and to every motion request).
//!
//! ```text
//!  0      address
//!  1..17  x_pos y_pos x_enc y_enc        i32 LE
//! 17..21  keypad x_bit y_bit extra_bits  u8
//! 21..25  ain_1 ain_2                    u16 LE
//! 25..29  mclock                         u32 LE
//! 29 30   temperature y_worm_phase       u8
//! 31..39  x_last y_last                  [u8; 4]
//! 39..41  checksum                       u16 LE, invert_high
//! ```

use super::checksum::verify_trailing;
use super::field;
use crate::error::ProtocolError;
use crate::link::ControllerGeneration;

pub const AXIS_STATUS_FRAME_LEN: usize = 41;

/// Extra-bits flag: X axis is in manual mode.
pub const EXTRA_MANUAL_X: u8 = 0x02;
/// Extra-bits flag: Y axis is in manual mode.
pub const EXTRA_MANUAL_Y: u8 = 0x20;

/// Decoded status frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisStatus {
    pub address: u8,
    /// X (Alt/Dec) motor position.
    pub x_pos: i32,
    /// Y (Az/RA) motor position.
    pub y_pos: i32,
    pub x_enc: i32,
    pub y_enc: i32,
    pub keypad: u8,
    pub x_bit: u8,
    pub y_bit: u8,
    pub extra_bits: u8,
    pub ain_1: u16,
    pub ain_2: u16,
    /// Millisecond board clock.
    pub mclock: u32,
    pub temperature: i8,
    pub y_worm_phase: u8,
    pub x_last: [u8; 4],
    pub y_last: [u8; 4],
}

/// Decode and checksum-verify a status frame.
pub fn decode_axis_status(frame: &[u8; AXIS_STATUS_FRAME_LEN]) -> Result<AxisStatus, ProtocolError> {
    verify_trailing(frame, true).map_err(|(transmitted, computed)| {
        ProtocolError::ChecksumMismatch {
            transmitted,
            computed,
        }
    })?;

    Ok(AxisStatus {
        address: frame[0],
        x_pos: field::i32_le(frame, 1),
        y_pos: field::i32_le(frame, 5),
        x_enc: field::i32_le(frame, 9),
        y_enc: field::i32_le(frame, 13),
        keypad: frame[17],
        x_bit: frame[18],
        y_bit: frame[19],
        extra_bits: frame[20],
        ain_1: field::u16_le(frame, 21),
        ain_2: field::u16_le(frame, 23),
        mclock: field::u32_le(frame, 25),
        temperature: frame[29] as i8,
        y_worm_phase: frame[30],
        x_last: field::bytes4(frame, 31),
        y_last: field::bytes4(frame, 35),
    })
}

impl AxisStatus {
    /// Encode back into wire form, checksum included.
    pub fn encode(&self) -> [u8; AXIS_STATUS_FRAME_LEN] {
        let mut frame = [0u8; AXIS_STATUS_FRAME_LEN];
        frame[0] = self.address;
        frame[1..5].copy_from_slice(&self.x_pos.to_le_bytes());
        frame[5..9].copy_from_slice(&self.y_pos.to_le_bytes());
        frame[9..13].copy_from_slice(&self.x_enc.to_le_bytes());
        frame[13..17].copy_from_slice(&self.y_enc.to_le_bytes());
        frame[17] = self.keypad;
        frame[18] = self.x_bit;
        frame[19] = self.y_bit;
        frame[20] = self.extra_bits;
        frame[21..23].copy_from_slice(&self.ain_1.to_le_bytes());
        frame[23..25].copy_from_slice(&self.ain_2.to_le_bytes());
        frame[25..29].copy_from_slice(&self.mclock.to_le_bytes());
        frame[29] = self.temperature as u8;
        frame[30] = self.y_worm_phase;
        frame[31..35].copy_from_slice(&self.x_last);
        frame[35..39].copy_from_slice(&self.y_last);
        super::checksum::seal(&mut frame, true);
        frame
    }

    /// X axis runs in auto (servo) mode.
    pub fn x_auto(&self) -> bool {
        self.extra_bits & EXTRA_MANUAL_X == 0
    }

    /// Y axis runs in auto (servo) mode.
    pub fn y_auto(&self) -> bool {
        self.extra_bits & EXTRA_MANUAL_Y == 0
    }

    pub fn x_telemetry(&self, generation: &ControllerGeneration) -> AxisTelemetry {
        AxisTelemetry::decode(&self.x_last, generation)
    }

    pub fn y_telemetry(&self, generation: &ControllerGeneration) -> AxisTelemetry {
        AxisTelemetry::decode(&self.y_last, generation)
    }
}

/// Meaning of an axis "last" field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisTelemetry {
    /// Servo generations: motor location at the last scope encoder change.
    MotorLocation(i32),
    /// Force One: multiplexed reading plus positional error.
    ForceOne {
        reading: LastReading,
        position_error: i16,
    },
}

/// Multiplexed Force One reading; the low nibble of byte 0 selects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastReading {
    Errors(u16),
    Current(u16),
    SupplyVoltage(u16),
    CpuTemperature(u16),
    PidOutput(u16),
    Unknown { kind: u8, value: u16 },
}

impl AxisTelemetry {
    fn decode(last: &[u8; 4], generation: &ControllerGeneration) -> Self {
        if !generation.reports_faults() {
            return Self::MotorLocation(i32::from_le_bytes(*last));
        }

        let kind = last[0] & 0x0F;
        let value = (u16::from(last[0] >> 4) << 8) | u16::from(last[1]);
        let reading = match kind {
            0 => LastReading::Errors(value),
            1 => LastReading::Current(value),
            2 => LastReading::SupplyVoltage(value),
            3 => LastReading::CpuTemperature(value),
            4 => LastReading::PidOutput(value),
            kind => LastReading::Unknown { kind, value },
        };
        Self::ForceOne {
            reading,
            position_error: field::i16_le(last, 2),
        }
    }

    /// Fault word, when this sample carries one.
    pub fn fault_word(&self) -> Option<u16> {
        match self {
            Self::ForceOne {
                reading: LastReading::Errors(word),
                ..
            } => Some(*word),
            _ => None,
        }
    }
}
