//! PID gain readout and controller flash persistence.
//!
//! Gains are read and written through the ASCII channel (`PPP`, `III`,
//! `DDD`).  The flash image is a binary dump requested with `SC`; its size
//! depends on the controller generation.  Nothing here runs from the
//! tracking loop, only on operator request or at startup.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::{SitechLink, Transport};
use crate::error::{LinkError, ProtocolError};
use crate::protocol::checksum::verify_trailing;
use crate::protocol::{Axis, Axes};

/// Flash image size of Servo I/II controllers.
pub const SERVO_FLASH_LEN: usize = 130;
/// Flash image size of Force One controllers.
pub const FORCE_ONE_FLASH_LEN: usize = 514;

/// Servo gain triple as stored by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServoGains {
    pub p: i64,
    pub i: i64,
    pub d: i64,
}

/// Tracking gains and limits of one axis, read from a Force One image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashAxisGains {
    pub gains: ServoGains,
    pub output_limit: i16,
    pub current_limit: i16,
    pub integral_limit: i16,
}

/// Raw flash dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashImage {
    bytes: Vec<u8>,
}

impl FlashImage {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn int16(&self, at: usize) -> Option<i16> {
        let b = self.bytes.get(at..at + 2)?;
        Some(i16::from_le_bytes([b[0], b[1]]))
    }

    pub fn int32(&self, at: usize) -> Option<i32> {
        let b = self.bytes.get(at..at + 4)?;
        Some(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Tracking gains of `axis`.  Only Force One images carry them at
    /// fixed offsets; X is the secondary axis block at 0, Y the primary
    /// block at 100.
    pub fn axis_gains(&self, axis: Axis) -> Option<FlashAxisGains> {
        if self.bytes.len() != FORCE_ONE_FLASH_LEN {
            return None;
        }
        let base = match axis {
            Axis::X => 0,
            Axis::Y => 100,
        };
        Some(FlashAxisGains {
            gains: ServoGains {
                p: i64::from(self.int16(base + 12)?),
                i: i64::from(self.int16(base + 14)?),
                d: i64::from(self.int16(base + 16)?),
            },
            output_limit: self.int16(base + 18)?,
            current_limit: self.int16(base + 20)?,
            integral_limit: self.int16(base + 24)?,
        })
    }
}

/// Verify a flash dump read from the controller.
pub fn decode_flash_image(bytes: &[u8]) -> Result<FlashImage, ProtocolError> {
    verify_trailing(bytes, true).map_err(|(transmitted, computed)| {
        ProtocolError::ChecksumMismatch {
            transmitted,
            computed,
        }
    })?;
    Ok(FlashImage {
        bytes: bytes.to_vec(),
    })
}

impl<T: Transport> SitechLink<T> {
    pub fn get_pid_gains(&mut self, axis: Axis) -> Result<ServoGains, LinkError> {
        Ok(ServoGains {
            p: self.query_value(axis, "PPP")?,
            i: self.query_value(axis, "III")?,
            d: self.query_value(axis, "DDD")?,
        })
    }

    pub fn get_all_pid_gains(&mut self) -> Result<Axes<ServoGains>, LinkError> {
        Ok(Axes::new(
            self.get_pid_gains(Axis::X)?,
            self.get_pid_gains(Axis::Y)?,
        ))
    }

    /// Set the operating gains of `axis`.  They are lost on power cycle
    /// unless followed by [`flash_save`](Self::flash_save).
    pub fn set_pid_gains(&mut self, axis: Axis, gains: ServoGains) -> Result<(), LinkError> {
        self.set_value(axis, "PPP", gains.p)?;
        self.set_value(axis, "III", gains.i)?;
        self.set_value(axis, "DDD", gains.d)?;
        info!(
            "{axis} axis gains set to P {} I {} D {}",
            gains.p, gains.i, gains.d
        );
        Ok(())
    }

    /// Read the flash image.
    pub fn flash_load(&mut self) -> Result<FlashImage, LinkError> {
        let len = if self.generation().reports_faults() {
            FORCE_ONE_FLASH_LEN
        } else {
            SERVO_FLASH_LEN
        };
        self.switch_to_binary()?;
        self.send_prefixed(b'S', "C")?;

        let mut buf = vec![0u8; len];
        self.read_exact_frame(&mut buf)?;
        decode_flash_image(&buf).map_err(|e| {
            warn!("flash image rejected: {e}");
            self.discard_input();
            LinkError::Protocol(e)
        })
    }

    /// Persist the operating parameters of both axes to flash.
    pub fn flash_save(&mut self) -> Result<(), LinkError> {
        info!("saving controller parameters to flash");
        self.send_axis_command(Axis::Y, "XW")
    }

    /// Restore the factory default parameters.
    pub fn flash_default(&mut self) -> Result<(), LinkError> {
        warn!("restoring controller factory defaults");
        self.send_axis_command(Axis::Y, "XD")
    }
}
