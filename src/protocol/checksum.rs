//! Checksums used on the Sitech serial line.
//!
//! ASCII commands sent while the controller is in binary mode carry a
//! single trailing byte: the ones' complement of the byte sum.  Binary
//! frames carry a 16-bit additive sum, stored little-endian, with the
//! high byte optionally inverted.

/// Ones' complement of the byte sum modulo 256.
pub fn checksum8(data: &[u8]) -> u8 {
    !data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// 16-bit additive sum of `data`, high byte XORed with `0xFF` when
/// `invert_high` is set.
///
/// `data` must be the payload only, without the checksum field itself.
pub fn checksum16(data: &[u8], invert_high: bool) -> u16 {
    let sum = data
        .iter()
        .fold(0u16, |acc, b| acc.wrapping_add(u16::from(*b)));
    if invert_high { sum ^ 0xFF00 } else { sum }
}

/// Verify a frame whose last two bytes are its little-endian checksum.
///
/// Returns `(transmitted, computed)` on mismatch.
pub fn verify_trailing(frame: &[u8], invert_high: bool) -> Result<(), (u16, u16)> {
    if frame.len() < 2 {
        return Err((0, 0));
    }
    let end = frame.len() - 2;
    let transmitted = u16::from_le_bytes([frame[end], frame[end + 1]]);
    let computed = checksum16(&frame[..end], invert_high);
    if transmitted == computed {
        Ok(())
    } else {
        Err((transmitted, computed))
    }
}

/// Overwrite the last two bytes of `frame` with its checksum.
pub fn seal(frame: &mut [u8], invert_high: bool) {
    let end = frame.len() - 2;
    let sum = checksum16(&frame[..end], invert_high);
    frame[end..].copy_from_slice(&sum.to_le_bytes());
}
