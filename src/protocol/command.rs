//! ASCII command framing and numeric reply parsing.
//!
//! Wire format:
//! ```text
//! ┌──────┬──────────────┬────┬─────────────────────────┐
//! │ axis │ command text │ CR │ checksum8 (binary only) │
//! └──────┴──────────────┴────┴─────────────────────────┘
//! ```

use heapless::Vec;

use super::checksum::checksum8;
use super::{Axis, FramingMode};
use crate::error::ProtocolError;

/// Longest command frame, including axis, CR and checksum.
pub const MAX_COMMAND_LEN: usize = 48;

/// An encoded command, ready to be written to the transport.
pub type CommandFrame = Vec<u8, MAX_COMMAND_LEN>;

/// Frame `text` for `axis`.  In binary mode the checksum of the whole
/// `<axis><text><CR>` sequence is appended.
pub fn encode_command(
    axis: Axis,
    text: &str,
    mode: FramingMode,
) -> Result<CommandFrame, ProtocolError> {
    encode_prefixed(axis.prefix(), text, mode)
}

/// Like [`encode_command`], for the few commands addressed to something
/// other than an axis (`S` selects the flash store).
pub fn encode_prefixed(
    prefix: u8,
    text: &str,
    mode: FramingMode,
) -> Result<CommandFrame, ProtocolError> {
    let mut frame = CommandFrame::new();
    frame
        .push(prefix)
        .map_err(|_| ProtocolError::CommandTooLong)?;
    frame
        .extend_from_slice(text.as_bytes())
        .map_err(|_| ProtocolError::CommandTooLong)?;
    frame
        .push(b'\r')
        .map_err(|_| ProtocolError::CommandTooLong)?;

    if mode == FramingMode::Binary {
        let sum = checksum8(&frame);
        frame.push(sum).map_err(|_| ProtocolError::CommandTooLong)?;
    }

    Ok(frame)
}

/// Parse a line reply such as `X1234\r\n`.
///
/// The first byte echoes the axis and is skipped; the value is the
/// leading (optionally signed) decimal number that follows.  Returns
/// `None` when no digits are present.
pub fn parse_reply_value(reply: &[u8]) -> Option<i64> {
    let body = reply.get(1..)?;
    let start = body.iter().take_while(|b| b.is_ascii_whitespace()).count();
    let body = &body[start..];

    let sign = usize::from(matches!(body.first(), Some(b'-' | b'+')));
    let digits = body[sign..].iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    // Sign and digits are ASCII, so this slice is valid UTF-8.
    core::str::from_utf8(&body[..sign + digits]).ok()?.parse().ok()
}
