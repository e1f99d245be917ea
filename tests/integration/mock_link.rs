//! Fake Sitech controller behind the `Transport` trait.
//!
//! Decodes every command the link writes, answers status queries and
//! motion requests with real status frames, and moves the axes to the
//! requested destination once a request was acknowledged.  Tests inspect
//! the full command history and raw byte count afterwards.

use std::collections::VecDeque;

use sitech::TransportError;
use sitech::link::Transport;
use sitech::protocol::checksum::seal;
use sitech::protocol::{AXIS_STATUS_FRAME_LEN, Axes, AxisStatus, XAxisRequest, decode_axis_status};

/// One decoded command line, e.g. `XS` sent to `X`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub axis: char,
    pub text: String,
}

#[allow(dead_code)]
pub struct FakeController {
    pub position: Axes<i32>,
    /// Fault words reported in the "last" fields (Force One layout).
    pub faults: Axes<u16>,
    /// Never answer anything.
    pub silent: bool,

    pub written: Vec<u8>,
    pub commands: Vec<Command>,
    pub requests: Vec<XAxisRequest>,
    pub stops: usize,
    pub error_resets: usize,
    pub flushes: usize,

    replies: VecDeque<Vec<u8>>,
    expect_request: bool,
}

#[allow(dead_code)]
impl FakeController {
    pub fn at(x: i32, y: i32) -> Self {
        Self {
            position: Axes::new(x, y),
            faults: Axes::default(),
            silent: false,
            written: Vec::new(),
            commands: Vec::new(),
            requests: Vec::new(),
            stops: 0,
            error_resets: 0,
            flushes: 0,
            replies: VecDeque::new(),
            expect_request: false,
        }
    }

    /// Queue an arbitrary reply (ASCII lines, corrupted frames).
    pub fn push_reply(&mut self, bytes: &[u8]) {
        self.replies.push_back(bytes.to_vec());
    }

    pub fn command_texts(&self) -> Vec<String> {
        self.commands
            .iter()
            .map(|c| format!("{}{}", c.axis, c.text))
            .collect()
    }

    /// Forget the history, keep the axis state.
    pub fn clear_history(&mut self) {
        self.written.clear();
        self.commands.clear();
        self.requests.clear();
        self.stops = 0;
    }

    pub fn status(&self) -> AxisStatus {
        let mut frame = [0u8; AXIS_STATUS_FRAME_LEN];
        seal(&mut frame, true);
        let mut status = decode_axis_status(&frame).expect("zero frame decodes");
        status.x_pos = self.position.x;
        status.y_pos = self.position.y;
        status.x_enc = self.position.x;
        status.y_enc = self.position.y;
        status.x_last = fault_last(self.faults.x);
        status.y_last = fault_last(self.faults.y);
        status
    }

    fn handle_command(&mut self, data: &[u8]) {
        let end = data.iter().position(|&b| b == b'\r').unwrap_or(data.len());
        let cmd = Command {
            axis: char::from(data[0]),
            text: String::from_utf8_lossy(&data[1..end]).into_owned(),
        };
        match (cmd.axis, cmd.text.as_str()) {
            ('X', "XS") => self.replies.push_back(self.status().encode().to_vec()),
            ('Y', "XS") => {
                self.error_resets += 1;
                self.faults = Axes::default();
            }
            (_, "XR") => self.expect_request = true,
            (_, "N") => self.stops += 1,
            _ => {}
        }
        self.commands.push(cmd);
    }

    fn handle_request(&mut self, data: &[u8]) {
        let i32_at = |at: usize| i32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
        let u32_at = |at: usize| u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
        let request = XAxisRequest {
            x_dest: i32_at(0),
            x_speed: u32_at(4),
            y_dest: i32_at(8),
            y_speed: u32_at(12),
            x_bits: data[17],
            y_bits: data[18],
        };
        self.requests.push(request);
        // Acknowledge with the position before the move starts.
        self.replies.push_back(self.status().encode().to_vec());
        self.position = Axes::new(request.x_dest, request.y_dest);
    }
}

fn fault_last(word: u16) -> [u8; 4] {
    [((word >> 8) as u8) << 4, word as u8, 0, 0]
}

impl Transport for FakeController {
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        self.written.extend_from_slice(data);
        if self.silent {
            return Ok(data.len());
        }
        if self.expect_request {
            self.expect_request = false;
            self.handle_request(data);
        } else if !data.is_empty() {
            self.handle_command(data);
        }
        Ok(data.len())
    }

    fn read(
        &mut self,
        buf: &mut [u8],
        _min_len: usize,
        _terminator: Option<u8>,
    ) -> Result<usize, TransportError> {
        let reply = self.replies.pop_front().ok_or(TransportError::Timeout)?;
        let n = reply.len().min(buf.len());
        buf[..n].copy_from_slice(&reply[..n]);
        Ok(n)
    }

    fn flush_input(&mut self) -> Result<(), TransportError> {
        self.flushes += 1;
        self.replies.clear();
        Ok(())
    }
}
