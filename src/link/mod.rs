//! Stateful session with one Sitech controller over a serial transport.
//!
//! The link owns the transport exclusively.  Exactly one request/reply pair
//! is in flight at a time; every binary read that comes back short or
//! corrupted flushes the transport input before the error is returned, so
//! stale bytes are never taken for the start of the next frame.
//!
//! No retries happen here.  The caller decides between retry, reconnect
//! and escalation.

pub mod flash;
pub mod framelog;
pub mod generation;
pub mod transport;

use log::{debug, info, trace, warn};

use crate::error::{LinkError, ProtocolError};
use crate::protocol::{
    AXIS_STATUS_FRAME_LEN, AxisStatus, Axis, CONFIGURATION_FRAME_LEN, ControllerConfiguration,
    FramingMode, MotionRequest, decode_axis_status, decode_configuration, encode_command,
    encode_prefixed, parse_reply_value,
};

pub use flash::{FlashImage, ServoGains};
pub use framelog::{FrameKind, FrameLog};
pub use generation::{ControllerGeneration, GenerationKind};
pub use transport::{NullTransport, Transport};

/// Longest ASCII reply line accepted.
const REPLY_BUF_LEN: usize = 100;

/// Scalar readings of one axis, queried over the ASCII channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisInfo {
    /// Acceleration in controller units.
    pub acceleration: i64,
    /// Maximum speed in controller units.
    pub max_speed: i64,
    /// Motor current in amps.
    pub current: f64,
    /// Motor PWM output.
    pub pwm: i64,
}

pub struct SitechLink<T: Transport> {
    transport: T,
    mode: FramingMode,
    generation: ControllerGeneration,
    version: i64,
    frame_log: Option<FrameLog>,
}

impl<T: Transport> SitechLink<T> {
    /// Wrap `transport`.  Nothing is sent until [`init`](Self::init).
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            mode: FramingMode::Ascii,
            generation: ControllerGeneration::ServoII,
            version: 0,
            frame_log: None,
        }
    }

    // ── Session setup ──────────────────────────────────────────

    /// Probe the framing mode, read the firmware version and work out the
    /// controller generation.
    ///
    /// `kind` overrides the generation implied by the version (Servo I
    /// boards cannot be told apart from Servo II ones otherwise).
    pub fn init(&mut self, kind: Option<GenerationKind>) -> Result<(), LinkError> {
        // A binary-mode controller only answers the probe when it carries
        // a checksum.
        self.mode = FramingMode::Binary;
        self.mode = match self.query_value(Axis::Y, "XY") {
            Ok(0) => FramingMode::Binary,
            Ok(_) | Err(_) => {
                self.discard_input();
                FramingMode::Ascii
            }
        };
        info!("controller link in {:?} mode", self.mode);

        self.version = match self.query_value(Axis::X, "V") {
            Ok(v) if v != 0 => v,
            Ok(_) | Err(LinkError::Timeout | LinkError::InvalidReply) => {
                warn!("controller did not answer the version query");
                return Err(LinkError::InitFailed);
            }
            Err(e) => return Err(e),
        };

        let kind = kind.unwrap_or(ControllerGeneration::kind_for_version(self.version));
        self.generation = match kind {
            GenerationKind::ServoI => ControllerGeneration::ServoI,
            GenerationKind::ServoII => ControllerGeneration::ServoII,
            GenerationKind::ForceOne => {
                let count_up = self.query_value(Axis::Y, "XHC")?;
                ControllerGeneration::force_one(count_up)
            }
        };
        info!(
            "Sidereal Technology controller version {:.1}, {:?}, servo rate {:.2} Hz",
            self.version as f64 / 10.0,
            self.generation.kind(),
            self.generation.servo_rate()
        );
        Ok(())
    }

    pub fn mode(&self) -> FramingMode {
        self.mode
    }

    pub fn generation(&self) -> ControllerGeneration {
        self.generation
    }

    pub fn set_generation(&mut self, generation: ControllerGeneration) {
        self.generation = generation;
    }

    /// Firmware version × 10, 0 before a successful init.
    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    // ── Frame log ──────────────────────────────────────────────

    pub fn start_frame_log(&mut self, log: FrameLog) {
        self.frame_log = Some(log);
    }

    pub fn stop_frame_log(&mut self) -> Option<FrameLog> {
        let mut log = self.frame_log.take()?;
        if let Err(e) = log.finish() {
            warn!("frame log flush failed: {e}");
        }
        Some(log)
    }

    fn log_frame(&mut self, kind: FrameKind, frame: &[u8]) {
        if let Some(log) = self.frame_log.as_mut() {
            if let Err(e) = log.record(kind, frame) {
                warn!("frame log write failed, logging stopped: {e}");
                self.frame_log = None;
            }
        }
    }

    // ── Framing mode ───────────────────────────────────────────

    /// Leave binary mode.  The command travels through the binary channel,
    /// so it carries a checksum.
    pub fn switch_to_ascii(&mut self) -> Result<(), LinkError> {
        if self.mode == FramingMode::Binary {
            let frame = encode_command(Axis::Y, "XY0", FramingMode::Binary)?;
            self.write_all(&frame)?;
        }
        self.mode = FramingMode::Ascii;
        Ok(())
    }

    pub fn switch_to_binary(&mut self) -> Result<(), LinkError> {
        if self.mode == FramingMode::Ascii {
            let frame = encode_command(Axis::Y, "XY1", FramingMode::Ascii)?;
            self.write_all(&frame)?;
        }
        self.mode = FramingMode::Binary;
        Ok(())
    }

    // ── ASCII commands ─────────────────────────────────────────

    pub fn send_axis_command(&mut self, axis: Axis, text: &str) -> Result<(), LinkError> {
        let frame = encode_command(axis, text, self.mode)?;
        trace!("-> {axis}{text}");
        self.write_all(&frame)
    }

    pub(crate) fn send_prefixed(&mut self, prefix: u8, text: &str) -> Result<(), LinkError> {
        let frame = encode_prefixed(prefix, text, self.mode)?;
        trace!("-> {}{text}", char::from(prefix));
        self.write_all(&frame)
    }

    /// Send `text` and parse the numeric value of the line reply.
    pub fn query_value(&mut self, axis: Axis, text: &str) -> Result<i64, LinkError> {
        self.send_axis_command(axis, text)?;

        let mut buf = [0u8; REPLY_BUF_LEN];
        let n = self.transport.read(&mut buf, REPLY_BUF_LEN, Some(b'\n'))?;
        trace!("<- {:?}", String::from_utf8_lossy(&buf[..n]));
        parse_reply_value(&buf[..n]).ok_or_else(|| {
            self.discard_input();
            LinkError::InvalidReply
        })
    }

    /// Set a named value, sent as `<name><value>`.
    pub fn set_value(&mut self, axis: Axis, name: &str, value: i64) -> Result<(), LinkError> {
        self.send_axis_command(axis, &format!("{name}{value}"))
    }

    /// Direct move of one axis, sent as `<target>S<speed>`.
    pub fn set_position(&mut self, axis: Axis, target: i32, speed: u32) -> Result<(), LinkError> {
        self.send_axis_command(axis, &format!("{target}S{speed}"))
    }

    /// Clear latched controller errors.
    pub fn reset_errors(&mut self) -> Result<(), LinkError> {
        self.send_axis_command(Axis::Y, "XS")
    }

    pub fn reset_controller(&mut self) -> Result<(), LinkError> {
        self.send_axis_command(Axis::X, "Q")
    }

    /// Stop both axes.
    pub fn stop(&mut self) -> Result<(), LinkError> {
        self.send_axis_command(Axis::X, "N")?;
        self.send_axis_command(Axis::Y, "N")
    }

    pub fn set_auto_mode(&mut self, axis: Axis, auto: bool) -> Result<(), LinkError> {
        self.send_axis_command(axis, if auto { "A" } else { "M0" })
    }

    /// Zero both motor position counters.
    pub fn zero_motor(&mut self) -> Result<(), LinkError> {
        self.set_value(Axis::X, "F", 0)?;
        self.set_value(Axis::Y, "F", 0)
    }

    pub fn axis_bits(&mut self, axis: Axis) -> Result<i64, LinkError> {
        self.query_value(axis, "B")
    }

    pub fn serial_number(&mut self) -> Result<i64, LinkError> {
        self.query_value(Axis::Y, "V")
    }

    pub fn read_axis_info(&mut self, axis: Axis) -> Result<AxisInfo, LinkError> {
        Ok(AxisInfo {
            acceleration: self.query_value(axis, "R")?,
            max_speed: self.query_value(axis, "S")?,
            current: self.query_value(axis, "C")? as f64 / 100.0,
            pwm: self.query_value(axis, "O")?,
        })
    }

    // ── Binary frames ──────────────────────────────────────────

    pub fn get_axis_status(&mut self, axis: Axis) -> Result<AxisStatus, LinkError> {
        self.switch_to_binary()?;
        self.send_axis_command(axis, "XS")?;
        self.read_axis_status()
    }

    /// Send a dual-axis request.  The controller answers every request with
    /// a status frame, which is returned.
    pub fn send_axis_request(&mut self, request: &MotionRequest) -> Result<AxisStatus, LinkError> {
        self.switch_to_binary()?;
        self.send_axis_command(request.command_axis(), "XR")?;

        let frame = request.encode();
        debug!(
            "-> {:?} request to {:?}",
            request.command_axis(),
            request.destination()
        );
        self.write_all(&frame)?;
        let kind = match request {
            MotionRequest::X(_) => FrameKind::XRequest,
            MotionRequest::Y(_) => FrameKind::YRequest,
        };
        self.log_frame(kind, &frame);

        self.read_axis_status()
    }

    pub fn get_configuration(&mut self) -> Result<ControllerConfiguration, LinkError> {
        self.switch_to_binary()?;
        self.send_axis_command(Axis::Y, "XC")?;

        let mut frame = [0u8; CONFIGURATION_FRAME_LEN];
        self.read_exact_frame(&mut frame)?;
        decode_configuration(&frame).map_err(|e| self.reject_frame(e))
    }

    fn read_axis_status(&mut self) -> Result<AxisStatus, LinkError> {
        let mut frame = [0u8; AXIS_STATUS_FRAME_LEN];
        self.read_exact_frame(&mut frame)?;
        trace!("<- status {frame:02x?}");
        let status = decode_axis_status(&frame).map_err(|e| self.reject_frame(e))?;
        // Only frames that passed the checksum are logged.
        self.log_frame(FrameKind::Status, &frame);
        Ok(status)
    }

    /// Read exactly `buf.len()` bytes.  Anything less flushes the input.
    pub(crate) fn read_exact_frame(&mut self, buf: &mut [u8]) -> Result<(), LinkError> {
        let expected = buf.len();
        match self.transport.read(buf, expected, None) {
            Ok(got) if got == expected => Ok(()),
            Ok(got) => Err(self.reject_frame(ProtocolError::ShortRead { expected, got })),
            Err(e) => {
                self.discard_input();
                Err(e.into())
            }
        }
    }

    fn reject_frame(&mut self, e: ProtocolError) -> LinkError {
        warn!("bad frame from controller: {e}; flushing input");
        self.discard_input();
        LinkError::Protocol(e)
    }

    pub(crate) fn discard_input(&mut self) {
        if let Err(e) = self.transport.flush_input() {
            warn!("cannot flush controller input: {e}");
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), LinkError> {
        let written = self.transport.write(data)?;
        if written != data.len() {
            return Err(LinkError::Io(std::io::ErrorKind::WriteZero));
        }
        Ok(())
    }

    // ── Speed units ────────────────────────────────────────────

    pub fn degrees_per_sec_to_motor_speed(&self, dps: f64, loop_ticks: i32, full_circle: f64) -> f64 {
        self.generation
            .degrees_per_sec_to_motor_speed(dps, loop_ticks, full_circle)
    }

    pub fn ticks_per_sec_to_motor_speed(&self, tps: f64) -> f64 {
        self.generation.ticks_per_sec_to_motor_speed(tps)
    }

    pub fn motor_speed_to_degrees_per_sec(&self, speed: f64, loop_ticks: i32) -> f64 {
        self.generation.motor_speed_to_degrees_per_sec(speed, loop_ticks)
    }
}
