//! Serial port transport.
//!
//! Sitech controllers talk 19200 baud, 8 data bits, no parity, one stop
//! bit, no flow control.  Every read is bounded by the port timeout.

use std::io::{Read, Write};
use std::time::Duration;

use log::{debug, info};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::error::TransportError;
use crate::link::Transport;

pub const BAUD_RATE: u32 = 19_200;

/// [`Transport`] over a local serial device.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn open(path: &str, timeout: Duration) -> Result<Self, serialport::Error> {
        info!("Opening serial port: {path} at {BAUD_RATE} bps");
        let port = serialport::new(path, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()?;
        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let n = self.port.write(data)?;
        self.port.flush()?;
        Ok(n)
    }

    fn read(
        &mut self,
        buf: &mut [u8],
        min_len: usize,
        terminator: Option<u8>,
    ) -> Result<usize, TransportError> {
        let mut got = 0;
        while got < buf.len() {
            match self.port.read(&mut buf[got..]) {
                Ok(0) if got == 0 => return Err(TransportError::Closed),
                Ok(0) => break,
                Ok(n) => {
                    let fresh = &buf[got..got + n];
                    got += n;
                    if terminator.is_some_and(|t| fresh.contains(&t)) || got >= min_len {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    if got == 0 {
                        return Err(TransportError::Timeout);
                    }
                    debug!("serial timeout after {got} of {min_len} bytes");
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(got)
    }

    fn flush_input(&mut self) -> Result<(), TransportError> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::Io(kind) => TransportError::Io(kind),
                serialport::ErrorKind::NoDevice => TransportError::Closed,
                _ => TransportError::Io(std::io::ErrorKind::Other),
            })
    }
}
