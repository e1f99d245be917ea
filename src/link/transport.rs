//! Transport abstraction: a half-duplex byte channel.
//!
//! Concrete implementations:
//! - serial port (see `adapters::serial`)
//! - scripted in-memory channel (tests)
//!
//! The link is generic over `Transport`, so baud rate, parity and the
//! per-call timeout stay the transport's business.

use crate::error::TransportError;

/// Byte-oriented, half-duplex channel with a bounded read timeout.
pub trait Transport {
    /// Write `data`.  Returns the number of bytes actually written.
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Read into `buf` until `min_len` bytes arrived, `terminator` was
    /// seen, or `buf` is full.
    ///
    /// Returns the number of bytes read.  A timeout after some bytes
    /// arrived yields the partial count; a timeout with nothing read is
    /// [`TransportError::Timeout`].
    fn read(
        &mut self,
        buf: &mut [u8],
        min_len: usize,
        terminator: Option<u8>,
    ) -> Result<usize, TransportError>;

    /// Discard everything waiting in the input buffer.
    fn flush_input(&mut self) -> Result<(), TransportError>;
}

/// A null transport that swallows writes and never has data.
pub struct NullTransport;

impl Transport for NullTransport {
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        Ok(data.len())
    }

    fn read(
        &mut self,
        _buf: &mut [u8],
        _min_len: usize,
        _terminator: Option<u8>,
    ) -> Result<usize, TransportError> {
        Err(TransportError::Timeout)
    }

    fn flush_input(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        (**self).write(data)
    }

    fn read(
        &mut self,
        buf: &mut [u8],
        min_len: usize,
        terminator: Option<u8>,
    ) -> Result<usize, TransportError> {
        (**self).read(buf, min_len, terminator)
    }

    fn flush_input(&mut self) -> Result<(), TransportError> {
        (**self).flush_input()
    }
}
