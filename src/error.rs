//! Unified error types for the Sitech mount core.
//!
//! Errors are layered the same way the code is: the frame codec raises
//! [`ProtocolError`], the serial session wraps it (and transport failures)
//! in [`LinkError`], and the tracking engine wraps those in
//! [`TrackingError`].  Every variant is `Copy` so errors can be stored in
//! service state and event payloads without allocation.

use core::fmt;

use crate::protocol::Axis;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Malformed or corrupted frame.
    Protocol(ProtocolError),
    /// The serial session failed.
    Link(LinkError),
    /// Tracking was aborted.
    Tracking(TrackingError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
    /// The mount is stopped on a fault and must be reset before it moves.
    Stopped,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Tracking(e) => write!(f, "tracking: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Stopped => write!(f, "mount is stopped; reset errors first"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Frame codec errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Checksum carried by the frame does not match its payload.
    ChecksumMismatch { transmitted: u16, computed: u16 },
    /// Fewer bytes arrived than the fixed frame length.
    ShortRead { expected: usize, got: usize },
    /// Command text does not fit into a command frame.
    CommandTooLong,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChecksumMismatch {
                transmitted,
                computed,
            } => write!(
                f,
                "checksum mismatch, transmitted {transmitted:#06x}, calculated {computed:#06x}"
            ),
            Self::ShortRead { expected, got } => {
                write!(f, "short read, expected {expected} bytes, got {got}")
            }
            Self::CommandTooLong => write!(f, "command too long"),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Failures reported by a byte transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No byte arrived within the per-call timeout.
    Timeout,
    /// The channel is closed.
    Closed,
    /// Any other OS-level I/O failure.
    Io(std::io::ErrorKind),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Closed => write!(f, "channel closed"),
            Self::Io(kind) => write!(f, "I/O error: {kind}"),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => Self::Timeout,
            std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::NotConnected => Self::Closed,
            kind => Self::Io(kind),
        }
    }
}

// ---------------------------------------------------------------------------
// Link errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// Controller did not answer the version query with a nonzero value.
    InitFailed,
    /// Transport timed out.
    Timeout,
    /// Transport I/O failure (includes a closed channel).
    Io(std::io::ErrorKind),
    /// A frame could not be decoded.
    Protocol(ProtocolError),
    /// An ASCII reply carried no numeric value.
    InvalidReply,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitFailed => write!(f, "controller did not respond"),
            Self::Timeout => write!(f, "timeout"),
            Self::Io(kind) => write!(f, "I/O error: {kind}"),
            Self::Protocol(e) => write!(f, "{e}"),
            Self::InvalidReply => write!(f, "invalid reply"),
        }
    }
}

impl std::error::Error for LinkError {}

impl From<ProtocolError> for LinkError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

impl From<TransportError> for LinkError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout => Self::Timeout,
            TransportError::Closed => Self::Io(std::io::ErrorKind::NotConnected),
            TransportError::Io(kind) => Self::Io(kind),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Tracking errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingError {
    /// Trajectory checker refused the proposed move.
    UnsafeTrajectory,
    /// Ephemeris could not produce a target (below horizon, unreachable).
    EphemerisUnavailable,
    /// Controller reports a limit switch on an axis.
    LimitSwitch { axis: Axis, word: u16 },
    /// Status read or request transmission failed.
    Link(LinkError),
}

impl TrackingError {
    /// True for transient link failures the caller may retry after backoff.
    /// Everything else must stop the mount.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Link(LinkError::Timeout | LinkError::Io(_) | LinkError::Protocol(_))
        )
    }
}

impl fmt::Display for TrackingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsafeTrajectory => write!(f, "unsafe trajectory"),
            Self::EphemerisUnavailable => write!(f, "ephemeris unavailable"),
            Self::LimitSwitch { axis, word } => {
                write!(f, "{axis} axis on limit switch (errors {word:#05x})")
            }
            Self::Link(e) => write!(f, "link: {e}"),
        }
    }
}

impl std::error::Error for TrackingError {}

impl From<LinkError> for TrackingError {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

impl From<TrackingError> for Error {
    fn from(e: TrackingError) -> Self {
        Self::Tracking(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
