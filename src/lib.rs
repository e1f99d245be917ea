//! Sitech mount controller core.
//!
//! Wire codec, serial session and closed-loop tracking for Sidereal
//! Technology servo controllers (Servo I/II, Force One).  Everything
//! outside the serial line (astrometry, collision checks, event delivery)
//! is reached through the port traits in [`app::ports`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod link;
pub mod protocol;
pub mod safety;
pub mod tracking;

pub use error::{Error, LinkError, ProtocolError, Result, TrackingError, TransportError};
