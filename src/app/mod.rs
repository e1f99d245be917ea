//! Application core: mount state machine and its collaborators.
//!
//! This module contains the rules of the owning device driver: slewing,
//! tracking, parking and operator commands.  Astrometry, trajectory
//! checking and event delivery happen through **port traits** defined in
//! [`ports`], so the whole layer runs against mocks in tests.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
