//! Integration test driver for `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises one layer of the mount
//! core against the fake controller and the scripted sky model.  No
//! serial hardware is required.

mod link_tests;
mod mock_link;
mod mock_sky;
mod tracking_tests;
