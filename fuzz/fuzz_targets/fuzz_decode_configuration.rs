//! Fuzz target: `decode_configuration`
//!
//! cargo fuzz run fuzz_decode_configuration

#![no_main]

use libfuzzer_sys::fuzz_target;
use sitech::protocol::{CONFIGURATION_FRAME_LEN, decode_configuration};

fuzz_target!(|data: &[u8]| {
    let mut frame = [0u8; CONFIGURATION_FRAME_LEN];
    let n = data.len().min(CONFIGURATION_FRAME_LEN);
    frame[..n].copy_from_slice(&data[..n]);
    if let Ok(config) = decode_configuration(&frame) {
        assert!(config.latitude_degrees().is_finite());
    }
});
