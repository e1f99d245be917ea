//! Fuzz target: `decode_axis_status`
//!
//! Any 41 bytes either decode or fail with a checksum mismatch.  A frame
//! that decodes must re-encode to a frame that decodes to the same status.
//!
//! cargo fuzz run fuzz_decode_axis_status

#![no_main]

use libfuzzer_sys::fuzz_target;
use sitech::protocol::{AXIS_STATUS_FRAME_LEN, decode_axis_status};

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = <[u8; AXIS_STATUS_FRAME_LEN]>::try_from(data) else {
        return;
    };
    if let Ok(status) = decode_axis_status(&frame) {
        let again = decode_axis_status(&status.encode()).expect("re-encoded frame decodes");
        assert_eq!(again.x_pos, status.x_pos);
        assert_eq!(again.y_pos, status.y_pos);
    }
});
