//! Fuzz target: `parse_reply_value`
//!
//! Arbitrary line replies never panic, and a parsed value printed back
//! behind an axis letter parses to itself.
//!
//! cargo fuzz run fuzz_parse_reply_value

#![no_main]

use libfuzzer_sys::fuzz_target;
use sitech::protocol::parse_reply_value;

fuzz_target!(|data: &[u8]| {
    if let Some(value) = parse_reply_value(data) {
        let echoed = format!("X{value}\r\n");
        assert_eq!(parse_reply_value(echoed.as_bytes()), Some(value));
    }
});
