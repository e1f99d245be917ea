//! Axis fault word reported by Force One controllers.
//!
//! Machine decisions test individual [`AxisFault`] bits; the strings from
//! [`decode_errors`] are for operators only.

use bitflags::bitflags;

bitflags! {
    /// 12-bit fault word of one axis.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AxisFault: u16 {
        const GATE_VOLTS_LOW = 1 << 0;
        const OVERCURRENT_HARDWARE = 1 << 1;
        const OVERCURRENT_FIRMWARE = 1 << 2;
        const MOTOR_VOLTS_LOW = 1 << 3;
        const POWER_BOARD_OVER_TEMP = 1 << 4;
        /// May be reported without any other error.
        const NEEDS_RESET = 1 << 5;
        const LIMIT_MINUS = 1 << 6;
        const LIMIT_PLUS = 1 << 7;
        const TIMED_OVER_CURRENT = 1 << 8;
        const POSITION_ERROR = 1 << 9;
        const ENCODER_ERROR = 1 << 10;
        /// Checksum error in the reply from the power board.
        const CHECKSUM = 1 << 11;
    }
}

impl AxisFault {
    /// Either limit switch is active.
    pub fn on_limit(self) -> bool {
        self.intersects(Self::LIMIT_MINUS | Self::LIMIT_PLUS)
    }
}

const DESCRIPTIONS: [(AxisFault, &str); 12] = [
    (AxisFault::GATE_VOLTS_LOW, "Gate Volts Low"),
    (AxisFault::OVERCURRENT_HARDWARE, "OverCurrent Hardware"),
    (AxisFault::OVERCURRENT_FIRMWARE, "OverCurrent Firmware"),
    (AxisFault::MOTOR_VOLTS_LOW, "Motor Volts Low"),
    (AxisFault::POWER_BOARD_OVER_TEMP, "Power Board Over Temp"),
    (AxisFault::NEEDS_RESET, "Needs Reset"),
    (AxisFault::LIMIT_MINUS, "Limit -"),
    (AxisFault::LIMIT_PLUS, "Limit +"),
    (AxisFault::TIMED_OVER_CURRENT, "Timed Over Current"),
    (AxisFault::POSITION_ERROR, "Position Error"),
    (AxisFault::ENCODER_ERROR, "BiSS Encoder Error"),
    (AxisFault::CHECKSUM, "Checksum Error in return from Power Board"),
];

/// Descriptions of every known bit set in `word`, lowest bit first.
/// Reserved bits are ignored.
pub fn decode_errors(word: u16) -> Vec<&'static str> {
    let faults = AxisFault::from_bits_truncate(word);
    DESCRIPTIONS
        .iter()
        .filter(|(flag, _)| faults.contains(*flag))
        .map(|(_, text)| *text)
        .collect()
}

/// All descriptions joined into one log line, e.g. `"Limit -. Position Error."`.
pub fn describe_errors(word: u16) -> String {
    decode_errors(word)
        .iter()
        .map(|d| format!("{d}."))
        .collect::<Vec<_>>()
        .join(" ")
}
