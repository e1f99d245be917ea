//! Mount configuration parameters
//!
//! All tunable parameters of the tracking core and the daemon.  Loaded from
//! a JSON file; missing fields take their defaults.  Angles are degrees,
//! times seconds, positions controller counts.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::control::{LookAheadParams, PidGains};
use crate::error::Error;
use crate::link::GenerationKind;
use crate::protocol::Axes;

/// Allowed motor count range of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CountLimits {
    pub min: i32,
    pub max: i32,
}

impl CountLimits {
    /// Never panics; an inverted range yields `max`.
    pub fn clamp(&self, counts: i32) -> i32 {
        counts.max(self.min).min(self.max)
    }

    pub fn contains(&self, counts: i32) -> bool {
        (self.min..=self.max).contains(&counts)
    }
}

/// Core mount configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    // --- Tracking loop ---
    /// Period of the tracking loop
    pub tracking_interval_secs: f64,
    /// Target distance below which the mount counts as on target
    pub tracking_distance_deg: f64,
    /// Initial look-ahead of tracking predictions
    pub tracking_look_ahead_secs: f64,
    /// Operator pinned the look-ahead; adaptive scaling is off
    pub look_ahead_pinned: bool,
    /// Speed factor while tracking
    pub tracking_factor: f64,
    pub look_ahead: LookAheadParams,

    // --- Slewing ---
    /// Below this distance tracking runs at `tracking_factor`
    pub slow_sync_distance_deg: f64,
    /// Below this distance slews are finished by the tracking loop
    pub close_approach_deg: f64,
    /// Speed factor between slow-sync and close-approach distance
    pub fast_sync_speed: f64,
    /// Look-ahead used while fast syncing
    pub fast_sync_look_ahead_secs: f64,
    /// Slews still running after this are abandoned
    pub slew_timeout_secs: f64,
    /// Direct move speed per axis (deg/s)
    pub slew_speed_dps: Axes<f64>,

    // --- Geometry ---
    /// Motor counts per full axis revolution
    pub ticks_per_circle: Axes<i32>,
    pub soft_limits: Axes<CountLimits>,
    pub park_position: Option<Axes<i32>>,
    /// Time window handed to the trajectory checker
    pub trajectory_window_secs: f64,

    // --- Feedback ---
    pub tracking_pid: PidGains,
    /// Damped gains swapped in while an axis oscillates
    pub oscillation_pid: PidGains,
    /// Near target the correction is capped to this share of feed-forward
    pub correction_cap_ratio: f64,
    /// Smallest correction cap (counts/s)
    pub correction_cap_min: f64,
    /// `|error| / error range` below which an axis counts as oscillating
    pub oscillation_threshold: f64,
    /// Error samples needed before oscillation detection starts
    pub oscillation_min_samples: usize,
    /// Commanded speed below this counts as low (deg/s)
    pub low_speed_dps: f64,

    // --- Controller ---
    /// Generation to assume instead of detecting it from the version
    pub forced_generation: Option<GenerationKind>,
    /// Per-call serial read timeout (ms)
    pub serial_timeout_ms: u64,
    /// Frame log file, off when unset
    pub frame_log: Option<String>,
}

impl Default for MountConfig {
    fn default() -> Self {
        let ticks = 16_777_216;
        Self {
            // Tracking loop
            tracking_interval_secs: 0.5,
            tracking_distance_deg: 1.0 / 3600.0, // 1 arcsec
            tracking_look_ahead_secs: 2.0,
            look_ahead_pinned: false,
            tracking_factor: 1.0,
            look_ahead: LookAheadParams::default(),

            // Slewing
            slow_sync_distance_deg: 0.1, // 6 arcmin
            close_approach_deg: 0.5,
            fast_sync_speed: 4.0,
            fast_sync_look_ahead_secs: 2.0,
            slew_timeout_secs: 120.0,
            slew_speed_dps: Axes::new(5.0, 5.0),

            // Geometry
            ticks_per_circle: Axes::new(ticks, ticks),
            soft_limits: Axes::new(
                CountLimits {
                    min: -ticks / 4,
                    max: ticks / 4,
                },
                CountLimits {
                    min: -ticks,
                    max: ticks,
                },
            ),
            park_position: None,
            trajectory_window_secs: 2.0,

            // Feedback
            tracking_pid: PidGains::new(0.5, 0.05, 0.0, 50_000.0),
            oscillation_pid: PidGains::new(0.2, 0.01, 0.05, 20_000.0),
            correction_cap_ratio: 0.1,
            correction_cap_min: 10.0,
            oscillation_threshold: 0.3,
            oscillation_min_samples: 8,
            low_speed_dps: 0.01,

            // Controller
            forced_generation: None,
            serial_timeout_ms: 500,
            frame_log: None,
        }
    }
}

/// Errors loading or validating a [`MountConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// Config file does not exist.
    NotFound,
    /// Config file is not valid JSON for this schema.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error reading the file.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::NotFound => Error::Config("config not found"),
            ConfigError::Corrupted => Error::Config("config corrupted"),
            ConfigError::ValidationFailed(msg) => Error::Config(msg),
            ConfigError::IoError => Error::Config("config I/O error"),
        }
    }
}

impl MountConfig {
    /// Load and validate a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::NotFound,
            _ => ConfigError::IoError,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            log::error!("{}: {e}", path.display());
            ConfigError::Corrupted
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject inconsistent values instead of clamping them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        use ConfigError::ValidationFailed as Invalid;

        if !positive(self.tracking_interval_secs) {
            return Err(Invalid("tracking_interval_secs must be positive"));
        }
        if !positive(self.tracking_distance_deg) {
            return Err(Invalid("tracking_distance_deg must be positive"));
        }
        let la = &self.look_ahead;
        if !(la.floor > 0.0 && la.floor <= la.low_speed_floor && la.low_speed_floor <= la.ceiling) {
            return Err(Invalid("look_ahead needs 0 < floor <= low_speed_floor <= ceiling"));
        }
        if !positive(la.step) || la.interval_cycles == 0 {
            return Err(Invalid("look_ahead step and interval must be positive"));
        }
        if self.tracking_look_ahead_secs < la.floor || self.tracking_look_ahead_secs > la.ceiling {
            return Err(Invalid("tracking_look_ahead_secs outside look_ahead floor..ceiling"));
        }
        if self.slow_sync_distance_deg >= self.close_approach_deg {
            return Err(Invalid("slow_sync_distance_deg must be below close_approach_deg"));
        }
        if self.tracking_distance_deg >= self.slow_sync_distance_deg {
            return Err(Invalid("tracking_distance_deg must be below slow_sync_distance_deg"));
        }
        if self.fast_sync_speed < 1.0 || !positive(self.tracking_factor) {
            return Err(Invalid("speed factors must be positive, fast_sync_speed >= 1"));
        }
        if !positive(self.slew_timeout_secs) {
            return Err(Invalid("slew_timeout_secs must be positive"));
        }
        if !(self.slew_speed_dps.x > 0.0 && self.slew_speed_dps.y > 0.0) {
            return Err(Invalid("slew_speed_dps must be positive"));
        }
        if self.ticks_per_circle.x == 0 || self.ticks_per_circle.y == 0 {
            return Err(Invalid("ticks_per_circle must be nonzero"));
        }
        if self.soft_limits.x.min >= self.soft_limits.x.max
            || self.soft_limits.y.min >= self.soft_limits.y.max
        {
            return Err(Invalid("soft_limits min must be below max"));
        }
        if let Some(park) = self.park_position {
            if !self.soft_limits.x.contains(park.x) || !self.soft_limits.y.contains(park.y) {
                return Err(Invalid("park_position outside soft_limits"));
            }
        }
        if !(self.correction_cap_ratio > 0.0 && self.correction_cap_ratio <= 1.0) {
            return Err(Invalid("correction_cap_ratio must be in (0, 1]"));
        }
        if self.correction_cap_min < 0.0 {
            return Err(Invalid("correction_cap_min must not be negative"));
        }
        if !(self.oscillation_threshold > 0.0 && self.oscillation_threshold < 1.0) {
            return Err(Invalid("oscillation_threshold must be in (0, 1)"));
        }
        if self.oscillation_min_samples < 2 || self.oscillation_min_samples > crate::tracking::STATS_WINDOW {
            return Err(Invalid("oscillation_min_samples must fit the error window"));
        }
        if self.tracking_pid.output_limit <= 0.0 || self.oscillation_pid.output_limit <= 0.0 {
            return Err(Invalid("PID output limits must be positive"));
        }
        if self.serial_timeout_ms == 0 {
            return Err(Invalid("serial_timeout_ms must be positive"));
        }
        Ok(())
    }
}

/// False for NaN as well.
fn positive(v: f64) -> bool {
    v > 0.0
}
