//! Shared configuration for turnout timing, servo travel, and stall detection.
//!
//! Uses `heapless::String` for `no_std` compatibility while remaining
//! ergonomic to use on desktop with `std`.
//!
//! # Example
//!
//! ```rust
//! use rs_turnouts::config::{Config, StallConfig, TimingConfig};
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.timing.timeout_ms, 5000);
//!
//! // Or customize
//! let config = Config::default()
//!     .with_timing(TimingConfig::default().with_timeout_ms(8000))
//!     .with_stall(StallConfig::default().with_threshold(80));
//! ```

use heapless::String as HString;

use crate::commands::DirectionMapping;

/// Maximum length for short config strings (turnout and device names)
pub const MAX_SHORT_STRING: usize = 64;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    // Take only what fits
    let take = s.len().min(MAX_SHORT_STRING);
    // Find valid UTF-8 boundary
    let valid_end = s
        .char_indices()
        .take_while(|(i, c)| i + c.len_utf8() <= take)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete application configuration
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Movement timing shared by all actuators
    pub timing: TimingConfig,
    /// Default servo travel
    pub servo: ServoConfig,
    /// BEMF stall detection
    pub stall: StallConfig,
    /// Layout / accessory decoder glue
    pub layout: LayoutConfig,
}

impl Config {
    /// Set timing configuration
    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// Set servo configuration
    pub fn with_servo(mut self, servo: ServoConfig) -> Self {
        self.servo = servo;
        self
    }

    /// Set stall detection configuration
    pub fn with_stall(mut self, stall: StallConfig) -> Self {
        self.stall = stall;
        self
    }

    /// Set layout configuration
    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }
}

// ============================================================================
// Timing Config
// ============================================================================

/// Movement timing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingConfig {
    /// A move that has not arrived after this long is abandoned
    pub timeout_ms: u32,
    /// Delay between 1° servo steps
    pub servo_step_ms: u32,
    /// Coil pulse high time
    pub coil_pulse_on_ms: u32,
    /// Coil rest time after each pulse
    pub coil_pulse_off_ms: u32,
}

impl TimingConfig {
    /// Move timeout used when nothing else is configured.
    pub const DEFAULT_TIMEOUT_MS: u32 = 5000;
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            timeout_ms: Self::DEFAULT_TIMEOUT_MS,
            servo_step_ms: 20,
            coil_pulse_on_ms: 50,
            coil_pulse_off_ms: 150,
        }
    }
}

impl TimingConfig {
    /// Set the move timeout
    pub fn with_timeout_ms(mut self, ms: u32) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Set the servo step delay
    pub fn with_servo_step_ms(mut self, ms: u32) -> Self {
        self.servo_step_ms = ms;
        self
    }

    /// Set the coil pulse on/off times
    pub fn with_coil_pulse_ms(mut self, on_ms: u32, off_ms: u32) -> Self {
        self.coil_pulse_on_ms = on_ms;
        self.coil_pulse_off_ms = off_ms;
        self
    }

    /// Full coil pulse period (on + off)
    pub fn coil_period_ms(&self) -> u32 {
        self.coil_pulse_on_ms.saturating_add(self.coil_pulse_off_ms)
    }
}

// ============================================================================
// Servo Config
// ============================================================================

/// Servo travel limits in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServoConfig {
    /// Angle for position 1
    pub angle_min: u8,
    /// Angle for position 2
    pub angle_max: u8,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            angle_min: 30,
            angle_max: 150,
        }
    }
}

impl ServoConfig {
    /// Create a servo config, swapping the bounds if given in reverse
    pub fn new(angle_min: u8, angle_max: u8) -> Self {
        Self {
            angle_min: angle_min.min(angle_max),
            angle_max: angle_min.max(angle_max),
        }
    }

    /// Set the travel limits
    pub fn with_angles(self, angle_min: u8, angle_max: u8) -> Self {
        Self::new(angle_min, angle_max)
    }
}

// ============================================================================
// Stall Config
// ============================================================================

/// BEMF stall detection thresholds.
///
/// Raw samples are compared against `threshold`; more than `run_length`
/// consecutive low samples count as a stall (end of travel).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StallConfig {
    /// Raw ADC value below which a sample counts as "stalled"
    pub threshold: u16,
    /// Consecutive low samples that must be exceeded
    pub run_length: u8,
}

impl Default for StallConfig {
    fn default() -> Self {
        Self {
            threshold: 50,
            run_length: 5,
        }
    }
}

impl StallConfig {
    /// Set the low-sample threshold
    pub fn with_threshold(mut self, threshold: u16) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the run length
    pub fn with_run_length(mut self, run_length: u8) -> Self {
        self.run_length = run_length;
        self
    }
}

// ============================================================================
// Layout Config
// ============================================================================

/// Layout driver configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LayoutConfig {
    /// Accessory direction bit mapping
    pub mapping: DirectionMapping,
    /// Main loop tick in milliseconds (keep below 10 for coil pulses)
    pub tick_ms: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            mapping: DirectionMapping::default(),
            tick_ms: 5,
        }
    }
}

impl LayoutConfig {
    /// Set the direction bit mapping
    pub fn with_mapping(mut self, mapping: DirectionMapping) -> Self {
        self.mapping = mapping;
        self
    }

    /// Set the main loop tick
    pub fn with_tick_ms(mut self, ms: u32) -> Self {
        self.tick_ms = ms.max(1);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
