//! ESP32-C3 SuperMini hardware abstraction layer for turnout control.
//!
//! This module provides hardware implementations for an ESP32-C3 SuperMini
//! driving one servo turnout, one double-coil turnout and one BEMF turnout.
//!
//! # Hardware Configuration
//!
//! - **MCU**: ESP32-C3 SuperMini (RISC-V 160MHz, 4MB Flash)
//! - **Servo**: SG90 class hobby servo on an LEDC channel at 50Hz
//! - **Coil**: Double-coil turnout motor through two low-side drivers
//! - **BEMF**: Small DC turnout motor on an H-bridge, sense outputs on ADC1
//!
//! # Pin Assignments
//!
//! See the [`pins`] module for GPIO assignments matching the SuperMini layout.

mod bemf;
mod board;
mod clock;

pub use bemf::Esp32Bemf;
pub use board::Esp32Board;
pub use clock::Esp32Clock;

use crate::traits::Pin;

/// Errors from the ESP32 board.
#[derive(Debug)]
pub enum Esp32HalError {
    /// ESP-IDF driver error.
    Esp(esp_idf_hal::sys::EspError),
    /// Pin number was never registered on the board (or not for this use).
    UnknownPin(Pin),
    /// Servo written before `servo_attach`.
    NotAttached(Pin),
    /// A BEMF turnout was configured but the board has no bridge.
    NoBemfBridge,
}

impl From<esp_idf_hal::sys::EspError> for Esp32HalError {
    fn from(e: esp_idf_hal::sys::EspError) -> Self {
        Esp32HalError::Esp(e)
    }
}

impl core::fmt::Display for Esp32HalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Esp32HalError::Esp(e) => write!(f, "esp-idf: {}", e),
            Esp32HalError::UnknownPin(p) => write!(f, "pin {} not registered", p),
            Esp32HalError::NotAttached(p) => write!(f, "servo on pin {} not attached", p),
            Esp32HalError::NoBemfBridge => write!(f, "no BEMF bridge on this board"),
        }
    }
}

impl std::error::Error for Esp32HalError {}

/// Pin assignments for SuperMini ESP32-C3.
///
/// These constants match the wiring of the demo layout:
/// - BEMF bridge on GPIO2-4
/// - Coil turnout on GPIO6, 7 with sensors on GPIO8, 9 (GPIO20/21 carry the console UART)
/// - Servo turnout on GPIO10 with sensors on GPIO0, 1
pub mod pins {
    use crate::traits::Pin;

    // =========================================================================
    // BEMF Bridge
    // =========================================================================

    /// Forward PWM output (toward position 1)
    pub const BEMF_PWM_FWD: Pin = 2;

    /// Reverse PWM output (toward position 2)
    pub const BEMF_PWM_REV: Pin = 3;

    /// Forward BEMF sense input - ADC1
    pub const BEMF_SENSE_FWD: Pin = 4;

    /// Reverse BEMF sense input. Wired to GPIO4 as well; see [`Esp32Bemf`](super::Esp32Bemf).
    pub const BEMF_SENSE_REV: Pin = 5;

    // =========================================================================
    // Coil Turnout
    // =========================================================================

    /// Coil for position 1
    pub const COIL_FWD: Pin = 6;

    /// Coil for position 2
    pub const COIL_REV: Pin = 7;

    /// End sensor position 1 (active low)
    pub const COIL_SENSOR_1: Pin = 8;

    /// End sensor position 2 (active low)
    pub const COIL_SENSOR_2: Pin = 9;

    // =========================================================================
    // Servo Turnout
    // =========================================================================

    /// Servo signal
    pub const SERVO: Pin = 10;

    /// End sensor position 1 (active low)
    pub const SERVO_SENSOR_1: Pin = 0;

    /// End sensor position 2 (active low)
    pub const SERVO_SENSOR_2: Pin = 1;
}
