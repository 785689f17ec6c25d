//! Trait definitions for hardware abstraction and event reporting.
//!
//! This module defines the core abstractions that allow rs-turnouts to:
//! - Run on different hardware (ESP32, desktop mock)
//! - Report movements without printing from inside the state machine
//!
//! # Submodules
//!
//! - `hardware`: GPIO, servo output, BEMF bridge, clock
//! - `events`: Turnout events and the event sink trait
//!
//! # Hardware Abstraction
//!
//! The key hardware traits are:
//!
//! - [`Gpio`]: Pin modes, writes and active-low sensor reads
//! - [`ServoOutput`]: Servo attach and angle writes
//! - [`BemfBridge`]: The single PWM bridge and ADC shared by BEMF turnouts
//! - [`Clock`]: Time source for `no_std` environments

pub mod events;
pub mod hardware;

pub use events::*;
pub use hardware::*;
