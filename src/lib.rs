//! # rs-turnouts
//!
//! Model railway turnout actuators for servo, double-coil and BEMF motors,
//! plus a three-way turnout built from two coil turnouts.
//!
//! ## Features
//!
//! - **Hardware abstraction**: Traits for pins, servos and the shared BEMF bridge
//! - **Three motor technologies**: Servo stepping, coil pulsing, BEMF stall detection
//! - **Timeout recovery**: Jammed or unsensed turnouts fall back to idle and report a fault
//! - **Shared-bridge arbitration**: At most one BEMF turnout is energized at a time
//! - **DCC glue**: Accessory address and direction bit to turnout position or route
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Hardware abstractions and the event sink
//! - `commands` - Positions, routes, accessory commands and rejection reasons
//! - `motor` - Servo, coil and BEMF drives
//! - `arbiter` / `stall` - Shared BEMF bridge lock and stall detection
//! - `turnout` - Per-turnout state machine
//! - `three_way` - Two coil turnouts acting as one three-way turnout
//! - `layout` - Address routing and the periodic driver
//! - `hal` - Concrete implementations (mock for testing, esp32 for hardware)
//!
//! ## Example
//!
//! ```rust
//! use rs_turnouts::{
//!     Position, State, TurnoutActuator,
//!     hal::{MockEvents, MockHal},
//!     traits::EventSink,
//! };
//!
//! let mut hal = MockHal::new();
//! let mut events = MockEvents::new();
//!
//! // Coil turnout: coils on 4/5, end sensors on 6/7
//! let mut turnout = TurnoutActuator::new_coil(1, "W1", 4, 5, 6, 7);
//! turnout.begin(&mut hal).unwrap();
//! turnout.set_position(2).unwrap();
//!
//! // Update in your main loop
//! for tick in 0..10 {
//!     let event = turnout.update(&mut hal, tick * 5).unwrap();
//!     events.emit_opt(event.as_ref());
//! }
//! assert_eq!(turnout.state(), State::MovingToPos2);
//!
//! // End sensor 2 closes
//! hal.set_sensor(7, true);
//! turnout.update(&mut hal, 50).unwrap();
//! assert_eq!(turnout.position(), Some(Position::Pos2));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Shared BEMF bridge arbitration.
pub mod arbiter;
/// Positions, routes and rejection reasons.
pub mod commands;
/// Shared configuration system for desktop and ESP32.
pub mod config;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Accessory-address routing and the periodic driver.
pub mod layout;
/// Console and `defmt` event sinks.
pub mod logging;
/// Servo, coil and BEMF motor drives.
pub mod motor;
/// BEMF stall detection.
pub mod stall;
/// Three-way turnout composed of two coil turnouts.
pub mod three_way;
/// Core traits for hardware abstraction and event reporting.
pub mod traits;
/// Per-turnout actuation state machine.
pub mod turnout;

// Re-exports for convenience
pub use arbiter::BemfArbiter;
pub use commands::{AccessoryCommand, DirectionMapping, Position, RejectReason, Route};
pub use layout::{Actuator, Applied, Layout};
pub use motor::{BemfPins, CoilPins, Motor, MotorKind, SensorPins};
pub use stall::StallDetector;
pub use three_way::{LegResults, ThreeWayActuator};
pub use traits::{
    // Hardware
    BemfBridge,
    Clock,
    Direction,
    // Events
    EventKind,
    EventSink,
    Gpio,
    Level,
    Pin,
    PinMode,
    ServoOutput,
    TurnoutEvent,
    TurnoutHal,
};
pub use turnout::{State, TurnoutActuator};

// Config re-exports
pub use config::{Config, LayoutConfig, ServoConfig, StallConfig, TimingConfig};

// Sink re-exports
#[cfg(feature = "std")]
pub use logging::ConsoleSink;
#[cfg(feature = "defmt")]
pub use logging::DefmtSink;
pub use logging::NullSink;
