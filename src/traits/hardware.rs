//! Hardware abstraction traits for pins, servos, and the BEMF motor bridge.
//!
//! This module defines the collaborator interfaces the turnout actuators
//! drive. They are deliberately small so that the same state machine runs
//! against the desktop mocks and the ESP32 board alike.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`Gpio`] | Digital pin mode, write and (active-low) read |
//! | [`ServoOutput`] | Hobby servo attach and angle write |
//! | [`BemfBridge`] | Shared PWM bridge + ADC sampling for BEMF motors |
//! | [`TurnoutHal`] | Everything above, with one error type |
//! | [`Clock`] | Monotonic millisecond time source |
//!
//! # Implementation
//!
//! For testing and desktop development, use [`crate::hal::MockHal`]. For
//! ESP32 hardware, use `hal::esp32::Esp32Board` (requires `esp32` feature).
//!
//! # Example
//!
//! ```rust
//! use rs_turnouts::traits::{Gpio, Level, PinMode};
//! use rs_turnouts::hal::MockHal;
//!
//! let mut hal = MockHal::new();
//! hal.set_mode(6, PinMode::Output).unwrap();
//! hal.write(6, Level::High).unwrap();
//! assert_eq!(hal.output_level(6), Level::High);
//! ```

use crate::motor::BemfPins;
use crate::stall::StallDetector;

/// Board pin number.
///
/// Pins are addressed by number, the way the turnout wiring is documented.
pub type Pin = u8;

/// Logic level of a digital pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    /// Logic 0.
    #[default]
    Low,
    /// Logic 1.
    High,
}

impl Level {
    /// Returns true for [`Level::High`].
    #[inline]
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Digital pin configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    /// Push-pull output (coil drivers).
    Output,
    /// Input with internal pull-up (end-position sensors, active low).
    InputPullUp,
}

/// Direction of the BEMF bridge drive.
///
/// Forward moves a BEMF turnout toward position 1, reverse toward
/// position 2. For DC motors this means swapping the H-bridge outputs.
///
/// # Default
///
/// Defaults to [`Stopped`](Self::Stopped) for safety.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Forward polarity.
    Forward,
    /// Reverse polarity.
    Reverse,
    /// Bridge off.
    #[default]
    Stopped,
}

impl Direction {
    /// Returns the direction as a lowercase string.
    ///
    /// # Examples
    ///
    /// ```
    /// use rs_turnouts::Direction;
    ///
    /// assert_eq!(Direction::Forward.as_str(), "forward");
    /// assert_eq!(Direction::Reverse.as_str(), "reverse");
    /// assert_eq!(Direction::Stopped.as_str(), "stopped");
    /// ```
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
            Direction::Stopped => "stopped",
        }
    }
}

/// Digital pin access.
///
/// Implement this trait for your board's GPIO. Sensors are wired to
/// ground through a switch with the internal pull-up enabled, so an
/// *active* sensor reads [`Level::Low`].
///
/// # Example Implementation
///
/// ```rust,ignore
/// use rs_turnouts::traits::{Gpio, Level, Pin, PinMode};
///
/// struct MyBoard { /* register handles */ }
///
/// impl Gpio for MyBoard {
///     type Error = ();
///
///     fn set_mode(&mut self, pin: Pin, mode: PinMode) -> Result<(), ()> {
///         // Configure direction and pull resistor...
///         Ok(())
///     }
///
///     fn write(&mut self, pin: Pin, level: Level) -> Result<(), ()> {
///         // Set output latch...
///         Ok(())
///     }
///
///     fn read(&mut self, pin: Pin) -> Result<Level, ()> {
///         // Sample input register...
///         Ok(Level::High)
///     }
/// }
/// ```
pub trait Gpio {
    /// Error type shared by every hardware operation of this board.
    type Error;

    /// Configure a pin.
    fn set_mode(&mut self, pin: Pin, mode: PinMode) -> Result<(), Self::Error>;

    /// Drive an output pin.
    fn write(&mut self, pin: Pin, level: Level) -> Result<(), Self::Error>;

    /// Sample a pin.
    fn read(&mut self, pin: Pin) -> Result<Level, Self::Error>;

    /// Returns true if an active-low input is asserted.
    fn is_active_low(&mut self, pin: Pin) -> Result<bool, Self::Error> {
        Ok(self.read(pin)? == Level::Low)
    }
}

/// Hobby servo actuation primitive.
///
/// Angles are whole degrees. The implementation converts them into the
/// pulse width expected by the servo.
pub trait ServoOutput: Gpio {
    /// Bind a servo channel to the pin.
    fn servo_attach(&mut self, pin: Pin) -> Result<(), Self::Error>;

    /// Command the servo on `pin` to `angle` degrees.
    fn servo_write(&mut self, pin: Pin, angle: u8) -> Result<(), Self::Error>;
}

/// Shared BEMF drive and sampling hardware.
///
/// A board has exactly one bridge, so only one BEMF turnout may be
/// energized at a time (see [`BemfArbiter`](crate::BemfArbiter)).
///
/// # Implementation Notes
///
/// - `bemf_init` registers one pin set and its [`StallDetector`]. Each BEMF
///   turnout calls it once with its own pins; calling it again with the
///   same pins replaces that set's detector.
/// - `bemf_drive` binds the bridge to `pins` before driving. Samples taken
///   while the bridge is driven go to [`StallDetector::on_sample`] of the
///   bound set, from whatever context does the sampling.
/// - Hardware implementations reject a pin set that was never registered.
pub trait BemfBridge: Gpio {
    /// Configure the bridge for `pins` and register its stall detector.
    fn bemf_init(&mut self, pins: BemfPins, detector: StallDetector) -> Result<(), Self::Error>;

    /// Bind the bridge to `pins` and drive it at `duty` (0.0 to 1.0) in
    /// `direction`.
    ///
    /// [`Direction::Stopped`] turns both half-bridges off regardless of duty.
    fn bemf_drive(
        &mut self,
        pins: BemfPins,
        duty: f32,
        direction: Direction,
    ) -> Result<(), Self::Error>;
}

/// Everything a turnout actuator needs from the board.
///
/// Blanket-implemented for any type providing [`Gpio`], [`ServoOutput`]
/// and [`BemfBridge`].
pub trait TurnoutHal: Gpio + ServoOutput + BemfBridge {}

impl<T: Gpio + ServoOutput + BemfBridge> TurnoutHal for T {}

/// Time source trait for `no_std` compatibility.
///
/// Provides monotonic time in milliseconds. On desktop, this can wrap
/// `std::time::Instant`. On embedded, use a hardware timer.
///
/// # Example
///
/// ```rust
/// use rs_turnouts::traits::Clock;
/// use rs_turnouts::hal::MockClock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(100);
/// assert_eq!(clock.now_ms(), 100);
/// ```
pub trait Clock {
    /// Returns current time in milliseconds since an arbitrary epoch.
    ///
    /// Must be monotonically increasing.
    fn now_ms(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Level / Direction Tests
    // =========================================================================

    #[test]
    fn level_default_is_low() {
        assert_eq!(Level::default(), Level::Low);
        assert!(!Level::Low.is_high());
        assert!(Level::High.is_high());
    }

    #[test]
    fn level_from_bool() {
        assert_eq!(Level::from(true), Level::High);
        assert_eq!(Level::from(false), Level::Low);
    }

    #[test]
    fn direction_default() {
        assert_eq!(Direction::default(), Direction::Stopped);
    }

    #[test]
    fn direction_as_str() {
        assert_eq!(Direction::Forward.as_str(), "forward");
        assert_eq!(Direction::Reverse.as_str(), "reverse");
        assert_eq!(Direction::Stopped.as_str(), "stopped");
    }

    // =========================================================================
    // Gpio Default Methods Tests
    // =========================================================================

    struct OnePin {
        level: Level,
    }

    impl Gpio for OnePin {
        type Error = ();

        fn set_mode(&mut self, _pin: Pin, _mode: PinMode) -> Result<(), ()> {
            Ok(())
        }

        fn write(&mut self, _pin: Pin, level: Level) -> Result<(), ()> {
            self.level = level;
            Ok(())
        }

        fn read(&mut self, _pin: Pin) -> Result<Level, ()> {
            Ok(self.level)
        }
    }

    #[test]
    fn is_active_low_default_impl() {
        let mut pin = OnePin { level: Level::High };
        assert!(!pin.is_active_low(0).unwrap());

        pin.level = Level::Low;
        assert!(pin.is_active_low(0).unwrap());
    }
}
