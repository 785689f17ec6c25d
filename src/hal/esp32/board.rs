//! Pin-numbered turnout board on top of ESP-IDF drivers.
//!
//! The turnout actuators address pins by number. [`Esp32Board`] owns the
//! concrete drivers and maps each registered number to one of them:
//!
//! | Registration | Driver | Used for |
//! |--------------|--------|----------|
//! | [`add_output`](Esp32Board::add_output) | `PinDriver<Output>` | Coil outputs |
//! | [`add_input`](Esp32Board::add_input) | `PinDriver<Input>` | End sensors |
//! | [`add_servo`](Esp32Board::add_servo) | `LedcDriver` at 50Hz | Servo signal |
//! | [`with_bemf`](Esp32Board::with_bemf) | [`Esp32Bemf`] | Shared BEMF bridge |
//!
//! Using a pin number that was never registered is an error, not a panic.
//! The same holds for BEMF pin sets: each one must pass through
//! `bemf_init` before it can be driven, and keeps its own stall detector.

use std::collections::BTreeMap;

use esp_idf_hal::gpio::{AnyIOPin, AnyOutputPin, Input, Output, PinDriver, Pull};
use esp_idf_hal::ledc::LedcDriver;

use super::bemf::Esp32Bemf;
use super::Esp32HalError;
use crate::motor::BemfPins;
use crate::stall::StallDetector;
use crate::traits::{BemfBridge, Direction, Gpio, Level, Pin, PinMode, ServoOutput};

/// Servo pulse width at 0° in microseconds.
const SERVO_MIN_PULSE_US: u32 = 500;
/// Servo pulse width at 180° in microseconds.
const SERVO_MAX_PULSE_US: u32 = 2500;
/// 50Hz frame.
const SERVO_PERIOD_US: u32 = 20_000;

/// LEDC duty for a servo angle, given the channel's maximum duty.
fn servo_duty(angle: u8, max_duty: u32) -> u32 {
    let angle = u32::from(angle.min(180));
    let pulse_us = SERVO_MIN_PULSE_US + (SERVO_MAX_PULSE_US - SERVO_MIN_PULSE_US) * angle / 180;
    max_duty * pulse_us / SERVO_PERIOD_US
}

struct ServoChannel<'d> {
    driver: LedcDriver<'d>,
    attached: bool,
}

/// ESP32 board implementing every turnout hardware trait.
///
/// # Example
///
/// ```ignore
/// use rs_turnouts::hal::esp32::{pins, Esp32Board};
///
/// let mut board = Esp32Board::new();
/// board.add_output(pins::COIL_FWD, peripherals.pins.gpio6.downgrade_output())?;
/// board.add_input(pins::COIL_SENSOR_1, peripherals.pins.gpio8.downgrade())?;
/// board.add_servo(pins::SERVO, servo_driver);
/// ```
pub struct Esp32Board<'d> {
    outputs: BTreeMap<Pin, PinDriver<'d, AnyOutputPin, Output>>,
    inputs: BTreeMap<Pin, PinDriver<'d, AnyIOPin, Input>>,
    servos: BTreeMap<Pin, ServoChannel<'d>>,
    bemf: Option<Esp32Bemf<'d>>,
    bemf_sets: Vec<(BemfPins, StallDetector)>,
    bound: Option<usize>,
}

impl<'d> Esp32Board<'d> {
    /// Creates a board with nothing registered.
    pub fn new() -> Self {
        Self {
            outputs: BTreeMap::new(),
            inputs: BTreeMap::new(),
            servos: BTreeMap::new(),
            bemf: None,
            bemf_sets: Vec::new(),
            bound: None,
        }
    }

    /// Register a digital output under `number`.
    pub fn add_output(&mut self, number: Pin, pin: AnyOutputPin) -> Result<(), Esp32HalError> {
        let driver = PinDriver::output(pin)?;
        self.outputs.insert(number, driver);
        Ok(())
    }

    /// Register a digital input under `number`.
    ///
    /// Takes an I/O capable pin so the internal pull-up can be enabled.
    pub fn add_input(&mut self, number: Pin, pin: AnyIOPin) -> Result<(), Esp32HalError> {
        let driver = PinDriver::input(pin)?;
        self.inputs.insert(number, driver);
        Ok(())
    }

    /// Register a servo channel under `number`.
    ///
    /// The LEDC timer behind `driver` must run at 50Hz.
    pub fn add_servo(&mut self, number: Pin, driver: LedcDriver<'d>) {
        self.servos.insert(
            number,
            ServoChannel {
                driver,
                attached: false,
            },
        );
    }

    /// Attach the shared BEMF bridge.
    pub fn with_bemf(mut self, bridge: Esp32Bemf<'d>) -> Self {
        self.bemf = Some(bridge);
        self
    }

    /// Sample the BEMF channel once and feed the stall detector.
    ///
    /// Call every loop iteration, before updating the turnouts. Samples are
    /// only taken while the bridge is driven. Returns true if a stall was
    /// signalled.
    pub fn poll_bemf(&mut self) -> Result<bool, Esp32HalError> {
        let (Some(bridge), Some(index)) = (self.bemf.as_mut(), self.bound) else {
            return Ok(false);
        };
        let Some((_, detector)) = self.bemf_sets.get_mut(index) else {
            return Ok(false);
        };
        if !bridge.is_driven() {
            return Ok(false);
        }
        let raw = bridge.sample()?;
        Ok(detector.on_sample(raw))
    }

    /// Pins the bridge is currently bound to.
    pub fn bemf_pins(&self) -> Option<BemfPins> {
        self.bound
            .and_then(|index| self.bemf_sets.get(index))
            .map(|(pins, _)| *pins)
    }
}

impl Default for Esp32Board<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Gpio for Esp32Board<'_> {
    type Error = Esp32HalError;

    fn set_mode(&mut self, pin: Pin, mode: PinMode) -> Result<(), Self::Error> {
        match mode {
            PinMode::Output if self.outputs.contains_key(&pin) => Ok(()),
            PinMode::InputPullUp => {
                let input = self
                    .inputs
                    .get_mut(&pin)
                    .ok_or(Esp32HalError::UnknownPin(pin))?;
                input.set_pull(Pull::Up)?;
                Ok(())
            }
            PinMode::Output => Err(Esp32HalError::UnknownPin(pin)),
        }
    }

    fn write(&mut self, pin: Pin, level: Level) -> Result<(), Self::Error> {
        let output = self
            .outputs
            .get_mut(&pin)
            .ok_or(Esp32HalError::UnknownPin(pin))?;
        match level {
            Level::High => output.set_high()?,
            Level::Low => output.set_low()?,
        }
        Ok(())
    }

    fn read(&mut self, pin: Pin) -> Result<Level, Self::Error> {
        if let Some(input) = self.inputs.get(&pin) {
            return Ok(Level::from(input.is_high()));
        }
        if let Some(output) = self.outputs.get(&pin) {
            return Ok(Level::from(output.is_set_high()));
        }
        Err(Esp32HalError::UnknownPin(pin))
    }
}

impl ServoOutput for Esp32Board<'_> {
    fn servo_attach(&mut self, pin: Pin) -> Result<(), Self::Error> {
        let servo = self
            .servos
            .get_mut(&pin)
            .ok_or(Esp32HalError::UnknownPin(pin))?;
        servo.driver.enable()?;
        servo.attached = true;
        Ok(())
    }

    fn servo_write(&mut self, pin: Pin, angle: u8) -> Result<(), Self::Error> {
        let servo = self
            .servos
            .get_mut(&pin)
            .ok_or(Esp32HalError::UnknownPin(pin))?;
        if !servo.attached {
            return Err(Esp32HalError::NotAttached(pin));
        }
        let duty = servo_duty(angle, servo.driver.get_max_duty());
        servo.driver.set_duty(duty)?;
        Ok(())
    }
}

impl BemfBridge for Esp32Board<'_> {
    fn bemf_init(&mut self, pins: BemfPins, detector: StallDetector) -> Result<(), Self::Error> {
        let bridge = self.bemf.as_mut().ok_or(Esp32HalError::NoBemfBridge)?;
        bridge.drive(0.0, Direction::Stopped)?;
        let index = match self.bemf_sets.iter().position(|(p, _)| *p == pins) {
            Some(index) => {
                self.bemf_sets[index].1 = detector;
                index
            }
            None => {
                self.bemf_sets.push((pins, detector));
                self.bemf_sets.len() - 1
            }
        };
        self.bound = Some(index);
        Ok(())
    }

    fn bemf_drive(
        &mut self,
        pins: BemfPins,
        duty: f32,
        direction: Direction,
    ) -> Result<(), Self::Error> {
        let bridge = self.bemf.as_mut().ok_or(Esp32HalError::NoBemfBridge)?;
        let index = self
            .bemf_sets
            .iter()
            .position(|(p, _)| *p == pins)
            .ok_or(Esp32HalError::UnknownPin(pins.pwm_forward))?;
        bridge.drive(duty, direction)?;
        self.bound = Some(index);
        Ok(())
    }
}
