//! Motor technologies that can drive a turnout.
//!
//! A [`TurnoutActuator`](crate::TurnoutActuator) owns exactly one [`Motor`]:
//!
//! | Variant | Drive | Arrival feedback |
//! |---------|-------|------------------|
//! | [`ServoMotor`] | 1° steps every `servo_step_ms` | End-position sensors |
//! | [`CoilMotor`] | Repeating on/off pulse on one of two coils | End-position sensors |
//! | [`BemfMotor`] | Full duty on the shared bridge | [`StallDetector`] |
//!
//! Motors only know how to drive; deciding *when* to start, step and stop
//! is the actuator's job. Every method takes the board as a parameter so
//! several turnouts can share one [`TurnoutHal`](crate::traits::TurnoutHal).

extern crate alloc;
use alloc::sync::Arc;

use crate::arbiter::BemfArbiter;
use crate::commands::Position;
use crate::config::{ServoConfig, StallConfig, TimingConfig};
use crate::stall::StallDetector;
use crate::traits::{BemfBridge, Direction, Gpio, Level, Pin, PinMode, ServoOutput};

// ============================================================================
// Pin Sets
// ============================================================================

/// End-position sensor inputs (active low).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorPins {
    /// Asserted when the points sit in position 1.
    pub pos1: Pin,
    /// Asserted when the points sit in position 2.
    pub pos2: Pin,
}

impl SensorPins {
    /// Creates a sensor pair.
    pub const fn new(pos1: Pin, pos2: Pin) -> Self {
        Self { pos1, pos2 }
    }

    /// Sensor reporting `position`.
    #[inline]
    pub const fn pin_for(&self, position: Position) -> Pin {
        match position {
            Position::Pos1 => self.pos1,
            Position::Pos2 => self.pos2,
        }
    }
}

/// Full wiring of one coil turnout: two coil outputs plus two sensors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CoilPins {
    /// Coil pulled for position 1.
    pub forward: Pin,
    /// Coil pulled for position 2.
    pub reverse: Pin,
    /// End-position sensors.
    pub sensors: SensorPins,
}

impl CoilPins {
    /// Creates a coil pin set.
    pub const fn new(forward: Pin, reverse: Pin, sensor1: Pin, sensor2: Pin) -> Self {
        Self {
            forward,
            reverse,
            sensors: SensorPins::new(sensor1, sensor2),
        }
    }
}

/// Pins of the shared BEMF bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BemfPins {
    /// PWM output for forward drive.
    pub pwm_forward: Pin,
    /// PWM output for reverse drive.
    pub pwm_reverse: Pin,
    /// ADC input sampled while driving forward.
    pub sense_forward: Pin,
    /// ADC input sampled while driving reverse.
    pub sense_reverse: Pin,
}

impl BemfPins {
    /// Creates a BEMF pin set.
    pub const fn new(pwm_forward: Pin, pwm_reverse: Pin, sense_forward: Pin, sense_reverse: Pin) -> Self {
        Self {
            pwm_forward,
            pwm_reverse,
            sense_forward,
            sense_reverse,
        }
    }
}

// ============================================================================
// Servo
// ============================================================================

/// Hobby servo swinging the points one degree at a time.
///
/// Position 1 is `angle_min`, position 2 is `angle_max`. The servo never
/// reports arrival on its own; reaching a bound is not treated as arrival.
#[derive(Clone, Debug)]
pub struct ServoMotor {
    pin: Pin,
    config: ServoConfig,
    angle: u8,
    last_step_ms: Option<u64>,
}

impl ServoMotor {
    /// Creates a servo at `angle_min`.
    pub fn new(pin: Pin, config: ServoConfig) -> Self {
        // Normalize in case the fields were set directly
        let config = ServoConfig::new(config.angle_min, config.angle_max);
        Self {
            pin,
            config,
            angle: config.angle_min,
            last_step_ms: None,
        }
    }

    /// Attach the servo and move it to its current angle.
    pub fn begin<H: ServoOutput>(&mut self, hal: &mut H) -> Result<(), H::Error> {
        hal.servo_attach(self.pin)?;
        hal.servo_write(self.pin, self.angle)
    }

    /// Advance one degree toward `toward` once strictly more than the step
    /// delay has passed since the last step.
    ///
    /// The first call of a move steps immediately.
    pub fn step<H: ServoOutput>(
        &mut self,
        hal: &mut H,
        toward: Position,
        now_ms: u64,
        timing: &TimingConfig,
    ) -> Result<(), H::Error> {
        if let Some(last) = self.last_step_ms {
            if now_ms.saturating_sub(last) <= u64::from(timing.servo_step_ms) {
                return Ok(());
            }
        }

        let next = match toward {
            Position::Pos1 => self.angle.saturating_sub(1).max(self.config.angle_min),
            Position::Pos2 => self.angle.saturating_add(1).min(self.config.angle_max),
        };
        hal.servo_write(self.pin, next)?;
        self.angle = next;
        self.last_step_ms = Some(now_ms);
        Ok(())
    }

    /// End the move. The servo holds its angle.
    pub fn stop(&mut self) {
        self.last_step_ms = None;
    }

    /// Current commanded angle.
    #[inline]
    pub fn angle(&self) -> u8 {
        self.angle
    }

    /// Travel limits.
    #[inline]
    pub fn config(&self) -> &ServoConfig {
        &self.config
    }

    /// Servo signal pin.
    #[inline]
    pub fn pin(&self) -> Pin {
        self.pin
    }
}

// ============================================================================
// Coil
// ============================================================================

/// Phase of the coil pulse timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CoilPhase {
    /// No pulse in progress; the next step fires.
    #[default]
    Off,
    /// Coil is energized, waiting for `pulse_on_ms` to pass.
    OnWaiting,
    /// Coil released, resting until the period is over.
    OnElapsed,
}

/// Bistable double-coil drive.
///
/// Each step performs at most one time comparison, so a single tick can
/// never both raise and drop the coil.
#[derive(Clone, Debug)]
pub struct CoilMotor {
    forward: Pin,
    reverse: Pin,
    phase: CoilPhase,
    pulse_start_ms: u64,
}

impl CoilMotor {
    /// Creates a coil drive on two output pins.
    pub fn new(forward: Pin, reverse: Pin) -> Self {
        Self {
            forward,
            reverse,
            phase: CoilPhase::Off,
            pulse_start_ms: 0,
        }
    }

    /// Configure both coil outputs and drive them low.
    pub fn begin<H: Gpio>(&mut self, hal: &mut H) -> Result<(), H::Error> {
        hal.set_mode(self.forward, PinMode::Output)?;
        hal.set_mode(self.reverse, PinMode::Output)?;
        self.stop(hal)
    }

    fn coil_for(&self, position: Position) -> Pin {
        match position {
            Position::Pos1 => self.forward,
            Position::Pos2 => self.reverse,
        }
    }

    /// Advance the pulse timer by one tick.
    pub fn step<H: Gpio>(
        &mut self,
        hal: &mut H,
        toward: Position,
        now_ms: u64,
        timing: &TimingConfig,
    ) -> Result<(), H::Error> {
        let coil = self.coil_for(toward);
        let elapsed = now_ms.saturating_sub(self.pulse_start_ms);

        match self.phase {
            CoilPhase::Off => {
                hal.write(coil, Level::High)?;
                self.pulse_start_ms = now_ms;
                self.phase = CoilPhase::OnWaiting;
            }
            CoilPhase::OnWaiting => {
                if elapsed >= u64::from(timing.coil_pulse_on_ms) {
                    hal.write(coil, Level::Low)?;
                    self.phase = CoilPhase::OnElapsed;
                }
            }
            CoilPhase::OnElapsed => {
                if elapsed >= u64::from(timing.coil_period_ms()) {
                    hal.write(coil, Level::High)?;
                    self.pulse_start_ms = now_ms;
                    self.phase = CoilPhase::OnWaiting;
                }
            }
        }
        Ok(())
    }

    /// Drop both coils and reset the pulse timer.
    pub fn stop<H: Gpio>(&mut self, hal: &mut H) -> Result<(), H::Error> {
        hal.write(self.forward, Level::Low)?;
        hal.write(self.reverse, Level::Low)?;
        self.phase = CoilPhase::Off;
        Ok(())
    }

    /// Current pulse phase.
    #[inline]
    pub fn phase(&self) -> CoilPhase {
        self.phase
    }

    /// `(forward, reverse)` coil pins.
    #[inline]
    pub fn pins(&self) -> (Pin, Pin) {
        (self.forward, self.reverse)
    }
}

// ============================================================================
// BEMF
// ============================================================================

/// DC motor on the shared BEMF bridge.
///
/// Runs at full duty for the whole move. The end of travel is reported by
/// the [`StallDetector`] through the shared [`BemfArbiter`].
#[derive(Debug)]
pub struct BemfMotor {
    pins: BemfPins,
    stall: StallConfig,
    arbiter: Arc<BemfArbiter>,
}

impl BemfMotor {
    /// Creates a BEMF drive using the board-wide `arbiter`.
    pub fn new(pins: BemfPins, stall: StallConfig, arbiter: Arc<BemfArbiter>) -> Self {
        Self {
            pins,
            stall,
            arbiter,
        }
    }

    /// Replace the stall thresholds. Takes effect at the next `begin`.
    pub fn with_stall(mut self, stall: StallConfig) -> Self {
        self.stall = stall;
        self
    }

    /// Register the bridge and a stall detector, then make sure it is off.
    pub fn begin<H: BemfBridge>(&mut self, hal: &mut H) -> Result<(), H::Error> {
        let detector = StallDetector::new(self.stall, Arc::clone(&self.arbiter));
        hal.bemf_init(self.pins, detector)?;
        hal.bemf_drive(self.pins, 0.0, Direction::Stopped)
    }

    /// Drive at full duty toward `toward`. The caller must hold the slot.
    pub fn energize<H: BemfBridge>(&mut self, hal: &mut H, toward: Position) -> Result<(), H::Error> {
        hal.bemf_drive(self.pins, 1.0, toward.drive_direction())
    }

    /// Turn the bridge off, drain the end bit and give the slot back.
    ///
    /// If the bridge write fails the slot stays held, so no other turnout
    /// can energize a bridge that may still be driven.
    pub fn stop<H: BemfBridge>(&mut self, hal: &mut H, id: u16) -> Result<(), H::Error> {
        hal.bemf_drive(self.pins, 0.0, Direction::Stopped)?;
        self.arbiter.take_end(id);
        self.arbiter.release(id);
        Ok(())
    }

    /// Stall thresholds handed to the detector.
    #[inline]
    pub fn stall(&self) -> &StallConfig {
        &self.stall
    }

    /// The arbiter shared with every other BEMF turnout on the board.
    #[inline]
    pub fn arbiter(&self) -> &Arc<BemfArbiter> {
        &self.arbiter
    }

    /// Bridge pins.
    #[inline]
    pub fn pins(&self) -> BemfPins {
        self.pins
    }
}

// ============================================================================
// Motor
// ============================================================================

/// Motor technology tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorKind {
    /// Hobby servo.
    Servo,
    /// Double coil.
    Coil,
    /// DC motor with BEMF stall sensing.
    Bemf,
}

impl MotorKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MotorKind::Servo => "servo",
            MotorKind::Coil => "coil",
            MotorKind::Bemf => "bemf",
        }
    }
}

/// The motor of one turnout. The variant never changes after construction.
#[derive(Debug)]
pub enum Motor {
    /// Servo drive.
    Servo(ServoMotor),
    /// Coil drive.
    Coil(CoilMotor),
    /// BEMF drive.
    Bemf(BemfMotor),
}

impl Motor {
    /// Technology of this motor.
    pub fn kind(&self) -> MotorKind {
        match self {
            Motor::Servo(_) => MotorKind::Servo,
            Motor::Coil(_) => MotorKind::Coil,
            Motor::Bemf(_) => MotorKind::Bemf,
        }
    }

    /// One-time hardware setup.
    pub fn begin<H>(&mut self, hal: &mut H) -> Result<(), H::Error>
    where
        H: ServoOutput + BemfBridge,
    {
        match self {
            Motor::Servo(servo) => servo.begin(hal),
            Motor::Coil(coil) => coil.begin(hal),
            Motor::Bemf(bemf) => bemf.begin(hal),
        }
    }

    /// Advance the drive by one tick. BEMF motors run continuously and
    /// have nothing to step.
    pub fn step<H>(
        &mut self,
        hal: &mut H,
        toward: Position,
        now_ms: u64,
        timing: &TimingConfig,
    ) -> Result<(), H::Error>
    where
        H: ServoOutput + BemfBridge,
    {
        match self {
            Motor::Servo(servo) => servo.step(hal, toward, now_ms, timing),
            Motor::Coil(coil) => coil.step(hal, toward, now_ms, timing),
            Motor::Bemf(_) => Ok(()),
        }
    }

    /// De-energize. `id` identifies the slot holder for BEMF motors.
    pub fn stop<H>(&mut self, hal: &mut H, id: u16) -> Result<(), H::Error>
    where
        H: ServoOutput + BemfBridge,
    {
        match self {
            Motor::Servo(servo) => {
                servo.stop();
                Ok(())
            }
            Motor::Coil(coil) => coil.stop(hal),
            Motor::Bemf(bemf) => bemf.stop(hal, id),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockHal;

    fn timing() -> TimingConfig {
        TimingConfig::default()
    }

    // =========================================================================
    // Servo Tests
    // =========================================================================

    #[test]
    fn servo_starts_at_min_and_writes_on_begin() {
        let mut hal = MockHal::new();
        let mut servo = ServoMotor::new(9, ServoConfig::default());
        servo.begin(&mut hal).unwrap();

        assert!(hal.servo_attached(9));
        assert_eq!(hal.servo_angle(9), Some(30));
        assert_eq!(servo.angle(), 30);
    }

    #[test]
    fn servo_first_step_is_immediate_then_paced() {
        let mut hal = MockHal::new();
        let mut servo = ServoMotor::new(9, ServoConfig::default());
        let t = timing();

        servo.step(&mut hal, Position::Pos2, 100, &t).unwrap();
        assert_eq!(servo.angle(), 31);

        servo.step(&mut hal, Position::Pos2, 120, &t).unwrap();
        assert_eq!(servo.angle(), 31);

        servo.step(&mut hal, Position::Pos2, 121, &t).unwrap();
        assert_eq!(servo.angle(), 32);
        assert_eq!(hal.servo_angle(9), Some(32));
    }

    #[test]
    fn servo_clamps_at_bounds() {
        let mut hal = MockHal::new();
        let mut servo = ServoMotor::new(9, ServoConfig::new(30, 32));
        let t = timing();

        for i in 0..10 {
            servo.step(&mut hal, Position::Pos2, i * 25, &t).unwrap();
        }
        assert_eq!(servo.angle(), 32);

        for i in 10..20 {
            servo.step(&mut hal, Position::Pos1, i * 25, &t).unwrap();
        }
        assert_eq!(servo.angle(), 30);
    }

    #[test]
    fn servo_stop_resets_pacing() {
        let mut hal = MockHal::new();
        let mut servo = ServoMotor::new(9, ServoConfig::default());
        let t = timing();

        servo.step(&mut hal, Position::Pos2, 0, &t).unwrap();
        servo.stop();
        servo.step(&mut hal, Position::Pos2, 1, &t).unwrap();
        assert_eq!(servo.angle(), 32);
    }

    #[test]
    fn servo_normalizes_reversed_config() {
        let servo = ServoMotor::new(
            9,
            ServoConfig {
                angle_min: 120,
                angle_max: 60,
            },
        );
        assert_eq!(servo.angle(), 60);
        assert_eq!(servo.config().angle_max, 120);
    }

    // =========================================================================
    // Coil Tests
    // =========================================================================

    #[test]
    fn coil_begin_configures_outputs_low() {
        let mut hal = MockHal::new();
        let mut coil = CoilMotor::new(4, 5);
        coil.begin(&mut hal).unwrap();

        assert_eq!(hal.pin_mode(4), Some(PinMode::Output));
        assert_eq!(hal.pin_mode(5), Some(PinMode::Output));
        assert_eq!(hal.output_level(4), Level::Low);
        assert_eq!(hal.output_level(5), Level::Low);
    }

    #[test]
    fn coil_pulse_cycle() {
        let mut hal = MockHal::new();
        let mut coil = CoilMotor::new(4, 5);
        let t = timing();

        coil.step(&mut hal, Position::Pos1, 1000, &t).unwrap();
        assert_eq!(coil.phase(), CoilPhase::OnWaiting);
        assert_eq!(hal.output_level(4), Level::High);

        coil.step(&mut hal, Position::Pos1, 1049, &t).unwrap();
        assert_eq!(hal.output_level(4), Level::High);

        coil.step(&mut hal, Position::Pos1, 1050, &t).unwrap();
        assert_eq!(coil.phase(), CoilPhase::OnElapsed);
        assert_eq!(hal.output_level(4), Level::Low);

        coil.step(&mut hal, Position::Pos1, 1199, &t).unwrap();
        assert_eq!(hal.output_level(4), Level::Low);

        coil.step(&mut hal, Position::Pos1, 1200, &t).unwrap();
        assert_eq!(coil.phase(), CoilPhase::OnWaiting);
        assert_eq!(hal.output_level(4), Level::High);
        assert_eq!(hal.output_level(5), Level::Low);
    }

    #[test]
    fn coil_late_tick_drops_without_refiring() {
        let mut hal = MockHal::new();
        let mut coil = CoilMotor::new(4, 5);
        let t = timing();

        coil.step(&mut hal, Position::Pos2, 0, &t).unwrap();
        // Far past the whole period: only one transition per tick
        coil.step(&mut hal, Position::Pos2, 500, &t).unwrap();
        assert_eq!(coil.phase(), CoilPhase::OnElapsed);
        assert_eq!(hal.output_level(5), Level::Low);
    }

    #[test]
    fn coil_stop_drops_both_pins() {
        let mut hal = MockHal::new();
        let mut coil = CoilMotor::new(4, 5);
        let t = timing();

        coil.step(&mut hal, Position::Pos2, 0, &t).unwrap();
        assert_eq!(hal.output_level(5), Level::High);

        coil.stop(&mut hal).unwrap();
        assert_eq!(coil.phase(), CoilPhase::Off);
        assert_eq!(hal.output_level(4), Level::Low);
        assert_eq!(hal.output_level(5), Level::Low);
    }

    // =========================================================================
    // BEMF Tests
    // =========================================================================

    #[test]
    fn bemf_begin_registers_detector_and_stops() {
        let mut hal = MockHal::new();
        let arbiter = Arc::new(BemfArbiter::new());
        let pins = BemfPins::new(25, 26, 34, 35);
        let mut bemf = BemfMotor::new(pins, StallConfig::default(), arbiter);
        bemf.begin(&mut hal).unwrap();

        assert_eq!(hal.bemf_pins(), Some(pins));
        assert!(hal.has_stall_detector());
        assert_eq!(hal.bemf_direction(), Direction::Stopped);
    }

    #[test]
    fn bemf_stop_releases_slot() {
        let mut hal = MockHal::new();
        let arbiter = Arc::new(BemfArbiter::new());
        let mut bemf = BemfMotor::new(
            BemfPins::new(25, 26, 34, 35),
            StallConfig::default(),
            arbiter.clone(),
        );

        arbiter.try_acquire(3).unwrap();
        bemf.energize(&mut hal, Position::Pos2).unwrap();
        assert_eq!(hal.bemf_direction(), Direction::Reverse);
        assert_eq!(hal.bemf_duty(), 1.0);

        bemf.stop(&mut hal, 3).unwrap();
        assert_eq!(hal.bemf_direction(), Direction::Stopped);
        assert!(!arbiter.is_busy());
    }

    #[test]
    fn bemf_failed_stop_keeps_slot_and_end() {
        let mut hal = MockHal::new();
        let arbiter = Arc::new(BemfArbiter::new());
        let mut bemf = BemfMotor::new(
            BemfPins::new(25, 26, 34, 35),
            StallConfig::default(),
            arbiter.clone(),
        );

        arbiter.try_acquire(3).unwrap();
        bemf.energize(&mut hal, Position::Pos1).unwrap();
        arbiter.signal_end();

        hal.fail = true;
        assert!(bemf.stop(&mut hal, 3).is_err());
        assert_eq!(arbiter.holder(), Some(3));
        assert!(arbiter.end_pending(3));
        assert!(hal.bemf_driven());

        hal.fail = false;
        bemf.stop(&mut hal, 3).unwrap();
        assert!(!arbiter.is_busy());
        assert!(!arbiter.end_detected());
    }

    #[test]
    fn bemf_drives_its_own_pins() {
        let mut hal = MockHal::new();
        let arbiter = Arc::new(BemfArbiter::new());
        let x = BemfPins::new(10, 11, 12, 13);
        let y = BemfPins::new(20, 21, 22, 23);
        let mut bemf_x = BemfMotor::new(x, StallConfig::default(), arbiter.clone());
        let mut bemf_y = BemfMotor::new(y, StallConfig::default(), arbiter.clone());
        bemf_x.begin(&mut hal).unwrap();
        bemf_y.begin(&mut hal).unwrap();
        assert_eq!(hal.bemf_pins(), Some(y));

        arbiter.try_acquire(1).unwrap();
        bemf_x.energize(&mut hal, Position::Pos2).unwrap();
        assert_eq!(hal.bemf_pins(), Some(x));
    }

    // =========================================================================
    // Motor Enum Tests
    // =========================================================================

    #[test]
    fn motor_kind_tags() {
        let servo = Motor::Servo(ServoMotor::new(1, ServoConfig::default()));
        let coil = Motor::Coil(CoilMotor::new(1, 2));
        assert_eq!(servo.kind(), MotorKind::Servo);
        assert_eq!(coil.kind().as_str(), "coil");
    }

    #[test]
    fn sensor_pins_lookup() {
        let sensors = SensorPins::new(7, 8);
        assert_eq!(sensors.pin_for(Position::Pos1), 7);
        assert_eq!(sensors.pin_for(Position::Pos2), 8);
    }
}
