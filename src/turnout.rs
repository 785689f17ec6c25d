//! Per-turnout actuation state machine.
//!
//! This module provides [`TurnoutActuator`], which turns a requested end
//! position into timed drive commands for one [`Motor`], watches for
//! arrival, and gives up after a timeout.
//!
//! # State Machine
//!
//! ```text
//!            target set, not already there
//!   Idle ──────────────────────────────────▶ MovingToPosN
//!    ▲                                          │
//!    │  sensor active / stall detected  (Arrived)
//!    ├──────────────────────────────────────────┤
//!    │  now - start > timeout        (MoveTimeout)
//!    └──────────────────────────────────────────┘
//! ```
//!
//! While moving, every tick that sees neither arrival nor timeout steps
//! the motor. A target change in the middle of a move is honored only
//! after the current leg ends.
//!
//! # Example
//!
//! ```rust
//! use rs_turnouts::{TurnoutActuator, Position, State, hal::MockHal};
//! use rs_turnouts::config::ServoConfig;
//!
//! let mut hal = MockHal::new();
//! let mut turnout = TurnoutActuator::new_servo(1, "W1", 9, 2, 3, ServoConfig::default());
//! turnout.begin(&mut hal).unwrap();
//!
//! turnout.set_position(2).unwrap();
//! let event = turnout.update(&mut hal, 0).unwrap();
//! assert!(event.is_some()); // move started
//! assert_eq!(turnout.state(), State::MovingToPos2);
//!
//! // Sensor 2 closes: the next tick reports arrival
//! hal.set_sensor(3, true);
//! turnout.update(&mut hal, 40).unwrap();
//! assert_eq!(turnout.state(), State::Idle);
//! assert_eq!(turnout.position(), Some(Position::Pos2));
//! ```

extern crate alloc;
use alloc::sync::Arc;

use crate::arbiter::BemfArbiter;
use crate::commands::{Position, RejectReason};
use crate::config::{short_string, ServoConfig, ShortString, StallConfig, TimingConfig};
use crate::motor::{BemfMotor, BemfPins, CoilMotor, Motor, MotorKind, SensorPins, ServoMotor};
use crate::traits::{EventKind, PinMode, TurnoutEvent, TurnoutHal};

/// Actuator state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Motor de-energized.
    #[default]
    Idle,
    /// Driving toward position 1.
    MovingToPos1,
    /// Driving toward position 2.
    MovingToPos2,
}

impl State {
    /// Moving state for `position`.
    pub const fn moving_to(position: Position) -> Self {
        match position {
            Position::Pos1 => State::MovingToPos1,
            Position::Pos2 => State::MovingToPos2,
        }
    }

    /// Position being driven to, or `None` when idle.
    pub const fn heading(self) -> Option<Position> {
        match self {
            State::Idle => None,
            State::MovingToPos1 => Some(Position::Pos1),
            State::MovingToPos2 => Some(Position::Pos2),
        }
    }

    /// Returns true unless idle.
    pub const fn is_moving(self) -> bool {
        !matches!(self, State::Idle)
    }

    /// Returns the state as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::MovingToPos1 => "moving_to_pos1",
            State::MovingToPos2 => "moving_to_pos2",
        }
    }
}

/// Feedback sampled once at the start of each tick.
#[derive(Clone, Copy, Debug, Default)]
struct Feedback {
    sensor1: bool,
    sensor2: bool,
    end_detected: bool,
}

impl Feedback {
    fn sensor(&self, position: Position) -> bool {
        match position {
            Position::Pos1 => self.sensor1,
            Position::Pos2 => self.sensor2,
        }
    }
}

/// One turnout: a motor, optional end sensors and the position state machine.
///
/// # Lifecycle
///
/// 1. Construct with one of [`new_servo`](Self::new_servo),
///    [`new_coil`](Self::new_coil) or [`new_bemf`](Self::new_bemf).
/// 2. Call [`begin`](Self::begin) once.
/// 3. Call [`update`](Self::update) every tick (below 10 ms for coils)
///    and hand any returned event to an [`EventSink`](crate::traits::EventSink).
///
/// # Errors
///
/// Hardware errors are propagated unchanged. A transition is committed only
/// after its hardware writes succeed, so a failed tick can simply be retried.
#[derive(Debug)]
pub struct TurnoutActuator {
    id: u16,
    name: ShortString,
    motor: Motor,
    sensors: Option<SensorPins>,
    timing: TimingConfig,
    state: State,
    target: Option<Position>,
    position: Option<Position>,
    move_start_ms: u64,
    busy_reported: bool,
}

impl TurnoutActuator {
    /// Create an actuator from an already-built motor.
    pub fn new(id: u16, name: &str, motor: Motor, sensors: Option<SensorPins>) -> Self {
        Self {
            id,
            name: short_string(name),
            motor,
            sensors,
            timing: TimingConfig::default(),
            state: State::Idle,
            target: None,
            position: None,
            move_start_ms: 0,
            busy_reported: false,
        }
    }

    /// Servo turnout with end sensors on `sensor1` / `sensor2`.
    pub fn new_servo(
        id: u16,
        name: &str,
        pin: u8,
        sensor1: u8,
        sensor2: u8,
        servo: ServoConfig,
    ) -> Self {
        Self::new(
            id,
            name,
            Motor::Servo(ServoMotor::new(pin, servo)),
            Some(SensorPins::new(sensor1, sensor2)),
        )
    }

    /// Double-coil turnout with end sensors on `sensor1` / `sensor2`.
    pub fn new_coil(id: u16, name: &str, pin_forward: u8, pin_reverse: u8, sensor1: u8, sensor2: u8) -> Self {
        Self::new(
            id,
            name,
            Motor::Coil(CoilMotor::new(pin_forward, pin_reverse)),
            Some(SensorPins::new(sensor1, sensor2)),
        )
    }

    /// BEMF turnout on the board's shared bridge, with default stall thresholds.
    ///
    /// Every BEMF turnout on a board must share the same `arbiter`.
    pub fn new_bemf(id: u16, name: &str, pins: BemfPins, arbiter: Arc<BemfArbiter>) -> Self {
        Self::new(
            id,
            name,
            Motor::Bemf(BemfMotor::new(pins, StallConfig::default(), arbiter)),
            None,
        )
    }

    /// Override movement timing.
    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// Override the stall thresholds of a BEMF turnout.
    ///
    /// Servo and coil turnouts have no stall detector and ignore this.
    pub fn with_stall(mut self, stall: StallConfig) -> Self {
        self.motor = match self.motor {
            Motor::Bemf(bemf) => Motor::Bemf(bemf.with_stall(stall)),
            other => other,
        };
        self
    }

    /// One-time hardware setup: sensor inputs, then the motor.
    pub fn begin<H: TurnoutHal>(&mut self, hal: &mut H) -> Result<(), H::Error> {
        if let Some(sensors) = self.sensors {
            hal.set_mode(sensors.pos1, PinMode::InputPullUp)?;
            hal.set_mode(sensors.pos2, PinMode::InputPullUp)?;
        }
        self.motor.begin(hal)?;
        self.state = State::Idle;
        Ok(())
    }

    /// Request an end position from its wire value (`1` or `2`).
    ///
    /// Anything else is rejected and leaves the actuator untouched.
    pub fn set_position(&mut self, position: u8) -> Result<Position, RejectReason> {
        let position = Position::try_from(position)?;
        self.request(position);
        Ok(position)
    }

    /// Request an end position. Repeating the current target is a no-op.
    pub fn request(&mut self, position: Position) {
        if self.target != Some(position) {
            self.target = Some(position);
            self.busy_reported = false;
        }
    }

    /// Advance the state machine by one tick.
    pub fn update<H: TurnoutHal>(
        &mut self,
        hal: &mut H,
        now_ms: u64,
    ) -> Result<Option<TurnoutEvent>, H::Error> {
        let feedback = self.sample(hal)?;

        match self.state.heading() {
            None => self.try_start(hal, now_ms, &feedback),
            Some(toward) => self.drive(hal, toward, now_ms, &feedback),
        }
    }

    fn sample<H: TurnoutHal>(&mut self, hal: &mut H) -> Result<Feedback, H::Error> {
        let mut feedback = Feedback::default();
        if let Some(sensors) = self.sensors {
            feedback.sensor1 = hal.is_active_low(sensors.pos1)?;
            feedback.sensor2 = hal.is_active_low(sensors.pos2)?;
        }
        if let (Motor::Bemf(bemf), true) = (&self.motor, self.state.is_moving()) {
            // Drained by the motor only once the bridge is really off
            feedback.end_detected = bemf.arbiter().end_pending(self.id);
        }
        Ok(feedback)
    }

    fn already_at(&self, position: Position, feedback: &Feedback) -> bool {
        if self.sensors.is_some() {
            feedback.sensor(position)
        } else {
            self.position == Some(position)
        }
    }

    fn try_start<H: TurnoutHal>(
        &mut self,
        hal: &mut H,
        now_ms: u64,
        feedback: &Feedback,
    ) -> Result<Option<TurnoutEvent>, H::Error> {
        let Some(target) = self.target else {
            return Ok(None);
        };
        if self.already_at(target, feedback) {
            self.position = Some(target);
            return Ok(None);
        }

        if let Motor::Bemf(bemf) = &mut self.motor {
            if let Err(holder) = bemf.arbiter().try_acquire(self.id) {
                if self.busy_reported {
                    return Ok(None);
                }
                self.busy_reported = true;
                return Ok(Some(self.event(EventKind::ResourceBusy {
                    target,
                    holder: Some(holder),
                })));
            }
            if let Err(e) = bemf.energize(hal, target) {
                bemf.arbiter().release(self.id);
                return Err(e);
            }
        }

        self.state = State::moving_to(target);
        self.move_start_ms = now_ms;
        self.position = None;
        self.busy_reported = false;
        Ok(Some(self.event(EventKind::MoveStarted { target })))
    }

    fn drive<H: TurnoutHal>(
        &mut self,
        hal: &mut H,
        toward: Position,
        now_ms: u64,
        feedback: &Feedback,
    ) -> Result<Option<TurnoutEvent>, H::Error> {
        let arrived = match self.motor {
            Motor::Bemf(_) => feedback.end_detected,
            _ => feedback.sensor(toward),
        };

        if arrived {
            self.motor.stop(hal, self.id)?;
            self.state = State::Idle;
            self.position = Some(toward);
            return Ok(Some(self.event(EventKind::Arrived { position: toward })));
        }

        if now_ms.saturating_sub(self.move_start_ms) > u64::from(self.timing.timeout_ms) {
            self.motor.stop(hal, self.id)?;
            self.state = State::Idle;
            self.position = None;
            // Abandon the request; a jammed turnout is not re-driven until asked again
            if self.target == Some(toward) {
                self.target = None;
            }
            return Ok(Some(self.event(EventKind::MoveTimeout { target: toward })));
        }

        self.motor.step(hal, toward, now_ms, &self.timing)?;
        Ok(None)
    }

    fn event(&self, kind: EventKind) -> TurnoutEvent {
        TurnoutEvent {
            id: self.id,
            name: self.name.clone(),
            kind,
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Actuator id.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Actuator name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Requested position, if any.
    pub fn target(&self) -> Option<Position> {
        self.target
    }

    /// Last confirmed end position.
    ///
    /// Cleared when a move starts or times out.
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    /// Returns true while a move is in progress.
    pub fn is_moving(&self) -> bool {
        self.state.is_moving()
    }

    /// Motor technology.
    pub fn kind(&self) -> MotorKind {
        self.motor.kind()
    }

    /// The motor.
    pub fn motor(&self) -> &Motor {
        &self.motor
    }

    /// Commanded servo angle, for servo turnouts.
    pub fn servo_angle(&self) -> Option<u8> {
        match &self.motor {
            Motor::Servo(servo) => Some(servo.angle()),
            _ => None,
        }
    }

    /// End sensors, if fitted.
    pub fn sensors(&self) -> Option<SensorPins> {
        self.sensors
    }

    /// Movement timing.
    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }
}

// ============================================================================
// Tests
// ============================================================================
