//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for all hardware traits and an
//! event recorder, enabling development and testing on desktop without
//! physical turnouts.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockHal`] | [`Gpio`], [`ServoOutput`], [`BemfBridge`] | Pin levels, simulated sensors, servo angles, BEMF bridge |
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//! | [`MockEvents`] | [`EventSink`] | Records emitted events |
//!
//! # Example
//!
//! ```rust
//! use rs_turnouts::{TurnoutActuator, Position, State};
//! use rs_turnouts::hal::{MockClock, MockEvents, MockHal};
//! use rs_turnouts::traits::{Clock, EventSink, Level};
//!
//! let mut hal = MockHal::new();
//! let mut clock = MockClock::new();
//! let mut events = MockEvents::new();
//!
//! let mut turnout = TurnoutActuator::new_coil(1, "W1", 4, 5, 6, 7);
//! turnout.begin(&mut hal).unwrap();
//! turnout.request(Position::Pos1);
//!
//! for _ in 0..3 {
//!     let event = turnout.update(&mut hal, clock.now_ms()).unwrap();
//!     events.emit_opt(event.as_ref());
//!     clock.advance(5);
//! }
//!
//! assert_eq!(turnout.state(), State::MovingToPos1);
//! assert_eq!(hal.output_level(4), Level::High);
//! assert_eq!(events.count("move_started"), 1);
//! ```

extern crate alloc;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

use crate::motor::BemfPins;
use crate::stall::StallDetector;
use crate::traits::{
    BemfBridge, Clock, Direction, EventKind, EventSink, Gpio, Level, Pin, PinMode, ServoOutput,
    TurnoutEvent,
};

// ============================================================================
// Hardware Mocks
// ============================================================================

/// Mock board implementing every hardware trait.
///
/// Sensors are simulated with [`set_sensor`](Self::set_sensor); an active
/// sensor reads [`Level::Low`], like a switch to ground with the pull-up
/// enabled. BEMF samples are injected with [`feed_bemf`](Self::feed_bemf).
///
/// Set [`fail`](Self::fail) to make every hardware call return `Err(())`,
/// or [`fail_pin`](Self::fail_pin) to break a single GPIO.
///
/// Every BEMF pin set passed to `bemf_init` keeps its own detector. The
/// bridge is bound to whichever set was driven last.
///
/// # Example
///
/// ```rust
/// use rs_turnouts::hal::MockHal;
/// use rs_turnouts::traits::{Gpio, Level, PinMode, ServoOutput};
///
/// let mut hal = MockHal::new();
/// hal.set_mode(2, PinMode::InputPullUp).unwrap();
/// assert_eq!(hal.read(2).unwrap(), Level::High);
///
/// hal.set_sensor(2, true);
/// assert_eq!(hal.read(2).unwrap(), Level::Low);
///
/// hal.servo_attach(9).unwrap();
/// hal.servo_write(9, 45).unwrap();
/// assert_eq!(hal.servo_angle(9), Some(45));
/// ```
#[derive(Debug, Default)]
pub struct MockHal {
    /// Make every hardware call fail.
    pub fail: bool,
    /// Every digital write, in order.
    pub writes: Vec<(Pin, Level)>,
    /// Number of `servo_write` calls.
    pub servo_writes: usize,
    /// Number of `bemf_drive` calls.
    pub bemf_drive_calls: usize,
    modes: BTreeMap<Pin, PinMode>,
    outputs: BTreeMap<Pin, Level>,
    active_sensors: BTreeSet<Pin>,
    attached: BTreeSet<Pin>,
    angles: BTreeMap<Pin, u8>,
    failing: BTreeSet<Pin>,
    bridges: Vec<(BemfPins, StallDetector)>,
    bemf_pins: Option<BemfPins>,
    duty: f32,
    direction: Direction,
}

impl MockHal {
    /// Creates a board with every pin low and no sensor active.
    pub fn new() -> Self {
        Self::default()
    }

    fn check(&self) -> Result<(), ()> {
        if self.fail {
            Err(())
        } else {
            Ok(())
        }
    }

    fn check_pin(&self, pin: Pin) -> Result<(), ()> {
        self.check()?;
        if self.failing.contains(&pin) {
            Err(())
        } else {
            Ok(())
        }
    }

    /// Make every mode change, read and write on `pin` fail.
    pub fn fail_pin(&mut self, pin: Pin) {
        self.failing.insert(pin);
    }

    /// Undo [`fail_pin`](Self::fail_pin).
    pub fn repair_pin(&mut self, pin: Pin) {
        self.failing.remove(&pin);
    }

    /// Open or close a simulated end sensor.
    pub fn set_sensor(&mut self, pin: Pin, active: bool) {
        if active {
            self.active_sensors.insert(pin);
        } else {
            self.active_sensors.remove(&pin);
        }
    }

    /// Last level written to `pin` (low if never written).
    pub fn output_level(&self, pin: Pin) -> Level {
        self.outputs.get(&pin).copied().unwrap_or_default()
    }

    /// Mode configured for `pin`.
    pub fn pin_mode(&self, pin: Pin) -> Option<PinMode> {
        self.modes.get(&pin).copied()
    }

    /// Number of times `pin` was driven high.
    pub fn high_writes(&self, pin: Pin) -> usize {
        self.writes
            .iter()
            .filter(|(p, level)| *p == pin && level.is_high())
            .count()
    }

    /// Returns true if a servo is attached to `pin`.
    pub fn servo_attached(&self, pin: Pin) -> bool {
        self.attached.contains(&pin)
    }

    /// Last angle written to the servo on `pin`.
    pub fn servo_angle(&self, pin: Pin) -> Option<u8> {
        self.angles.get(&pin).copied()
    }

    /// Pins the bridge is currently bound to.
    pub fn bemf_pins(&self) -> Option<BemfPins> {
        self.bemf_pins
    }

    /// Every pin set registered through `bemf_init`, in order.
    pub fn registered_bemf_pins(&self) -> impl Iterator<Item = BemfPins> + '_ {
        self.bridges.iter().map(|(pins, _)| *pins)
    }

    /// Returns true once `bemf_init` has registered a detector.
    pub fn has_stall_detector(&self) -> bool {
        !self.bridges.is_empty()
    }

    /// The stall detector of the bound pin set.
    pub fn stall_detector(&self) -> Option<&StallDetector> {
        let bound = self.bemf_pins?;
        self.bridges
            .iter()
            .find(|(pins, _)| *pins == bound)
            .map(|(_, detector)| detector)
    }

    /// Current bridge duty.
    pub fn bemf_duty(&self) -> f32 {
        self.duty
    }

    /// Current bridge direction.
    pub fn bemf_direction(&self) -> Direction {
        self.direction
    }

    /// Returns true while the bridge is energized.
    pub fn bemf_driven(&self) -> bool {
        self.direction != Direction::Stopped && self.duty > 0.0
    }

    /// Feed raw BEMF samples to the detector of the bound pin set.
    ///
    /// Samples are only taken while the bridge is driven, as on real
    /// hardware. Returns true if a stall was signalled.
    pub fn feed_bemf(&mut self, samples: &[u16]) -> bool {
        if !self.bemf_driven() {
            return false;
        }
        let Some(bound) = self.bemf_pins else {
            return false;
        };
        match self.bridges.iter_mut().find(|(pins, _)| *pins == bound) {
            Some((_, detector)) => detector.feed(samples.iter().copied()),
            None => false,
        }
    }
}

impl Gpio for MockHal {
    type Error = ();

    fn set_mode(&mut self, pin: Pin, mode: PinMode) -> Result<(), ()> {
        self.check_pin(pin)?;
        self.modes.insert(pin, mode);
        Ok(())
    }

    fn write(&mut self, pin: Pin, level: Level) -> Result<(), ()> {
        self.check_pin(pin)?;
        self.outputs.insert(pin, level);
        self.writes.push((pin, level));
        Ok(())
    }

    fn read(&mut self, pin: Pin) -> Result<Level, ()> {
        self.check_pin(pin)?;
        if self.modes.get(&pin) == Some(&PinMode::Output) {
            return Ok(self.output_level(pin));
        }
        // Pull-up holds the line high until a sensor shorts it
        Ok(Level::from(!self.active_sensors.contains(&pin)))
    }
}

impl ServoOutput for MockHal {
    fn servo_attach(&mut self, pin: Pin) -> Result<(), ()> {
        self.check()?;
        self.attached.insert(pin);
        Ok(())
    }

    fn servo_write(&mut self, pin: Pin, angle: u8) -> Result<(), ()> {
        self.check()?;
        self.angles.insert(pin, angle);
        self.servo_writes += 1;
        Ok(())
    }
}

impl BemfBridge for MockHal {
    fn bemf_init(&mut self, pins: BemfPins, detector: StallDetector) -> Result<(), ()> {
        self.check()?;
        match self.bridges.iter_mut().find(|(p, _)| *p == pins) {
            Some((_, slot)) => *slot = detector,
            None => self.bridges.push((pins, detector)),
        }
        self.bemf_pins = Some(pins);
        Ok(())
    }

    fn bemf_drive(&mut self, pins: BemfPins, duty: f32, direction: Direction) -> Result<(), ()> {
        self.check()?;
        self.bemf_drive_calls += 1;
        self.bemf_pins = Some(pins);
        if direction == Direction::Stopped {
            self.duty = 0.0;
        } else {
            self.duty = duty.clamp(0.0, 1.0);
        }
        self.direction = direction;
        Ok(())
    }
}

/// Mock clock for testing time-dependent behavior.
///
/// # Example
///
/// ```rust
/// use rs_turnouts::hal::MockClock;
/// use rs_turnouts::traits::Clock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.set(1000);
/// assert_eq!(clock.now_ms(), 1000);
///
/// clock.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Debug)]
pub struct MockClock {
    current_ms: u64,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self { current_ms: 0 }
    }

    /// Sets the current time in milliseconds.
    pub fn set(&mut self, ms: u64) {
        self.current_ms = ms;
    }

    /// Advances the clock by the given duration.
    pub fn advance(&mut self, ms: u64) {
        self.current_ms += ms;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms
    }
}

// ============================================================================
// Event Mocks
// ============================================================================

/// Records every event it receives.
#[derive(Debug, Default)]
pub struct MockEvents {
    /// Received events, oldest first.
    pub events: Vec<TurnoutEvent>,
}

impl MockEvents {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events whose [`EventKind::as_str`] tag equals `tag`.
    pub fn count(&self, tag: &str) -> usize {
        self.events.iter().filter(|e| e.kind.as_str() == tag).count()
    }

    /// Number of events from actuator `id`.
    pub fn count_for(&self, id: u16) -> usize {
        self.events.iter().filter(|e| e.id == id).count()
    }

    /// Event kinds in order.
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.iter().map(|e| e.kind).collect()
    }

    /// Most recent event.
    pub fn last(&self) -> Option<&TurnoutEvent> {
        self.events.last()
    }

    /// Forget everything recorded so far.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for MockEvents {
    fn emit(&mut self, event: &TurnoutEvent) {
        self.events.push(event.clone());
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbiter::BemfArbiter;
    use crate::commands::Position;
    use crate::config::{short_string, StallConfig};
    use alloc::sync::Arc;

    // =========================================================================
    // MockHal GPIO Tests
    // =========================================================================

    #[test]
    fn mock_hal_default() {
        let hal = MockHal::new();
        assert_eq!(hal.output_level(3), Level::Low);
        assert_eq!(hal.pin_mode(3), None);
        assert!(!hal.bemf_driven());
        assert_eq!(hal.bemf_direction(), Direction::Stopped);
    }

    #[test]
    fn mock_hal_sensor_is_active_low() {
        let mut hal = MockHal::new();
        hal.set_mode(2, PinMode::InputPullUp).unwrap();
        assert!(!hal.is_active_low(2).unwrap());

        hal.set_sensor(2, true);
        assert!(hal.is_active_low(2).unwrap());

        hal.set_sensor(2, false);
        assert!(!hal.is_active_low(2).unwrap());
    }

    #[test]
    fn mock_hal_output_reads_back() {
        let mut hal = MockHal::new();
        hal.set_mode(4, PinMode::Output).unwrap();
        hal.write(4, Level::High).unwrap();
        assert_eq!(hal.read(4).unwrap(), Level::High);
        assert_eq!(hal.high_writes(4), 1);
    }

    #[test]
    fn mock_hal_fail_flag() {
        let mut hal = MockHal::new();
        hal.fail = true;
        assert!(hal.write(1, Level::High).is_err());
        assert!(hal.read(1).is_err());
        assert!(hal.servo_write(1, 10).is_err());
        assert!(hal
            .bemf_drive(BemfPins::new(1, 2, 3, 4), 1.0, Direction::Forward)
            .is_err());
        assert!(hal.writes.is_empty());
    }

    #[test]
    fn mock_hal_single_failing_pin() {
        let mut hal = MockHal::new();
        hal.fail_pin(7);
        assert!(hal.read(7).is_err());
        assert!(hal.write(7, Level::High).is_err());
        assert!(hal.set_mode(7, PinMode::Output).is_err());
        assert!(hal.read(8).is_ok());

        hal.repair_pin(7);
        assert!(hal.read(7).is_ok());
    }

    // =========================================================================
    // MockHal Servo / BEMF Tests
    // =========================================================================

    #[test]
    fn mock_hal_servo_tracking() {
        let mut hal = MockHal::new();
        assert!(!hal.servo_attached(9));
        hal.servo_attach(9).unwrap();
        hal.servo_write(9, 90).unwrap();
        hal.servo_write(9, 91).unwrap();
        assert!(hal.servo_attached(9));
        assert_eq!(hal.servo_angle(9), Some(91));
        assert_eq!(hal.servo_writes, 2);
    }

    #[test]
    fn mock_hal_stopped_ignores_duty() {
        let mut hal = MockHal::new();
        hal.bemf_drive(BemfPins::new(1, 2, 3, 4), 0.8, Direction::Stopped)
            .unwrap();
        assert_eq!(hal.bemf_duty(), 0.0);
        assert!(!hal.bemf_driven());
    }

    #[test]
    fn mock_hal_feeds_detector_only_while_driven() {
        let mut hal = MockHal::new();
        let arbiter = Arc::new(BemfArbiter::new());
        let pins = BemfPins::new(1, 2, 3, 4);
        let detector = StallDetector::new(StallConfig::default(), arbiter.clone());
        hal.bemf_init(pins, detector).unwrap();
        arbiter.try_acquire(1).unwrap();

        assert!(!hal.feed_bemf(&[0; 10]));
        assert!(!arbiter.end_detected());

        hal.bemf_drive(pins, 1.0, Direction::Forward).unwrap();
        assert!(hal.feed_bemf(&[0; 6]));
        assert!(arbiter.take_end(1));
    }

    #[test]
    fn mock_hal_routes_samples_to_driven_pin_set() {
        let mut hal = MockHal::new();
        let arbiter = Arc::new(BemfArbiter::new());
        let x = BemfPins::new(10, 11, 12, 13);
        let y = BemfPins::new(20, 21, 22, 23);
        let eager = StallConfig::default().with_run_length(0);
        hal.bemf_init(x, StallDetector::new(eager, arbiter.clone()))
            .unwrap();
        hal.bemf_init(y, StallDetector::new(StallConfig::default(), arbiter.clone()))
            .unwrap();
        assert_eq!(hal.registered_bemf_pins().count(), 2);
        assert_eq!(hal.bemf_pins(), Some(y));

        arbiter.try_acquire(1).unwrap();
        hal.bemf_drive(x, 1.0, Direction::Forward).unwrap();
        assert_eq!(hal.bemf_pins(), Some(x));
        assert_eq!(hal.stall_detector().unwrap().config().run_length, 0);
        // One low sample is enough for the detector registered with x
        assert!(hal.feed_bemf(&[0]));
    }

    // =========================================================================
    // MockClock / MockEvents Tests
    // =========================================================================

    #[test]
    fn mock_clock() {
        let mut clock = MockClock::new();
        assert_eq!(clock.now_ms(), 0);

        clock.advance(100);
        assert_eq!(clock.now_ms(), 100);

        clock.set(50);
        assert_eq!(clock.now_ms(), 50);
    }

    #[test]
    fn mock_events_records() {
        let mut events = MockEvents::new();
        assert!(events.is_empty());

        events.emit(&TurnoutEvent {
            id: 3,
            name: short_string("W3"),
            kind: EventKind::MoveStarted {
                target: Position::Pos1,
            },
        });
        events.emit(&TurnoutEvent {
            id: 4,
            name: short_string("W4"),
            kind: EventKind::MoveTimeout {
                target: Position::Pos2,
            },
        });

        assert_eq!(events.len(), 2);
        assert_eq!(events.count("timeout"), 1);
        assert_eq!(events.count_for(3), 1);
        assert!(events.last().unwrap().is_fault());

        events.clear();
        assert!(events.is_empty());
    }
}
