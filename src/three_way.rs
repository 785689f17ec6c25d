//! Three-way turnout built from two coil turnouts.
//!
//! A three-way turnout has one straight route and two branches. It is
//! driven by two independent double-coil mechanisms, leg A (left) and
//! leg B (right):
//!
//! | Route | Leg A | Leg B |
//! |-------|-------|-------|
//! | Straight | 1 | 1 |
//! | Left | 2 | 1 |
//! | Right | 1 | 2 |
//!
//! The legs are not sequenced or interlocked; both may move at once and
//! each reports its own events and timeouts.

use core::fmt::Write;

use crate::commands::{RejectReason, Route};
use crate::config::{ShortString, TimingConfig};
use crate::motor::CoilPins;
use crate::traits::{TurnoutEvent, TurnoutHal};
use crate::turnout::TurnoutActuator;

/// Outcome of one tick of a three-way turnout, leg A first.
///
/// Each leg reports on its own, so a failing leg never hides the other
/// leg's event.
pub type LegResults<E> = [Result<Option<TurnoutEvent>, E>; 2];

/// Two coil turnouts acting as one three-way turnout.
///
/// # Example
///
/// ```rust
/// use rs_turnouts::{ThreeWayActuator, Position, Route, motor::CoilPins, hal::MockHal};
///
/// let mut hal = MockHal::new();
/// let mut three_way = ThreeWayActuator::new(
///     3,
///     "Yard",
///     CoilPins::new(10, 11, 12, 13),
///     CoilPins::new(14, 15, 16, 17),
/// );
/// three_way.begin(&mut hal).unwrap();
///
/// three_way.set_route(Route::Left);
/// assert_eq!(three_way.leg_a().target(), Some(Position::Pos2));
/// assert_eq!(three_way.leg_b().target(), Some(Position::Pos1));
/// assert_eq!(three_way.leg_a().id(), 31);
/// ```
#[derive(Debug)]
pub struct ThreeWayActuator {
    id: u16,
    name: ShortString,
    leg_a: TurnoutActuator,
    leg_b: TurnoutActuator,
    target: Option<Route>,
}

impl ThreeWayActuator {
    /// Creates a three-way turnout. The legs get ids `id * 10 + 1` and
    /// `id * 10 + 2` and are named after the turnout.
    pub fn new(id: u16, name: &str, a: CoilPins, b: CoilPins) -> Self {
        let name = crate::config::short_string(name);
        let leg = |suffix: u16, letter: char, pins: CoilPins| {
            let mut leg_name = ShortString::new();
            // Truncated silently if the base name is already at the limit
            let _ = write!(leg_name, "{} {}", name.as_str(), letter);
            TurnoutActuator::new_coil(
                id.wrapping_mul(10).wrapping_add(suffix),
                &leg_name,
                pins.forward,
                pins.reverse,
                pins.sensors.pos1,
                pins.sensors.pos2,
            )
        };

        let leg_a = leg(1, 'A', a);
        let leg_b = leg(2, 'B', b);
        Self {
            id,
            name,
            leg_a,
            leg_b,
            target: None,
        }
    }

    /// Apply the same timing to both legs.
    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.leg_a = self.leg_a.with_timing(timing);
        self.leg_b = self.leg_b.with_timing(timing);
        self
    }

    /// Initialize both legs.
    pub fn begin<H: TurnoutHal>(&mut self, hal: &mut H) -> Result<(), H::Error> {
        self.leg_a.begin(hal)?;
        self.leg_b.begin(hal)
    }

    /// Request a route from its wire value (`0`, `1` or `2`).
    ///
    /// Anything else is rejected and neither leg is touched.
    pub fn set_position(&mut self, route: u8) -> Result<Route, RejectReason> {
        let route = Route::try_from(route)?;
        self.set_route(route);
        Ok(route)
    }

    /// Request a route.
    pub fn set_route(&mut self, route: Route) {
        let (a, b) = route.leg_positions();
        self.target = Some(route);
        self.leg_a.request(a);
        self.leg_b.request(b);
    }

    /// Tick both legs. Both are always updated.
    pub fn update<H: TurnoutHal>(&mut self, hal: &mut H, now_ms: u64) -> LegResults<H::Error> {
        [
            self.leg_a.update(hal, now_ms),
            self.leg_b.update(hal, now_ms),
        ]
    }

    /// Route the legs currently sit in, if both are confirmed.
    pub fn route(&self) -> Option<Route> {
        use crate::commands::Position::{Pos1, Pos2};
        match (self.leg_a.position()?, self.leg_b.position()?) {
            (Pos1, Pos1) => Some(Route::Straight),
            (Pos2, Pos1) => Some(Route::Left),
            (Pos1, Pos2) => Some(Route::Right),
            // Both branches thrown is not a valid route
            (Pos2, Pos2) => None,
        }
    }

    /// Returns true while either leg is moving.
    pub fn is_moving(&self) -> bool {
        self.leg_a.is_moving() || self.leg_b.is_moving()
    }

    /// Turnout id.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Turnout name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requested route, if any.
    pub fn target(&self) -> Option<Route> {
        self.target
    }

    /// Leg A (left branch).
    pub fn leg_a(&self) -> &TurnoutActuator {
        &self.leg_a
    }

    /// Leg B (right branch).
    pub fn leg_b(&self) -> &TurnoutActuator {
        &self.leg_b
    }
}
