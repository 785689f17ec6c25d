//! Accessory-address routing and the periodic driver.
//!
//! [`Layout`] owns every actuator on a board, keyed by DCC accessory
//! address. A decoder hands it [`AccessoryCommand`]s; the main loop calls
//! [`Layout::update`] every tick and the produced events go to an
//! [`EventSink`].
//!
//! # Addressing
//!
//! - A simple turnout at address `a` maps the direction bit to a
//!   position through [`DirectionMapping`](crate::DirectionMapping).
//! - A three-way turnout at base address `a` occupies `a` and `a + 1`.
//!   Thrown on `a` selects [`Route::Left`], thrown on `a + 1` selects
//!   [`Route::Right`], closed on either selects [`Route::Straight`].
//!
//! # Example
//!
//! ```rust
//! use rs_turnouts::{AccessoryCommand, Layout, Position, TurnoutActuator};
//! use rs_turnouts::config::LayoutConfig;
//! use rs_turnouts::hal::{MockEvents, MockHal};
//!
//! let mut hal = MockHal::new();
//! let mut events = MockEvents::new();
//! let mut layout = Layout::new(LayoutConfig::default());
//! layout.add_turnout(12, TurnoutActuator::new_coil(1, "W1", 4, 5, 6, 7)).unwrap();
//! layout.begin(&mut hal).unwrap();
//!
//! layout.apply_accessory(AccessoryCommand::new(12, true)).unwrap();
//! layout.update(&mut hal, 0, &mut events).unwrap();
//!
//! assert_eq!(layout.turnout(12).unwrap().target(), Some(Position::Pos2));
//! assert_eq!(events.len(), 1);
//! ```

extern crate alloc;
use alloc::vec::Vec;

use crate::commands::{AccessoryCommand, Position, RejectReason, Route};
use crate::config::LayoutConfig;
use crate::three_way::ThreeWayActuator;
use crate::traits::{EventSink, TurnoutHal};
use crate::turnout::TurnoutActuator;

/// An actuator registered on the layout.
#[derive(Debug)]
pub enum Actuator {
    /// Simple two-position turnout.
    Single(TurnoutActuator),
    /// Three-way turnout, occupying two addresses.
    ThreeWay(ThreeWayActuator),
}

impl Actuator {
    fn begin<H: TurnoutHal>(&mut self, hal: &mut H) -> Result<(), H::Error> {
        match self {
            Actuator::Single(t) => t.begin(hal),
            Actuator::ThreeWay(t) => t.begin(hal),
        }
    }

    fn update<H: TurnoutHal, S: EventSink>(
        &mut self,
        hal: &mut H,
        now_ms: u64,
        sink: &mut S,
    ) -> Result<(), H::Error> {
        match self {
            Actuator::Single(t) => {
                sink.emit_opt(t.update(hal, now_ms)?.as_ref());
            }
            Actuator::ThreeWay(t) => {
                let mut first_err = None;
                for result in t.update(hal, now_ms) {
                    match result {
                        Ok(event) => sink.emit_opt(event.as_ref()),
                        Err(e) => {
                            first_err.get_or_insert(e);
                        }
                    }
                }
                if let Some(e) = first_err {
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn is_moving(&self) -> bool {
        match self {
            Actuator::Single(t) => t.is_moving(),
            Actuator::ThreeWay(t) => t.is_moving(),
        }
    }

    fn span(&self) -> u16 {
        match self {
            Actuator::Single(_) => 1,
            Actuator::ThreeWay(_) => 2,
        }
    }
}

/// What an accessory command resolved to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Applied {
    /// A simple turnout was sent to this position.
    Position(Position),
    /// A three-way turnout was sent to this route.
    Route(Route),
}

#[derive(Debug)]
struct Entry {
    address: u16,
    actuator: Actuator,
}

impl Entry {
    fn covers(&self, address: u16) -> bool {
        address >= self.address && address - self.address < self.actuator.span()
    }
}

/// All actuators of one board, keyed by accessory address.
#[derive(Debug, Default)]
pub struct Layout {
    config: LayoutConfig,
    entries: Vec<Entry>,
}

impl Layout {
    /// Creates an empty layout.
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
        }
    }

    fn check_free(&self, address: u16, span: u16) -> Result<(), RejectReason> {
        for offset in 0..span {
            let a = address
                .checked_add(offset)
                .ok_or(RejectReason::AddressInUse(address))?;
            if self.entries.iter().any(|e| e.covers(a)) {
                return Err(RejectReason::AddressInUse(a));
            }
        }
        Ok(())
    }

    fn insert(&mut self, address: u16, actuator: Actuator) -> Result<(), RejectReason> {
        self.check_free(address, actuator.span())?;
        self.entries.push(Entry { address, actuator });
        Ok(())
    }

    /// Register a simple turnout at `address`.
    pub fn add_turnout(&mut self, address: u16, turnout: TurnoutActuator) -> Result<(), RejectReason> {
        self.insert(address, Actuator::Single(turnout))
    }

    /// Register a three-way turnout at `address` and `address + 1`.
    pub fn add_three_way(&mut self, address: u16, three_way: ThreeWayActuator) -> Result<(), RejectReason> {
        self.insert(address, Actuator::ThreeWay(three_way))
    }

    /// Initialize every actuator.
    pub fn begin<H: TurnoutHal>(&mut self, hal: &mut H) -> Result<(), H::Error> {
        for entry in &mut self.entries {
            entry.actuator.begin(hal)?;
        }
        Ok(())
    }

    fn entry_mut(&mut self, address: u16) -> Result<&mut Entry, RejectReason> {
        self.entries
            .iter_mut()
            .find(|e| e.covers(address))
            .ok_or(RejectReason::UnknownAddress(address))
    }

    /// Route a decoded accessory command to its actuator.
    pub fn apply_accessory(&mut self, cmd: AccessoryCommand) -> Result<Applied, RejectReason> {
        let mapping = self.config.mapping;
        let entry = self.entry_mut(cmd.address)?;
        let base = entry.address;

        match &mut entry.actuator {
            Actuator::Single(t) => {
                let position = mapping.position(cmd.direction);
                t.request(position);
                Ok(Applied::Position(position))
            }
            Actuator::ThreeWay(t) => {
                let route = match (cmd.address == base, cmd.direction) {
                    (_, false) => Route::Straight,
                    (true, true) => Route::Left,
                    (false, true) => Route::Right,
                };
                t.set_route(route);
                Ok(Applied::Route(route))
            }
        }
    }

    /// Request a raw position (simple turnout) or route (three-way) by address.
    ///
    /// Out-of-domain values are rejected without touching the actuator.
    pub fn set_position(&mut self, address: u16, value: u8) -> Result<Applied, RejectReason> {
        match &mut self.entry_mut(address)?.actuator {
            Actuator::Single(t) => t.set_position(value).map(Applied::Position),
            Actuator::ThreeWay(t) => t.set_position(value).map(Applied::Route),
        }
    }

    /// Tick every actuator and forward their events to `sink`.
    ///
    /// A hardware error on one actuator does not stop the others from
    /// being updated; the first error is returned.
    pub fn update<H: TurnoutHal, S: EventSink>(
        &mut self,
        hal: &mut H,
        now_ms: u64,
        sink: &mut S,
    ) -> Result<(), H::Error> {
        let mut first_err = None;
        for entry in &mut self.entries {
            if let Err(e) = entry.actuator.update(hal, now_ms, sink) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Simple turnout registered at `address`.
    pub fn turnout(&self, address: u16) -> Option<&TurnoutActuator> {
        match self.get(address)? {
            Actuator::Single(t) => Some(t),
            Actuator::ThreeWay(_) => None,
        }
    }

    /// Three-way turnout occupying `address`.
    pub fn three_way(&self, address: u16) -> Option<&ThreeWayActuator> {
        match self.get(address)? {
            Actuator::ThreeWay(t) => Some(t),
            Actuator::Single(_) => None,
        }
    }

    /// Actuator occupying `address`.
    pub fn get(&self, address: u16) -> Option<&Actuator> {
        self.entries
            .iter()
            .find(|e| e.covers(address))
            .map(|e| &e.actuator)
    }

    /// Base addresses in registration order.
    pub fn addresses(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.iter().map(|e| e.address)
    }

    /// Returns true while any actuator is moving.
    pub fn is_moving(&self) -> bool {
        self.entries.iter().any(|e| e.actuator.is_moving())
    }

    /// Number of registered actuators.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Layout configuration.
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::DirectionMapping;
    use crate::hal::{MockEvents, MockHal};
    use crate::motor::CoilPins;

    fn layout() -> Layout {
        let mut layout = Layout::new(LayoutConfig::default());
        layout
            .add_turnout(1, TurnoutActuator::new_coil(1, "W1", 4, 5, 6, 7))
            .unwrap();
        layout
            .add_three_way(
                10,
                ThreeWayActuator::new(
                    2,
                    "3W",
                    CoilPins::new(20, 21, 22, 23),
                    CoilPins::new(24, 25, 26, 27),
                ),
            )
            .unwrap();
        layout
    }

    #[test]
    fn duplicate_address_rejected() {
        let mut layout = layout();
        let err = layout
            .add_turnout(1, TurnoutActuator::new_coil(9, "dup", 30, 31, 32, 33))
            .unwrap_err();
        assert_eq!(err, RejectReason::AddressInUse(1));

        // Second address of the three-way pair is taken too
        let err = layout
            .add_turnout(11, TurnoutActuator::new_coil(9, "dup", 30, 31, 32, 33))
            .unwrap_err();
        assert_eq!(err, RejectReason::AddressInUse(11));
        assert_eq!(layout.len(), 2);
    }

    #[test]
    fn three_way_cannot_overlap_single() {
        let mut layout = layout();
        let tw = ThreeWayActuator::new(5, "x", CoilPins::new(1, 2, 3, 4), CoilPins::new(5, 6, 7, 8));
        assert_eq!(
            layout.add_three_way(0, tw).unwrap_err(),
            RejectReason::AddressInUse(1)
        );
    }

    #[test]
    fn three_way_at_top_of_range_rejected() {
        let mut layout = Layout::default();
        let tw = ThreeWayActuator::new(5, "x", CoilPins::new(1, 2, 3, 4), CoilPins::new(5, 6, 7, 8));
        assert!(layout.add_three_way(u16::MAX, tw).is_err());
        assert!(layout.is_empty());
    }

    #[test]
    fn unknown_address() {
        let mut layout = layout();
        assert_eq!(
            layout.apply_accessory(AccessoryCommand::new(99, true)),
            Err(RejectReason::UnknownAddress(99))
        );
    }

    #[test]
    fn single_turnout_mapping() {
        let mut layout = layout();
        assert_eq!(
            layout.apply_accessory(AccessoryCommand::new(1, false)),
            Ok(Applied::Position(Position::Pos1))
        );
        assert_eq!(
            layout.apply_accessory(AccessoryCommand::new(1, true)),
            Ok(Applied::Position(Position::Pos2))
        );
        assert_eq!(layout.turnout(1).unwrap().target(), Some(Position::Pos2));
    }

    #[test]
    fn inverted_mapping() {
        let mut layout = Layout::new(LayoutConfig::default().with_mapping(DirectionMapping::ThrownIsPos1));
        layout
            .add_turnout(3, TurnoutActuator::new_coil(1, "W1", 4, 5, 6, 7))
            .unwrap();
        layout.apply_accessory(AccessoryCommand::new(3, true)).unwrap();
        assert_eq!(layout.turnout(3).unwrap().target(), Some(Position::Pos1));
    }

    #[test]
    fn three_way_address_pair() {
        let mut layout = layout();
        assert_eq!(
            layout.apply_accessory(AccessoryCommand::new(10, true)),
            Ok(Applied::Route(Route::Left))
        );
        assert_eq!(
            layout.apply_accessory(AccessoryCommand::new(11, true)),
            Ok(Applied::Route(Route::Right))
        );
        assert_eq!(
            layout.apply_accessory(AccessoryCommand::new(11, false)),
            Ok(Applied::Route(Route::Straight))
        );
        assert_eq!(
            layout.apply_accessory(AccessoryCommand::new(10, false)),
            Ok(Applied::Route(Route::Straight))
        );
        assert!(layout.three_way(11).is_some());
        assert!(layout.turnout(11).is_none());
    }

    #[test]
    fn raw_set_position_by_address() {
        let mut layout = layout();
        assert_eq!(layout.set_position(10, 2), Ok(Applied::Route(Route::Right)));
        assert_eq!(layout.set_position(10, 5), Err(RejectReason::InvalidRoute(5)));
        assert_eq!(layout.set_position(1, 0), Err(RejectReason::InvalidPosition(0)));
        assert_eq!(layout.three_way(10).unwrap().target(), Some(Route::Right));
    }

    #[test]
    fn update_forwards_all_events() {
        let mut hal = MockHal::new();
        let mut events = MockEvents::new();
        let mut layout = layout();
        layout.begin(&mut hal).unwrap();

        layout.apply_accessory(AccessoryCommand::new(1, true)).unwrap();
        layout.apply_accessory(AccessoryCommand::new(10, true)).unwrap();
        layout.update(&mut hal, 0, &mut events).unwrap();

        // W1 plus both three-way legs
        assert_eq!(events.count("move_started"), 3);
        assert!(layout.is_moving());
        assert_eq!(layout.addresses().collect::<Vec<_>>(), vec![1, 10]);
    }
}
