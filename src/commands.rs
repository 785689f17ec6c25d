//! Position requests, routes, and rejection reasons.
//!
//! This module defines the values callers hand to the actuators and the
//! reasons a request can be turned down.
//!
//! # Positions
//!
//! A simple turnout has two end positions, [`Position::Pos1`] and
//! [`Position::Pos2`], which map to the integers `1` and `2` used on the
//! wire. A three-way turnout has three [`Route`]s, `0` to `2`.
//!
//! Raw integers are validated with `TryFrom<u8>`:
//!
//! ```rust
//! use rs_turnouts::{Position, RejectReason, Route};
//!
//! assert_eq!(Position::try_from(1), Ok(Position::Pos1));
//! assert_eq!(Position::try_from(3), Err(RejectReason::InvalidPosition(3)));
//!
//! assert_eq!(Route::try_from(2), Ok(Route::Right));
//! assert_eq!(Route::try_from(7), Err(RejectReason::InvalidRoute(7)));
//! ```
//!
//! # Accessory Commands
//!
//! A DCC decoder hands decoded accessory packets to the
//! [`Layout`](crate::Layout) as [`AccessoryCommand`]s. Which direction bit
//! means which position is up to the decoder; [`DirectionMapping`] picks it.

use crate::traits::Direction;

// ============================================================================
// Positions
// ============================================================================

/// End position of a simple turnout.
///
/// # Example
///
/// ```rust
/// use rs_turnouts::Position;
///
/// assert_eq!(Position::Pos1.as_u8(), 1);
/// assert_eq!(Position::Pos2.opposite(), Position::Pos1);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Position {
    /// Position 1 (typically straight / closed).
    Pos1,
    /// Position 2 (typically diverging / thrown).
    Pos2,
}

impl Position {
    /// Returns the wire value (`1` or `2`).
    #[inline]
    pub const fn as_u8(self) -> u8 {
        match self {
            Position::Pos1 => 1,
            Position::Pos2 => 2,
        }
    }

    /// Returns the other end position.
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Position::Pos1 => Position::Pos2,
            Position::Pos2 => Position::Pos1,
        }
    }

    /// Bridge direction that moves a BEMF turnout toward this position.
    #[inline]
    pub const fn drive_direction(self) -> Direction {
        match self {
            Position::Pos1 => Direction::Forward,
            Position::Pos2 => Direction::Reverse,
        }
    }

    /// Parse a position from text input.
    ///
    /// Accepts `"1"`, `"pos1"`, `"closed"`, `"straight"` for position 1 and
    /// `"2"`, `"pos2"`, `"thrown"`, `"diverging"` for position 2.
    /// Input is trimmed and case-insensitive.
    ///
    /// # Examples
    ///
    /// ```
    /// use rs_turnouts::Position;
    ///
    /// assert_eq!(Position::from_text("closed"), Some(Position::Pos1));
    /// assert_eq!(Position::from_text(" THROWN "), Some(Position::Pos2));
    /// assert_eq!(Position::from_text("0"), None);
    /// ```
    pub fn from_text(s: &str) -> Option<Self> {
        let s = s.trim();
        const POS1: [&str; 4] = ["1", "pos1", "closed", "straight"];
        const POS2: [&str; 4] = ["2", "pos2", "thrown", "diverging"];
        if POS1.iter().any(|w| w.eq_ignore_ascii_case(s)) {
            Some(Position::Pos1)
        } else if POS2.iter().any(|w| w.eq_ignore_ascii_case(s)) {
            Some(Position::Pos2)
        } else {
            None
        }
    }
}

impl TryFrom<u8> for Position {
    type Error = RejectReason;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Position::Pos1),
            2 => Ok(Position::Pos2),
            other => Err(RejectReason::InvalidPosition(other)),
        }
    }
}

impl From<Position> for u8 {
    fn from(p: Position) -> u8 {
        p.as_u8()
    }
}

// ============================================================================
// Routes
// ============================================================================

/// Route through a three-way turnout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Route {
    /// Straight through (`0`).
    Straight,
    /// Left branch (`1`).
    Left,
    /// Right branch (`2`).
    Right,
}

impl Route {
    /// Returns the wire value (`0`, `1` or `2`).
    #[inline]
    pub const fn as_u8(self) -> u8 {
        match self {
            Route::Straight => 0,
            Route::Left => 1,
            Route::Right => 2,
        }
    }

    /// Leg positions `(turnout_a, turnout_b)` that realize this route.
    ///
    /// | route | a | b |
    /// |-------|---|---|
    /// | Straight | 1 | 1 |
    /// | Left | 2 | 1 |
    /// | Right | 1 | 2 |
    #[inline]
    pub const fn leg_positions(self) -> (Position, Position) {
        match self {
            Route::Straight => (Position::Pos1, Position::Pos1),
            Route::Left => (Position::Pos2, Position::Pos1),
            Route::Right => (Position::Pos1, Position::Pos2),
        }
    }

    /// Parse a route from text input (`"0"`/`"straight"`, `"1"`/`"left"`,
    /// `"2"`/`"right"`). Input is trimmed and case-insensitive.
    ///
    /// # Examples
    ///
    /// ```
    /// use rs_turnouts::Route;
    ///
    /// assert_eq!(Route::from_text("Left"), Some(Route::Left));
    /// assert_eq!(Route::from_text("0"), Some(Route::Straight));
    /// assert_eq!(Route::from_text("up"), None);
    /// ```
    pub fn from_text(s: &str) -> Option<Self> {
        let s = s.trim();
        if s == "0" || s.eq_ignore_ascii_case("straight") {
            Some(Route::Straight)
        } else if s == "1" || s.eq_ignore_ascii_case("left") {
            Some(Route::Left)
        } else if s == "2" || s.eq_ignore_ascii_case("right") {
            Some(Route::Right)
        } else {
            None
        }
    }
}

impl TryFrom<u8> for Route {
    type Error = RejectReason;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Route::Straight),
            1 => Ok(Route::Left),
            2 => Ok(Route::Right),
            other => Err(RejectReason::InvalidRoute(other)),
        }
    }
}

// ============================================================================
// Accessory Commands
// ============================================================================

/// A decoded DCC accessory request.
///
/// The decoder produces these; packet decoding itself is not part of this
/// crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AccessoryCommand {
    /// Accessory address.
    pub address: u16,
    /// Direction bit (`false` = closed, `true` = thrown).
    pub direction: bool,
}

impl AccessoryCommand {
    /// Creates a new accessory command.
    pub const fn new(address: u16, direction: bool) -> Self {
        Self { address, direction }
    }
}

/// How an accessory direction bit maps onto a turnout position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DirectionMapping {
    /// Closed (`false`) selects position 1, thrown selects position 2.
    #[default]
    ClosedIsPos1,
    /// Thrown (`true`) selects position 1, closed selects position 2.
    ThrownIsPos1,
}

impl DirectionMapping {
    /// Translate a direction bit into a position.
    pub const fn position(self, direction: bool) -> Position {
        match (self, direction) {
            (DirectionMapping::ClosedIsPos1, false) | (DirectionMapping::ThrownIsPos1, true) => {
                Position::Pos1
            }
            _ => Position::Pos2,
        }
    }
}

// ============================================================================
// Rejections
// ============================================================================

/// Reason a request was rejected.
///
/// Rejections never change actuator state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RejectReason {
    /// Position outside `{1, 2}`.
    InvalidPosition(u8),

    /// Route outside `{0, 1, 2}`.
    InvalidRoute(u8),

    /// No actuator is registered at this accessory address.
    UnknownAddress(u16),

    /// The accessory address (or one of a three-way pair) is already taken.
    AddressInUse(u16),
}

impl core::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RejectReason::InvalidPosition(p) => write!(f, "invalid position {}", p),
            RejectReason::InvalidRoute(r) => write!(f, "invalid route {}", r),
            RejectReason::UnknownAddress(a) => write!(f, "no turnout at address {}", a),
            RejectReason::AddressInUse(a) => write!(f, "address {} already in use", a),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RejectReason {}

// ============================================================================
// Tests
// ============================================================================
