//! Event reporting for turnout movements.
//!
//! Actuators do not print. Every noteworthy transition produces a
//! [`TurnoutEvent`] which the caller hands to an [`EventSink`]. Sinks for
//! the console, `defmt`, and tests live in [`crate::logging`] and
//! [`crate::hal::mock`].

use crate::commands::Position;
use crate::config::ShortString;

/// Something that happened to one turnout.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TurnoutEvent {
    /// Actuator id.
    pub id: u16,
    /// Actuator name.
    pub name: ShortString,
    /// What happened.
    pub kind: EventKind,
}

impl TurnoutEvent {
    /// Returns true for events that indicate a fault.
    pub fn is_fault(&self) -> bool {
        self.kind.is_fault()
    }
}

/// Kinds of turnout events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case", tag = "event"))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventKind {
    /// The actuator left Idle and started driving toward `target`.
    MoveStarted {
        /// Position being driven to.
        target: Position,
    },

    /// The end position was confirmed by a sensor or stall detection.
    Arrived {
        /// Position reached.
        position: Position,
    },

    /// No arrival within the timeout window; motor de-energized.
    MoveTimeout {
        /// Position that was not reached.
        target: Position,
    },

    /// A BEMF move could not start because another actuator holds the
    /// shared bridge. The request stays pending and is retried.
    ResourceBusy {
        /// Position waiting to be driven to.
        target: Position,
        /// Id of the actuator currently holding the bridge.
        holder: Option<u16>,
    },
}

impl EventKind {
    /// Returns true for [`MoveTimeout`](Self::MoveTimeout).
    pub const fn is_fault(&self) -> bool {
        matches!(self, EventKind::MoveTimeout { .. })
    }

    /// Short lowercase tag, handy for log lines.
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKind::MoveStarted { .. } => "move_started",
            EventKind::Arrived { .. } => "arrived",
            EventKind::MoveTimeout { .. } => "timeout",
            EventKind::ResourceBusy { .. } => "busy",
        }
    }
}

/// One log line per event, tagged the way the firmware console prints.
///
/// ```rust
/// use rs_turnouts::{Position, config::short_string, traits::{EventKind, TurnoutEvent}};
///
/// let event = TurnoutEvent {
///     id: 2,
///     name: short_string("W2"),
///     kind: EventKind::Arrived { position: Position::Pos1 },
/// };
/// assert_eq!(event.to_string(), "[OK] W2 (#2) reached position 1");
/// ```
impl core::fmt::Display for TurnoutEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let (name, id) = (self.name.as_str(), self.id);
        match self.kind {
            EventKind::MoveStarted { target } => {
                write!(f, "[MOVE] {} (#{}) moving to position {}", name, id, target.as_u8())
            }
            EventKind::Arrived { position } => {
                write!(f, "[OK] {} (#{}) reached position {}", name, id, position.as_u8())
            }
            EventKind::MoveTimeout { target } => write!(
                f,
                "[FAULT] {} (#{}) timeout moving to position {}",
                name,
                id,
                target.as_u8()
            ),
            EventKind::ResourceBusy { target, holder } => {
                write!(f, "[BUSY] {} (#{}) position {} waiting for BEMF bridge", name, id, target.as_u8())?;
                match holder {
                    Some(holder) => write!(f, " (held by #{})", holder),
                    None => Ok(()),
                }
            }
        }
    }
}

/// Receiver of turnout events.
///
/// # Example
///
/// ```rust
/// use rs_turnouts::traits::{EventSink, TurnoutEvent};
///
/// struct CountFaults(usize);
///
/// impl EventSink for CountFaults {
///     fn emit(&mut self, event: &TurnoutEvent) {
///         if event.is_fault() {
///             self.0 += 1;
///         }
///     }
/// }
/// ```
pub trait EventSink {
    /// Handle one event.
    fn emit(&mut self, event: &TurnoutEvent);

    /// Handle an optional event; convenience for `update()` results.
    fn emit_opt(&mut self, event: Option<&TurnoutEvent>) {
        if let Some(event) = event {
            self.emit(event);
        }
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: &TurnoutEvent) {
        (**self).emit(event);
    }
}
