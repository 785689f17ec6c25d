//! Event sinks for the console and `defmt`.
//!
//! Which sink to use depends on the target:
//! - Host builds and ESP-IDF (`std`): [`ConsoleSink`], one line per event
//! - Bare-metal over RTT (`defmt`): [`DefmtSink`]
//! - Anywhere events are not wanted: [`NullSink`]
//!
//! Tests use [`MockEvents`](crate::hal::MockEvents), which records events.

use crate::traits::{EventSink, TurnoutEvent};

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &TurnoutEvent) {}
}

/// Prints events to stdout.
///
/// Faults go to stderr as well when `faults_to_stderr` is set.
#[cfg(feature = "std")]
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleSink {
    /// Also report faults on stderr.
    pub faults_to_stderr: bool,
}

#[cfg(feature = "std")]
impl ConsoleSink {
    /// Creates a console sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report faults on stderr too.
    pub fn with_faults_to_stderr(mut self) -> Self {
        self.faults_to_stderr = true;
        self
    }
}

#[cfg(feature = "std")]
impl EventSink for ConsoleSink {
    fn emit(&mut self, event: &TurnoutEvent) {
        println!("{}", event);
        if self.faults_to_stderr && event.is_fault() {
            eprintln!("{}", event);
        }
    }
}

/// Logs events through `defmt`; faults at warn level.
#[cfg(feature = "defmt")]
#[derive(Clone, Copy, Debug, Default)]
pub struct DefmtSink;

#[cfg(feature = "defmt")]
impl EventSink for DefmtSink {
    fn emit(&mut self, event: &TurnoutEvent) {
        if event.is_fault() {
            defmt::warn!("turnout {=u16} {=str}: {}", event.id, event.name.as_str(), event.kind);
        } else {
            defmt::info!("turnout {=u16} {=str}: {}", event.id, event.name.as_str(), event.kind);
        }
    }
}
