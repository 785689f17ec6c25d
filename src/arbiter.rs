//! Single-owner lock over the shared BEMF bridge.
//!
//! A board has one PWM bridge and one BEMF sampling channel, so at most one
//! BEMF turnout may be energized at a time. [`BemfArbiter`] records which
//! actuator holds the bridge and carries the "end reached" bit posted by
//! the [`StallDetector`](crate::StallDetector).
//!
//! Holder, busy flag, end bit and a claim generation live in one atomic
//! word. Every change is a single compare-and-swap, so the sampling context
//! and the polling loop never see a half-updated state.
//!
//! The generation is bumped on every successful claim. A detector that
//! sees a new generation knows a new move started, even when the same
//! actuator released and claimed the bridge between two samples.
//!
//! # Example
//!
//! ```rust
//! use rs_turnouts::BemfArbiter;
//!
//! let arbiter = BemfArbiter::new();
//! assert!(arbiter.try_acquire(7).is_ok());
//! assert_eq!(arbiter.try_acquire(8), Err(7));
//!
//! arbiter.signal_end();
//! assert!(arbiter.take_end(7));
//! assert!(!arbiter.take_end(7)); // consumed
//!
//! assert!(arbiter.release(7));
//! assert!(!arbiter.is_busy());
//! ```

use core::sync::atomic::{AtomicU32, Ordering};

const HELD: u32 = 1 << 31;
const END: u32 = 1 << 30;
const GEN_SHIFT: u32 = 16;
const GEN_MASK: u32 = 0x3FFF << GEN_SHIFT;
const ID_MASK: u32 = 0xFFFF;

/// Arbitration state for the shared BEMF hardware.
#[derive(Debug, Default)]
pub struct BemfArbiter {
    state: AtomicU32,
}

impl BemfArbiter {
    /// Creates an arbiter with no holder.
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(0),
        }
    }

    fn holder_of(state: u32) -> Option<u16> {
        if state & HELD != 0 {
            Some((state & ID_MASK) as u16)
        } else {
            None
        }
    }

    fn generation_of(state: u32) -> u16 {
        ((state & GEN_MASK) >> GEN_SHIFT) as u16
    }

    /// Claim the bridge for actuator `id`.
    ///
    /// Succeeds if the bridge is free or already held by `id`; either way
    /// the end bit is cleared and the generation advances. Returns the
    /// current holder on failure.
    pub fn try_acquire(&self, id: u16) -> Result<(), u16> {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                match Self::holder_of(s) {
                    Some(holder) if holder != id => None,
                    _ => {
                        let generation = (s & GEN_MASK).wrapping_add(1 << GEN_SHIFT) & GEN_MASK;
                        Some(HELD | generation | id as u32)
                    }
                }
            })
            .map(|_| ())
            .map_err(|s| (s & ID_MASK) as u16)
    }

    /// Give the bridge back. Returns false if `id` was not the holder.
    pub fn release(&self, id: u16) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                (Self::holder_of(s) == Some(id)).then_some(s & GEN_MASK)
            })
            .is_ok()
    }

    /// Current holder, if any.
    pub fn holder(&self) -> Option<u16> {
        Self::holder_of(self.state.load(Ordering::Acquire))
    }

    /// Holder and claim generation, read together.
    pub fn claim(&self) -> Option<(u16, u16)> {
        let s = self.state.load(Ordering::Acquire);
        Self::holder_of(s).map(|id| (id, Self::generation_of(s)))
    }

    /// Number of successful claims so far, modulo 2^14.
    pub fn generation(&self) -> u16 {
        Self::generation_of(self.state.load(Ordering::Acquire))
    }

    /// True while some actuator holds the bridge.
    pub fn is_busy(&self) -> bool {
        self.state.load(Ordering::Acquire) & HELD != 0
    }

    /// Post "end reached" to the current holder.
    ///
    /// Called from the sampling context. Returns the holder that was
    /// signalled, or `None` if the bridge is free.
    pub fn signal_end(&self) -> Option<u16> {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                (s & HELD != 0).then_some(s | END)
            })
            .ok()
            .and_then(Self::holder_of)
    }

    /// Read and clear the end bit on behalf of `id`.
    ///
    /// Only the holder can consume the bit.
    pub fn take_end(&self, id: u16) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                (Self::holder_of(s) == Some(id) && s & END != 0).then_some(s & !END)
            })
            .is_ok()
    }

    /// True if an end signal is pending for `id`. Does not consume it.
    pub fn end_pending(&self, id: u16) -> bool {
        let s = self.state.load(Ordering::Acquire);
        Self::holder_of(s) == Some(id) && s & END != 0
    }

    /// True if an end signal is pending for the current holder.
    pub fn end_detected(&self) -> bool {
        let s = self.state.load(Ordering::Acquire);
        s & HELD != 0 && s & END != 0
    }
}
