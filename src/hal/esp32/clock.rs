//! ESP32 clock implementation using the ESP-IDF timer.

use crate::traits::Clock;

/// ESP32 clock using the hardware timer.
///
/// Provides millisecond-resolution timing for the turnout state machines
/// using `esp_timer_get_time()`, which returns microseconds since boot.
///
/// # Example
///
/// ```ignore
/// use rs_turnouts::hal::esp32::Esp32Clock;
/// use rs_turnouts::traits::Clock;
///
/// let clock = Esp32Clock::new();
/// turnout.update(&mut board, clock.now_ms())?;
/// ```
pub struct Esp32Clock;

impl Esp32Clock {
    /// Creates a new ESP32 clock instance.
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Default for Esp32Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for Esp32Clock {
    #[inline]
    fn now_ms(&self) -> u64 {
        // Plain read of the boot-relative timer
        let micros = unsafe { esp_idf_hal::sys::esp_timer_get_time() };
        (micros / 1000) as u64
    }
}
