//! BEMF stall detection.
//!
//! A brushed motor driving a turnout generates back-EMF while it turns.
//! When the points hit the end stop the motor stalls and the BEMF voltage
//! collapses. [`StallDetector`] watches the raw sample stream for a run of
//! low samples and posts "end reached" to the actuator holding the
//! [`BemfArbiter`].
//!
//! This is a debounced threshold detector, not a motor model. The
//! threshold and run length come from [`StallConfig`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rs_turnouts::{BemfArbiter, StallDetector, config::StallConfig};
//!
//! let arbiter = Arc::new(BemfArbiter::new());
//! let mut detector = StallDetector::new(StallConfig::default(), arbiter.clone());
//!
//! arbiter.try_acquire(1).unwrap();
//! for _ in 0..5 {
//!     assert!(!detector.on_sample(10));
//! }
//! assert!(detector.on_sample(10)); // sixth low sample
//! assert!(arbiter.take_end(1));
//! ```

extern crate alloc;
use alloc::sync::Arc;

use crate::arbiter::BemfArbiter;
use crate::config::StallConfig;

/// Run-length stall detector fed from the sampling context.
#[derive(Debug)]
pub struct StallDetector {
    config: StallConfig,
    arbiter: Arc<BemfArbiter>,
    run: u8,
    last_claim: Option<(u16, u16)>,
}

impl StallDetector {
    /// Creates a detector that signals through `arbiter`.
    pub fn new(config: StallConfig, arbiter: Arc<BemfArbiter>) -> Self {
        Self {
            config,
            arbiter,
            run: 0,
            last_claim: None,
        }
    }

    /// Consume one raw BEMF sample.
    ///
    /// Returns true if this sample completed a stall and the end bit was
    /// posted to the holder. The run restarts whenever the bridge is
    /// claimed again, including by the previous holder.
    pub fn on_sample(&mut self, raw: u16) -> bool {
        let claim = self.arbiter.claim();
        if claim != self.last_claim {
            self.run = 0;
            self.last_claim = claim;
        }
        if claim.is_none() {
            return false;
        }

        if raw < self.config.threshold {
            self.run = self.run.saturating_add(1);
        } else {
            self.run = 0;
        }

        if self.run > self.config.run_length {
            self.run = 0;
            return self.arbiter.signal_end().is_some();
        }
        false
    }

    /// Feed a batch of samples. Returns true if any of them signalled.
    pub fn feed<I: IntoIterator<Item = u16>>(&mut self, samples: I) -> bool {
        samples
            .into_iter()
            .fold(false, |hit, raw| self.on_sample(raw) || hit)
    }

    /// Current count of consecutive low samples.
    #[inline]
    pub fn low_run(&self) -> u8 {
        self.run
    }

    /// Detection thresholds.
    #[inline]
    pub fn config(&self) -> &StallConfig {
        &self.config
    }

    /// The arbiter this detector signals through.
    #[inline]
    pub fn arbiter(&self) -> &Arc<BemfArbiter> {
        &self.arbiter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LOW: u16 = 10;
    const HIGH: u16 = 900;

    fn held(id: u16) -> (Arc<BemfArbiter>, StallDetector) {
        let arbiter = Arc::new(BemfArbiter::new());
        arbiter.try_acquire(id).unwrap();
        let detector = StallDetector::new(StallConfig::default(), arbiter.clone());
        (arbiter, detector)
    }

    #[test]
    fn six_low_samples_signal_end() {
        let (arbiter, mut detector) = held(1);
        assert!(detector.feed([LOW; 6]));
        assert!(arbiter.end_detected());
        assert_eq!(detector.low_run(), 0);
    }

    #[test]
    fn five_low_samples_are_not_enough() {
        let (arbiter, mut detector) = held(1);
        assert!(!detector.feed([LOW; 5]));
        assert!(!arbiter.end_detected());
        assert_eq!(detector.low_run(), 5);
    }

    #[test]
    fn high_sample_resets_run() {
        let (arbiter, mut detector) = held(1);
        detector.feed([LOW, LOW, LOW, LOW, HIGH, LOW, LOW, LOW, LOW]);
        assert!(!arbiter.end_detected());
        assert_eq!(detector.low_run(), 4);
    }

    #[test]
    fn threshold_is_exclusive() {
        let (arbiter, mut detector) = held(1);
        let at_threshold = StallConfig::default().threshold;
        detector.feed([at_threshold; 20]);
        assert!(!arbiter.end_detected());
    }

    #[test]
    fn samples_without_holder_are_ignored() {
        let arbiter = Arc::new(BemfArbiter::new());
        let mut detector = StallDetector::new(StallConfig::default(), arbiter.clone());
        assert!(!detector.feed([LOW; 20]));
        assert_eq!(detector.low_run(), 0);
    }

    #[test]
    fn holder_change_restarts_count() {
        let (arbiter, mut detector) = held(1);
        detector.feed([LOW; 4]);
        arbiter.release(1);
        arbiter.try_acquire(2).unwrap();

        // Four leftover samples must not count toward the new holder
        detector.feed([LOW; 3]);
        assert!(!arbiter.end_detected());
        assert_eq!(detector.low_run(), 3);
    }

    #[test]
    fn same_holder_reclaiming_restarts_count() {
        let (arbiter, mut detector) = held(1);
        detector.feed([LOW; 5]);
        arbiter.release(1);
        arbiter.try_acquire(1).unwrap();

        assert!(!detector.on_sample(LOW));
        assert_eq!(detector.low_run(), 1);
        assert!(!arbiter.end_detected());
    }

    #[test]
    fn custom_run_length() {
        let arbiter = Arc::new(BemfArbiter::new());
        arbiter.try_acquire(5).unwrap();
        let config = StallConfig::default().with_run_length(2).with_threshold(100);
        let mut detector = StallDetector::new(config, arbiter.clone());

        assert!(!detector.feed([99, 99]));
        assert!(detector.on_sample(99));
        assert_eq!(arbiter.signal_end(), Some(5));
    }

    proptest! {
        #[test]
        fn short_low_runs_never_signal(runs in proptest::collection::vec(0usize..=4, 1..20)) {
            let (arbiter, mut detector) = held(1);
            for run in runs {
                detector.feed(core::iter::repeat(LOW).take(run));
                detector.on_sample(HIGH);
            }
            prop_assert!(!arbiter.end_detected());
        }
    }
}
