//! Stability filter for raw call detections
//!
//! Per-tick verdicts flicker: a title repaint or a slow enumeration can drop
//! a call for a tick, and a transient popup can fake one. The debouncer turns
//! the raw stream into a stable belief using asymmetric consecutive-hit
//! thresholds: slow to declare "in call" (starting a recording on a false
//! positive is expensive), fast to declare "call ended" (stopping late loses
//! nothing but records silence).

use std::collections::VecDeque;

/// Raw-sample history retained for diagnostics
const RAW_HISTORY_LEN: usize = 5;

/// Hysteresis filter over the raw per-tick in-call signal
#[derive(Debug)]
pub struct Debouncer {
    start_threshold: u32,
    stop_threshold: u32,
    raw_history: VecDeque<bool>,
    consecutive_call_hits: u32,
    consecutive_no_call_hits: u32,
    stable_in_call: bool,
}

impl Debouncer {
    pub fn new(start_threshold: u32, stop_threshold: u32) -> Self {
        Self {
            start_threshold: start_threshold.max(1),
            stop_threshold: stop_threshold.max(1),
            raw_history: VecDeque::with_capacity(RAW_HISTORY_LEN),
            consecutive_call_hits: 0,
            consecutive_no_call_hits: 0,
            stable_in_call: false,
        }
    }

    /// Feed one raw detection, returning the updated stable state.
    pub fn update(&mut self, raw_in_call: bool) -> bool {
        if self.raw_history.len() == RAW_HISTORY_LEN {
            self.raw_history.pop_front();
        }
        self.raw_history.push_back(raw_in_call);

        if raw_in_call {
            self.consecutive_call_hits += 1;
            self.consecutive_no_call_hits = 0;
        } else {
            self.consecutive_no_call_hits += 1;
            self.consecutive_call_hits = 0;
        }

        if !self.stable_in_call && self.consecutive_call_hits >= self.start_threshold {
            self.stable_in_call = true;
            tracing::debug!(
                hits = self.consecutive_call_hits,
                "Debouncer: call confirmed"
            );
        } else if self.stable_in_call && self.consecutive_no_call_hits >= self.stop_threshold {
            self.stable_in_call = false;
            tracing::debug!(
                misses = self.consecutive_no_call_hits,
                "Debouncer: call ended"
            );
        }

        self.stable_in_call
    }

    pub fn stable_in_call(&self) -> bool {
        self.stable_in_call
    }

    /// Clear all counters and the stable state.
    ///
    /// Called whenever monitoring starts or stops so a new session never
    /// inherits belief from an old one.
    pub fn reset(&mut self) {
        self.raw_history.clear();
        self.consecutive_call_hits = 0;
        self.consecutive_no_call_hits = 0;
        self.stable_in_call = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_consecutive_hits_flip_on_the_third_tick() {
        let mut d = Debouncer::new(3, 2);
        assert!(!d.update(true));
        assert!(!d.update(true));
        assert!(d.update(true));
    }

    #[test]
    fn never_stable_before_start_threshold() {
        let mut d = Debouncer::new(3, 2);
        // Interleaved noise keeps resetting the call counter.
        for raw in [true, true, false, true, true, false, true] {
            assert!(!d.update(raw));
        }
    }

    #[test]
    fn two_consecutive_misses_flip_off_on_the_second_tick() {
        let mut d = Debouncer::new(3, 2);
        for _ in 0..3 {
            d.update(true);
        }
        assert!(d.stable_in_call());
        assert!(d.update(false));
        assert!(!d.update(false));
    }

    #[test]
    fn single_miss_does_not_end_a_stable_call() {
        let mut d = Debouncer::new(3, 2);
        for _ in 0..3 {
            d.update(true);
        }
        assert!(d.update(false));
        assert!(d.update(true));
        assert!(d.update(false));
        assert!(d.update(true));
        assert!(d.stable_in_call());
    }

    #[test]
    fn counters_reset_each_other() {
        let mut d = Debouncer::new(2, 2);
        d.update(true);
        d.update(false);
        d.update(true);
        // Only one consecutive hit so far; needs one more.
        assert!(!d.stable_in_call());
        assert!(d.update(true));
    }

    #[test]
    fn reset_clears_stable_state_and_counters() {
        let mut d = Debouncer::new(2, 1);
        d.update(true);
        d.update(true);
        assert!(d.stable_in_call());
        d.reset();
        assert!(!d.stable_in_call());
        assert!(!d.update(true));
        assert!(d.update(true));
    }

    #[test]
    fn thresholds_of_zero_are_clamped_to_one() {
        let mut d = Debouncer::new(0, 0);
        assert!(d.update(true));
        assert!(!d.update(false));
    }
}
