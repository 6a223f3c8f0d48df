//! Drift estimator for a timestamped source (spec.md §4.12), grounded in
//! `ClockPullerUtilisation.cpp`'s `UtilisationHistory`: a bounded sliding
//! window of samples with a running total, smoothing that spreads a new
//! sample's deviation from the window's average across the whole window
//! (rather than letting one noisy sample spike the correction), and a
//! bound past which the accumulated drift is folded into the multiplier
//! and the window is reset.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::debug;

use crate::interfaces::ClockPuller;

/// Number of samples the window holds before it starts evicting the
/// oldest to make room for the newest.
const HISTORY_CAPACITY: usize = 40;

/// Accumulated drift (jiffies) past which a correction is applied and the
/// window resets.
const MAX_ALLOWED_TOTAL_DEVIATION_JIFFIES: i64 = 50_000;

/// Smallest deviation from the window average worth smoothing in at all.
const MAX_EXPECTED_DEVIATION_JIFFIES: i64 = 1_000;

/// How far the multiplier is allowed to drift from 1.0 in one correction.
const MAX_MULTIPLIER_STEP: f64 = 0.001;

struct History {
    samples: VecDeque<i64>,
    total: i64,
    expected_average: i64,
}

impl History {
    fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(HISTORY_CAPACITY),
            total: 0,
            expected_average: 0,
        }
    }

    fn reset(&mut self) {
        self.samples.clear();
        self.total = 0;
        self.expected_average = 0;
    }

    /// Folds `sample` into the window, smoothing its deviation from the
    /// running average across every other entry so one outlier can't
    /// swing the total on its own. Returns `Some(total_deviation)` once
    /// the window is full, for the caller to check against the bound.
    fn add(&mut self, sample: i64) -> Option<i64> {
        if self.samples.len() < HISTORY_CAPACITY {
            self.samples.push_back(sample);
            self.total += sample;
            self.expected_average = self.total / self.samples.len() as i64;
            return None;
        }

        let deviation = sample - self.expected_average;
        if deviation.abs() >= self.samples.len() as i64 {
            let share = deviation / self.samples.len() as i64;
            for entry in &mut self.samples {
                *entry += share;
            }
        }

        let oldest = self.samples.pop_front().expect("window is full");
        self.total -= oldest;
        self.samples.push_back(sample);
        self.total += sample;

        Some(self.total)
    }
}

struct State {
    multiplier: f64,
    left: History,
    right: History,
    running: bool,
}

/// Maintains a drift-corrected playback-rate multiplier from a
/// timestamped source's reported drift samples (spec.md §4.12). The
/// decoded reservoir's periodic fill notifications and a Songcast-style
/// source's timestamp observations both feed the same sliding-window
/// correction.
pub struct ClockPullerUtilisation {
    state: Mutex<State>,
}

impl ClockPullerUtilisation {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                multiplier: 1.0,
                left: History::new(),
                right: History::new(),
                running: false,
            }),
        }
    }

    fn correct(state: &mut State, total_deviation: i64) -> f64 {
        if total_deviation.abs() <= MAX_EXPECTED_DEVIATION_JIFFIES {
            return state.multiplier;
        }
        let elapsed = (HISTORY_CAPACITY as i64).max(1);
        let raw_step = total_deviation as f64 / elapsed as f64 / crate::message::JIFFIES_PER_SECOND as f64;
        let step = raw_step.clamp(-MAX_MULTIPLIER_STEP, MAX_MULTIPLIER_STEP);
        state.multiplier = (state.multiplier * (1.0 + step)).clamp(1.0 - MAX_MULTIPLIER_STEP * 10.0, 1.0 + MAX_MULTIPLIER_STEP * 10.0);
        debug!(multiplier = state.multiplier, total_deviation, "clock puller corrected multiplier");
        state.left.reset();
        state.right.reset();
        state.multiplier
    }
}

impl Default for ClockPullerUtilisation {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockPuller for ClockPullerUtilisation {
    fn new_stream(&self, _sample_rate: u32) {
        let mut state = self.state.lock();
        state.left.reset();
        state.right.reset();
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.left.reset();
        state.right.reset();
    }

    fn stop(&self) {
        self.state.lock().running = false;
    }

    fn start(&self, _notify_freq_hz: u32) {
        self.state.lock().running = true;
    }

    fn notify_size(&self, fill_jiffies: u64) -> f64 {
        let mut state = self.state.lock();
        if !state.running {
            return state.multiplier;
        }
        if let Some(total) = state.left.add(fill_jiffies as i64) {
            if total.abs() > MAX_ALLOWED_TOTAL_DEVIATION_JIFFIES {
                return Self::correct(&mut state, total);
            }
        }
        state.multiplier
    }

    fn notify_timestamp(&self, drift_jiffies: i64, _network_time: u64) -> f64 {
        let mut state = self.state.lock();
        if !state.running {
            return state.multiplier;
        }
        if let Some(total) = state.right.add(drift_jiffies) {
            if total.abs() > MAX_ALLOWED_TOTAL_DEVIATION_JIFFIES {
                return Self::correct(&mut state, total);
            }
        }
        state.multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_drift_samples_leave_multiplier_unchanged() {
        let puller = ClockPullerUtilisation::new();
        puller.start(4);
        let mut last = 1.0;
        for _ in 0..HISTORY_CAPACITY * 2 {
            last = puller.notify_size(10_000);
        }
        assert!((last - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sustained_one_sided_drift_shifts_multiplier() {
        let puller = ClockPullerUtilisation::new();
        puller.start(4);
        let mut last = 1.0;
        for i in 0..HISTORY_CAPACITY * 3 {
            let sample = 10_000 + i as u64 * 50;
            last = puller.notify_size(sample);
        }
        assert_ne!(last, 1.0);
    }

    #[test]
    fn stop_freezes_the_multiplier() {
        let puller = ClockPullerUtilisation::new();
        puller.start(4);
        for i in 0..HISTORY_CAPACITY * 3 {
            puller.notify_size(10_000 + i as u64 * 50);
        }
        let frozen = puller.notify_size(999_999);
        puller.stop();
        assert_eq!(puller.notify_size(1), frozen);
    }
}
