//! Shared ramp-down/suspend/ramp-up discipline used by the Skipper,
//! Waiter, Stopper, and Muter (spec.md §4.5, §4.10): "state machines are
//! identical in shape" — `running → ramping-down → flushing/halted →
//! ramping-up → running`.
//!
//! If a ramp-up is interrupted by a new ramp-down request (or vice versa),
//! the new ramp starts from the current value and its length is
//! `ramp_duration − remaining`, i.e. exactly the elapsed time of the ramp
//! being interrupted (spec.md §4.5 "Key invariants").

use parking_lot::Mutex;

use crate::message::{Ramp, RampDirection, RAMP_MAX, RAMP_MIN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    Running,
    RampingDown,
    Suspended,
    RampingUp,
}

#[derive(Clone, Copy)]
enum State {
    Running,
    Suspended,
    Ramping {
        direction: RampDirection,
        elapsed_jiffies: u64,
        total_jiffies: u64,
        start_value: u32,
    },
}

/// A ramp-down/suspend/ramp-up gate an element applies to the audio
/// flowing through it.
pub struct RampGate {
    default_duration_jiffies: u64,
    state: Mutex<State>,
}

impl RampGate {
    #[must_use]
    pub fn new(default_duration_jiffies: u64) -> Self {
        Self {
            default_duration_jiffies,
            state: Mutex::new(State::Running),
        }
    }

    #[must_use]
    pub fn phase(&self) -> GatePhase {
        match *self.state.lock() {
            State::Running => GatePhase::Running,
            State::Suspended => GatePhase::Suspended,
            State::Ramping { direction: RampDirection::Down, .. } => GatePhase::RampingDown,
            State::Ramping { direction: RampDirection::Up, .. } => GatePhase::RampingUp,
        }
    }

    fn current_value(state: &State) -> u32 {
        match *state {
            State::Running => RAMP_MAX,
            State::Suspended => RAMP_MIN,
            State::Ramping {
                direction,
                elapsed_jiffies,
                total_jiffies,
                start_value,
            } => {
                let target = match direction {
                    RampDirection::Down => RAMP_MIN,
                    RampDirection::Up => RAMP_MAX,
                };
                let ramp = Ramp::new(start_value, target, direction);
                let fraction = if total_jiffies == 0 {
                    1.0
                } else {
                    elapsed_jiffies as f64 / total_jiffies as f64
                };
                ramp.value_at(fraction)
            }
        }
    }

    /// Begins (or redirects) a ramp-down to silence.
    pub fn request_ramp_down(&self) {
        self.request(RampDirection::Down, self.default_duration_jiffies);
    }

    /// Begins (or redirects) a ramp-up to full volume, leaving `Suspended`
    /// if it was there.
    pub fn request_ramp_up(&self) {
        self.request(RampDirection::Up, self.default_duration_jiffies);
    }

    fn request(&self, direction: RampDirection, default_total: u64) {
        let mut state = self.state.lock();
        let current = Self::current_value(&state);
        let interrupted_elapsed = match *state {
            State::Ramping {
                direction: old_dir,
                elapsed_jiffies,
                ..
            } if old_dir != direction => Some(elapsed_jiffies),
            _ => None,
        };
        let total = interrupted_elapsed.unwrap_or(default_total).max(1);
        *state = State::Ramping {
            direction,
            elapsed_jiffies: 0,
            total_jiffies: total,
            start_value: current,
        };
    }

    /// Transitions directly to `Suspended` (e.g. once a ramp-down's
    /// matching Flush/Halt has passed).
    pub fn suspend(&self) {
        *self.state.lock() = State::Suspended;
    }

    /// Transitions directly to `Running` (used when resuming with no ramp,
    /// e.g. a fresh stream that itself carries its own ramp).
    pub fn run(&self) {
        *self.state.lock() = State::Running;
    }

    #[must_use]
    pub fn is_suspended(&self) -> bool {
        matches!(*self.state.lock(), State::Suspended)
    }

    /// Applies the gate to `duration_jiffies` of audio, returning the ramp
    /// to attach to it (or `None` if the audio should be dropped entirely
    /// because the gate is suspended). Advances the gate's internal clock
    /// by `duration_jiffies`, completing the ramp (transitioning to
    /// `Suspended` or `Running`) if it finishes within this span.
    pub fn apply(&self, duration_jiffies: u64) -> Option<Ramp> {
        let mut state = self.state.lock();
        match *state {
            State::Running => Some(Ramp::NONE),
            State::Suspended => None,
            State::Ramping {
                direction,
                elapsed_jiffies,
                total_jiffies,
                start_value,
            } => {
                let target = match direction {
                    RampDirection::Down => RAMP_MIN,
                    RampDirection::Up => RAMP_MAX,
                };
                let full = Ramp::new(start_value, target, direction);
                let start_frac = elapsed_jiffies as f64 / total_jiffies as f64;
                let end_elapsed = elapsed_jiffies + duration_jiffies;
                let end_frac = (end_elapsed as f64 / total_jiffies as f64).min(1.0);
                let segment = Ramp::new(full.value_at(start_frac), full.value_at(end_frac), direction);

                if end_elapsed >= total_jiffies {
                    *state = match direction {
                        RampDirection::Down => State::Suspended,
                        RampDirection::Up => State::Running,
                    };
                } else {
                    *state = State::Ramping {
                        direction,
                        elapsed_jiffies: end_elapsed,
                        total_jiffies,
                        start_value,
                    };
                }
                Some(segment)
            }
        }
    }
}
