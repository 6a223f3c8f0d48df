//! Piecewise-linear amplitude envelopes carried on audio messages.
//!
//! Every audio-carrying [`Message`](super::Message) variant carries a
//! [`Ramp`]: either disabled (full volume, no envelope) or a `(start, end,
//! direction)` triple. Splitting a ramped message at a byte/sample boundary
//! produces two messages whose ramps share an interpolated midpoint — see
//! [`Ramp::split`].

/// Minimum ramp value: full silence.
pub const RAMP_MIN: u32 = 0;

/// Maximum ramp value: full volume.
pub const RAMP_MAX: u32 = u32::MAX;

/// Which way a ramp is moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampDirection {
    Up,
    Down,
}

/// An amplitude envelope applied across one or more audio messages.
///
/// `start` and `end` are the ramp's multiplier values (as a fraction of
/// [`RAMP_MAX`]) at the first and last sample of the audio this ramp is
/// attached to. A disabled ramp means "play at full volume, no envelope
/// math needed" and is the common case on the steady-state streaming path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ramp {
    enabled: bool,
    start: u32,
    end: u32,
    direction: RampDirection,
}

impl Ramp {
    /// The disabled ramp: full volume, no envelope.
    pub const NONE: Ramp = Ramp {
        enabled: false,
        start: RAMP_MAX,
        end: RAMP_MAX,
        direction: RampDirection::Up,
    };

    /// Creates an enabled ramp from `start` to `end`.
    #[must_use]
    pub fn new(start: u32, end: u32, direction: RampDirection) -> Self {
        Self {
            enabled: true,
            start,
            end,
            direction,
        }
    }

    /// A ramp from silence up to full volume.
    #[must_use]
    pub fn full_up() -> Self {
        Self::new(RAMP_MIN, RAMP_MAX, RampDirection::Up)
    }

    /// A ramp from full volume down to silence.
    #[must_use]
    pub fn full_down() -> Self {
        Self::new(RAMP_MAX, RAMP_MIN, RampDirection::Down)
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn start(&self) -> u32 {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> u32 {
        self.end
    }

    #[must_use]
    pub fn direction(&self) -> RampDirection {
        self.direction
    }

    /// `true` once this ramp has fully reached its terminal value
    /// (silence for a down-ramp, full volume for an up-ramp).
    #[must_use]
    pub fn is_complete(&self) -> bool {
        match self.direction {
            RampDirection::Down => self.end == RAMP_MIN,
            RampDirection::Up => self.end == RAMP_MAX,
        }
    }

    /// Linearly interpolates the ramp value at `fraction` (`0.0` = start,
    /// `1.0` = end) through this ramp's span.
    #[must_use]
    pub fn value_at(&self, fraction: f64) -> u32 {
        if !self.enabled {
            return RAMP_MAX;
        }
        let fraction = fraction.clamp(0.0, 1.0);
        let start = self.start as f64;
        let end = self.end as f64;
        (start + (end - start) * fraction).round() as u32
    }

    /// Splits this ramp at `fraction` of its span, returning `(head, tail)`
    /// ramps whose endpoints are interpolated so that `head.end ==
    /// tail.start`. This is what lets a reservoir or aggregator split one
    /// ramped audio message into two without discontinuity.
    ///
    /// Preserves the invariant used by property tests: concatenating the
    /// parts reproduces the original `(start, end)` pair and the
    /// interpolation is monotonic in the ramp's direction.
    #[must_use]
    pub fn split(&self, fraction: f64) -> (Ramp, Ramp) {
        if !self.enabled {
            return (Ramp::NONE, Ramp::NONE);
        }
        let mid = self.value_at(fraction);
        (
            Ramp {
                enabled: true,
                start: self.start,
                end: mid,
                direction: self.direction,
            },
            Ramp {
                enabled: true,
                start: mid,
                end: self.end,
                direction: self.direction,
            },
        )
    }

    /// Combines this ramp (applied first) with `next` (applied after),
    /// as happens when a ramp-down is interrupted mid-flight by a new
    /// ramp-down request: the new ramp must start from the *current*
    /// value, not restart from full volume.
    #[must_use]
    pub fn restart_from_current(current_value: u32, direction: RampDirection) -> Self {
        let end = match direction {
            RampDirection::Down => RAMP_MIN,
            RampDirection::Up => RAMP_MAX,
        };
        Self::new(current_value, end, direction)
    }
}

impl Default for Ramp {
    fn default() -> Self {
        Self::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_ramp_is_always_full_volume() {
        assert_eq!(Ramp::NONE.value_at(0.0), RAMP_MAX);
        assert_eq!(Ramp::NONE.value_at(1.0), RAMP_MAX);
    }

    #[test]
    fn full_down_endpoints() {
        let r = Ramp::full_down();
        assert_eq!(r.value_at(0.0), RAMP_MAX);
        assert_eq!(r.value_at(1.0), RAMP_MIN);
    }

    #[test]
    fn split_endpoints_match_original() {
        let r = Ramp::new(RAMP_MAX, RAMP_MIN, RampDirection::Down);
        let (head, tail) = r.split(0.37);
        assert_eq!(head.start(), r.start());
        assert_eq!(tail.end(), r.end());
        assert_eq!(head.end(), tail.start());
    }

    #[test]
    fn split_is_monotonic_for_down_ramp() {
        let r = Ramp::full_down();
        let (head, tail) = r.split(0.5);
        assert!(head.start() >= head.end());
        assert!(tail.start() >= tail.end());
        assert!(head.end() >= tail.end());
    }

    #[test]
    fn split_chain_preserves_endpoints() {
        // Splitting repeatedly and walking the chain should still land on
        // the original (start, end) pair at the extremes.
        let r = Ramp::new(RAMP_MAX, RAMP_MIN, RampDirection::Down);
        let (a, bc) = r.split(0.25);
        let (b, c) = bc.split(1.0 / 3.0);
        assert_eq!(a.start(), r.start());
        assert_eq!(a.end(), b.start());
        assert_eq!(b.end(), c.start());
        assert_eq!(c.end(), r.end());
    }

    #[test]
    fn restart_from_current_continues_without_jump() {
        let r = Ramp::restart_from_current(0x8000_0000, RampDirection::Down);
        assert_eq!(r.start(), 0x8000_0000);
        assert_eq!(r.end(), RAMP_MIN);
    }

    proptest::proptest! {
        /// For any chain of splits on a ramped message, the concatenation of
        /// the parts has the original endpoints and the value is monotonic
        /// along the ramp's direction (spec.md §8, property 2).
        #[test]
        fn arbitrary_split_chain_preserves_endpoints_and_monotonicity(
            start in 0u32..=RAMP_MAX,
            end in 0u32..=RAMP_MAX,
            fractions in proptest::collection::vec(0.0f64..=1.0, 1..6),
        ) {
            let direction = if end >= start { RampDirection::Up } else { RampDirection::Down };
            let original = Ramp::new(start, end, direction);

            let mut parts = vec![original];
            for f in fractions {
                let last = parts.pop().unwrap();
                let (head, tail) = last.split(f);
                parts.push(head);
                parts.push(tail);
            }

            assert_eq!(parts.first().unwrap().start(), start);
            assert_eq!(parts.last().unwrap().end(), end);
            for w in parts.windows(2) {
                assert_eq!(w[0].end(), w[1].start());
            }
            for p in &parts {
                match direction {
                    RampDirection::Down => assert!(p.start() >= p.end()),
                    RampDirection::Up => assert!(p.start() <= p.end()),
                }
            }
        }
    }
}
