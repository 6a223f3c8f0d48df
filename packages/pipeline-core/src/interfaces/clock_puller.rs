//! `IClockPuller` (spec.md §6, §4.12): drift estimation for a timestamped
//! source (e.g. Songcast). The pipeline feeds it reservoir-fill and
//! network-timestamp samples; a driver reads the resulting multiplier to
//! correct its own playback clock.

/// Drift estimator consumed by a real-time, externally-clocked mode.
pub trait ClockPuller: Send + Sync {
    /// A new stream has started at `sample_rate`; reset any
    /// rate-dependent state.
    fn new_stream(&self, sample_rate: u32);

    /// Discards accumulated history without changing the current
    /// multiplier (used when resuming after a gap).
    fn reset(&self);

    /// Stops pulling; the multiplier freezes at its last value.
    fn stop(&self);

    /// Starts pulling, notifying observers at roughly `notify_freq_hz`.
    fn start(&self, notify_freq_hz: u32);

    /// The decoded reservoir reports its current fill (in jiffies) every
    /// K jiffies of audio pulled; returns the current multiplier.
    fn notify_size(&self, fill_jiffies: u64) -> f64;

    /// A timestamped source reports observed drift against a network
    /// timestamp; returns the current multiplier.
    fn notify_timestamp(&self, drift_jiffies: i64, network_time: u64) -> f64;
}
