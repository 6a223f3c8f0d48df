//! `IPipelineObserver` (spec.md §6, §4.11): the sink the [`Reporter`]
//! element notifies of track/metadata/time/format changes.
//!
//! [`Reporter`]: crate::pipeline::reporter::Reporter

/// Snapshot of the currently-playing stream's format, as last reported by
/// a `DecodedStream` message.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamFormat {
    pub bit_rate: u32,
    pub bit_depth: u16,
    pub sample_rate: u32,
    pub num_channels: u16,
    pub lossless: bool,
}

/// Observer notified of user-visible playback state by [`Reporter`](crate::pipeline::reporter::Reporter).
pub trait PipelineObserver: Send + Sync {
    /// Transport/buffering state changed (e.g. "playing", "paused",
    /// "buffering", "stopped").
    fn state(&self, state: &str);

    /// The current track changed.
    fn track(&self, track_id: u32, uri: &str);

    /// New ICY-style metatext arrived for the current stream.
    fn meta_text(&self, text: &str);

    /// At most once per elapsed second: current position and total
    /// duration, both in seconds.
    fn time(&self, seconds: u32, duration_seconds: u32);

    /// The decoded stream's format changed (new stream, bitrate change).
    fn stream_info(&self, format: StreamFormat);
}
