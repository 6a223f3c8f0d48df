//! `IStreamHandler` (spec.md §6): the callback surface a producer of an
//! `EncodedStream` exposes so the pipeline can ask it to seek, stop, or
//! gate playback.

use crate::message::ids::StreamPlay;

/// A flush id, or the sentinel meaning "this operation could not be
/// performed" (spec.md's "invalid" return from `TrySeek`/`TryStop`).
pub type FlushId = u32;

/// Sentinel flush id meaning the requested seek/stop could not be carried
/// out by the stream handler.
pub const FLUSH_INVALID: FlushId = crate::message::ids::FLUSH_ID_INVALID;

/// Callback surface exposed by whatever produced a given `EncodedStream`.
/// The pipeline calls back into it to gate playback and to request a seek
/// or stop targeted at a specific stream id.
pub trait StreamHandler: Send + Sync {
    /// Gate before emitting any decoded frames for `stream_id`.
    fn ok_to_play(&self, stream_id: u32) -> StreamPlay;

    /// Attempts to seek the underlying stream to `byte_offset`. Returns the
    /// flush id that will mark the resumption point, or [`FLUSH_INVALID`]
    /// if the seek could not be performed.
    fn try_seek(&self, stream_id: u32, byte_offset: u64) -> FlushId;

    /// Attempts to stop the underlying stream. Returns the flush id that
    /// will mark the point after which discarded content ends, or
    /// [`FLUSH_INVALID`] if the stop could not be performed.
    fn try_stop(&self, stream_id: u32) -> FlushId;

    /// Advisory: the downstream buffer is starving for this stream.
    fn notify_starving(&self, mode: &str, stream_id: u32);
}
