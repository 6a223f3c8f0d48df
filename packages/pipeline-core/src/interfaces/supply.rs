//! `ISupply` (spec.md §6): the interface the filler and protocol clients
//! use to push messages into the head of the pipeline.

use crate::message::{EncodedStreamInfo, ModeInfo, TrackInfo};

/// Sink the filler/protocol layer pushes freshly-fetched data into.
pub trait Supply: Send {
    fn output_mode(&mut self, mode: ModeInfo);
    fn output_track(&mut self, track: TrackInfo);
    fn output_encoded_stream(&mut self, stream: EncodedStreamInfo);
    fn output_data(&mut self, bytes: bytes::Bytes);
    fn output_metadata(&mut self, text: String);
    /// Returns the flush id allocated for this discard barrier.
    fn output_flush(&mut self) -> u32;
    /// Returns the halt id allocated for this "no more audio" marker.
    fn output_halt(&mut self) -> u32;
    fn output_quit(&mut self);
}
