//! `ICodec` (spec.md §6, §4.3): a registered codec the codec controller
//! consults by recognition order and, once it accepts a stream, drives to
//! produce `DecodedStream` + `AudioPcm` messages.

/// A source of encoded bytes a codec reads from during `process`. Served
/// from the buffered encoded audio; blocks the calling (codec controller)
/// thread only when the encoded reservoir is itself empty.
pub trait EncodedSource: Send {
    /// Reads up to `buf.len()` bytes, returning the number actually read
    /// (0 meaning the stream has ended).
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// A destination a codec writes `DecodedStream`/`AudioPcm` messages to
/// during `process`.
pub trait DecodedSink: Send {
    fn output_decoded_stream(&mut self, info: crate::message::DecodedStreamInfo);
    fn output_audio_pcm(&mut self, pcm: crate::message::AudioPcmInfo);
}

/// A codec able to recognise and decode one container/codec combination.
pub trait Codec: Send + Sync {
    /// Human-readable name, used in `DecodedStream.codec_name`.
    fn name(&self) -> &str;

    /// Inspects a small probe buffer taken from the head of a new
    /// `EncodedStream` and decides whether this codec should own it.
    /// Codecs are consulted in registration order; the first to accept
    /// wins (spec.md §4.3).
    fn recognise(&self, probe: &[u8]) -> bool;

    /// Called once after `recognise` accepts, before the first `process`.
    /// `stream` carries the id, URI and flags of the encoded stream this
    /// codec now owns, so a codec whose format is known up front (rather
    /// than parsed from a header) can remember what to stamp on the
    /// `DecodedStream` it emits from `process`.
    fn stream_initialise(&mut self, stream: &crate::message::EncodedStreamInfo);

    /// Pulls bytes from `source` and emits decoded output to `sink` until
    /// either the source is exhausted or a reasonable unit of work (e.g.
    /// one decoded block) has been produced. Returns `Ok(false)` once the
    /// stream has completed cleanly.
    fn process(&mut self, source: &mut dyn EncodedSource, sink: &mut dyn DecodedSink) -> std::io::Result<bool>;

    /// Attempts to seek to `sample_offset` within the current stream.
    fn try_seek(&mut self, stream_id: u32, sample_offset: u64) -> bool;

    /// Called once decoding of the current stream is done (cleanly or by
    /// abandonment), before the codec may be reused for another stream.
    fn stream_completed(&mut self);
}
