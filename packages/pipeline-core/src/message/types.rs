//! The `Message` tagged union that flows through every pipeline element.
//!
//! One variant per case in spec.md §3. Element logic is an exhaustive
//! match over these variants (per the Design Notes, §9: "Deep virtual
//! hierarchies of message types become a single sum type ... element
//! logic becomes an exhaustive match").

use std::sync::Arc;

use bytes::Bytes;

use super::pool::Shared;
use super::ramp::Ramp;
use crate::interfaces::StreamHandler;

/// Flags describing a logical source, carried on every [`Message::Mode`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeFlags {
    pub supports_latency: bool,
    pub is_real_time: bool,
    pub supports_next: bool,
    pub supports_prev: bool,
}

/// Descriptor for a logical source (e.g. "Playlist", "Radio", "Songcast").
#[derive(Debug, Clone)]
pub struct ModeInfo {
    pub name: String,
    pub flags: ModeFlags,
    /// A clock puller to hand samples/timestamps to, if this mode is
    /// externally clocked (e.g. Songcast).
    pub clock_puller: Option<Arc<dyn crate::interfaces::ClockPuller>>,
}

/// Opaque per-track metadata blob (DIDL-Lite or similar, owned by a
/// collaborator, opaque to the pipeline).
pub type Metadata = Arc<str>;

/// A single track: URI, opaque metadata, and the id allocated for it.
#[derive(Debug, Clone)]
pub struct TrackInfo {
    pub track_id: u32,
    pub uri: String,
    pub metadata: Metadata,
    /// Whether this is the first track of a new playback session.
    pub start_of_stream: bool,
}

/// A synchronisation barrier: downstream must fully drain before invoking
/// the completion callback.
pub struct DrainInfo {
    pub callback: Box<dyn FnOnce() + Send>,
}

impl std::fmt::Debug for DrainInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrainInfo").finish_non_exhaustive()
    }
}

/// Flags describing an [`Message::EncodedStream`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodedStreamFlags {
    pub seekable: bool,
    pub live: bool,
    pub raw_pcm: bool,
}

/// A newly-opened encoded stream: URI, optional ICY-style metatext, total
/// byte count (0 if unknown), the stream id allocated for it, and a
/// back-reference to the producing stream handler for `OkToPlay`/`TrySeek`/
/// `TryStop` callbacks.
#[derive(Clone)]
pub struct EncodedStreamInfo {
    pub uri: String,
    pub metatext: Option<String>,
    pub total_bytes: u64,
    pub stream_id: u32,
    pub flags: EncodedStreamFlags,
    pub stream_handler: Arc<dyn StreamHandler>,
}

impl std::fmt::Debug for EncodedStreamInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedStreamInfo")
            .field("uri", &self.uri)
            .field("stream_id", &self.stream_id)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

/// A decoded stream's format, inherited by every `AudioPcm`/`Silence` that
/// follows until the next `DecodedStream`.
#[derive(Clone)]
pub struct DecodedStreamInfo {
    pub stream_id: u32,
    pub bit_rate: u32,
    pub bit_depth: u16,
    pub sample_rate: u32,
    pub num_channels: u16,
    pub codec_name: Arc<str>,
    /// Track length in jiffies (0 if unknown / live).
    pub track_length_jiffies: u64,
    /// Sample offset (expressed in jiffies) this stream starts at — nonzero
    /// for a seek or resumed stream.
    pub sample_start_jiffies: u64,
    pub lossless: bool,
    pub seekable: bool,
    pub live: bool,
    pub stream_handler: Arc<dyn StreamHandler>,
}

impl std::fmt::Debug for DecodedStreamInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedStreamInfo")
            .field("stream_id", &self.stream_id)
            .field("sample_rate", &self.sample_rate)
            .field("num_channels", &self.num_channels)
            .field("codec_name", &self.codec_name)
            .field("sample_start_jiffies", &self.sample_start_jiffies)
            .finish_non_exhaustive()
    }
}

/// A block of PCM audio (or, for [`Message::Silence`], a duration of
/// digital silence with no backing bytes), time-stamped in jiffies.
#[derive(Debug, Clone)]
pub struct AudioPcmInfo {
    pub stream_id: u32,
    /// Position in jiffies of the first sample of this block, relative to
    /// the owning `DecodedStream`'s `sample_start_jiffies`.
    pub position_jiffies: u64,
    pub duration_jiffies: u64,
    pub sample_rate: u32,
    pub num_channels: u16,
    pub bit_depth: u16,
    pub data: Bytes,
    pub ramp: Ramp,
}

/// A duration of digital silence with no backing sample data — emitted by
/// the variable delay, starvation monitor, and pre-driver/silencer rather
/// than allocating zeroed buffers up front.
#[derive(Debug, Clone)]
pub struct SilenceInfo {
    pub stream_id: u32,
    pub position_jiffies: u64,
    pub duration_jiffies: u64,
    pub sample_rate: u32,
    pub num_channels: u16,
    pub bit_depth: u16,
    pub ramp: Ramp,
}

/// A final, immutable, ramp-applied block ready for the driver. Produced
/// by the pre-driver/silencer from an `AudioPcm` or `Silence` once its
/// ramp has been baked into concrete sample bytes.
#[derive(Debug, Clone)]
pub struct PlayableInfo {
    pub stream_id: u32,
    pub position_jiffies: u64,
    pub duration_jiffies: u64,
    pub sample_rate: u32,
    pub num_channels: u16,
    pub bit_depth: u16,
    pub data: Bytes,
}

/// The tagged union every pipeline element consumes and produces.
///
/// Audio-carrying variants (`AudioPcm`, `Silence`, `Playable`) each carry
/// their own `stream_id`; everything else is either a one-shot control
/// message (`Halt`, `Flush`, `Quit`) or metadata (`Mode`, `Track`,
/// `MetaText`, `DecodedStream`, `BitRate`).
#[derive(Clone)]
pub enum Message {
    Mode(Arc<ModeInfo>),
    Track(Arc<TrackInfo>),
    Drain(Arc<parking_lot::Mutex<Option<DrainInfo>>>),
    Delay { target_jiffies: u64 },
    EncodedStream(Arc<EncodedStreamInfo>),
    EncodedAudio(Bytes),
    MetaText(Arc<str>),
    StreamInterrupted,
    Wait,
    /// "No more audio for a while"; carries a correlator id.
    Halt { id: u32 },
    /// "Discard until this id passes"; carries a correlator id.
    Flush { id: u32 },
    DecodedStream(Arc<DecodedStreamInfo>),
    BitRate(u32),
    AudioPcm(AudioPcmInfo),
    Silence(SilenceInfo),
    Playable(PlayableInfo),
    Quit,
}

impl Message {
    /// The stream id this message targets, if it carries one. Used by
    /// elements that must direct a control command (Seek/Stop) only at
    /// the stream it was issued for (spec.md §3 "Stream identifiers").
    #[must_use]
    pub fn stream_id(&self) -> Option<u32> {
        match self {
            Message::EncodedStream(s) => Some(s.stream_id),
            Message::DecodedStream(s) => Some(s.stream_id),
            Message::AudioPcm(a) => Some(a.stream_id),
            Message::Silence(s) => Some(s.stream_id),
            Message::Playable(p) => Some(p.stream_id),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_audio(&self) -> bool {
        matches!(
            self,
            Message::AudioPcm(_) | Message::Silence(_) | Message::Playable(_)
        )
    }

    /// Ramp carried by this message, if it's audio-carrying.
    #[must_use]
    pub fn ramp(&self) -> Option<Ramp> {
        match self {
            Message::AudioPcm(a) => Some(a.ramp),
            Message::Silence(s) => Some(s.ramp),
            _ => None,
        }
    }

    #[must_use]
    pub fn duration_jiffies(&self) -> Option<u64> {
        match self {
            Message::AudioPcm(a) => Some(a.duration_jiffies),
            Message::Silence(s) => Some(s.duration_jiffies),
            Message::Playable(p) => Some(p.duration_jiffies),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Mode(m) => f.debug_tuple("Mode").field(&m.name).finish(),
            Message::Track(t) => f.debug_tuple("Track").field(&t.track_id).finish(),
            Message::Drain(_) => write!(f, "Drain"),
            Message::Delay { target_jiffies } => {
                f.debug_struct("Delay").field("target_jiffies", target_jiffies).finish()
            }
            Message::EncodedStream(s) => f.debug_tuple("EncodedStream").field(s).finish(),
            Message::EncodedAudio(b) => f.debug_tuple("EncodedAudio").field(&b.len()).finish(),
            Message::MetaText(_) => write!(f, "MetaText"),
            Message::StreamInterrupted => write!(f, "StreamInterrupted"),
            Message::Wait => write!(f, "Wait"),
            Message::Halt { id } => f.debug_struct("Halt").field("id", id).finish(),
            Message::Flush { id } => f.debug_struct("Flush").field("id", id).finish(),
            Message::DecodedStream(s) => f.debug_tuple("DecodedStream").field(s).finish(),
            Message::BitRate(b) => f.debug_tuple("BitRate").field(b).finish(),
            Message::AudioPcm(a) => f
                .debug_struct("AudioPcm")
                .field("stream_id", &a.stream_id)
                .field("position_jiffies", &a.position_jiffies)
                .field("duration_jiffies", &a.duration_jiffies)
                .finish(),
            Message::Silence(s) => f
                .debug_struct("Silence")
                .field("stream_id", &s.stream_id)
                .field("duration_jiffies", &s.duration_jiffies)
                .finish(),
            Message::Playable(p) => f
                .debug_struct("Playable")
                .field("stream_id", &p.stream_id)
                .field("duration_jiffies", &p.duration_jiffies)
                .finish(),
            Message::Quit => write!(f, "Quit"),
        }
    }
}

/// A message drawn from the shared [`Pool`](super::pool::Pool), possibly
/// shared across branches (see [`Shared`]).
pub type PooledMessage = Shared<Message>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_id_present_only_on_stream_scoped_variants() {
        assert_eq!(Message::Quit.stream_id(), None);
        assert_eq!(Message::Halt { id: 3 }.stream_id(), None);
        let pcm = Message::AudioPcm(AudioPcmInfo {
            stream_id: 7,
            position_jiffies: 0,
            duration_jiffies: 100,
            sample_rate: 44_100,
            num_channels: 2,
            bit_depth: 16,
            data: Bytes::new(),
            ramp: Ramp::NONE,
        });
        assert_eq!(pcm.stream_id(), Some(7));
    }
}
