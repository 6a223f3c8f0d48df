//! Concrete codecs. The core ships only the raw-PCM passthrough; real
//! decoders (WAV, FLAC, MP3, AAC, ALAC, Vorbis, AIFF) are external
//! collaborators registered with the [`codec controller`](crate::pipeline::codec_controller)
//! at construction time (spec.md §1 "Out of scope").

mod raw_pcm;

pub use raw_pcm::{RawPcmCodec, RawPcmFormat};
