//! The message layer: the `Message` tagged union, its pooling, jiffies
//! time arithmetic, ramp envelopes, and id allocation — everything every
//! pipeline element builds on (spec.md §3, §9).

mod ids;
mod jiffies;
mod pool;
mod ramp;
mod types;

pub use ids::{IdManager, MonotoneCounter, StreamPlay, FLUSH_ID_INVALID};
pub use jiffies::{
    bytes_to_jiffies, is_exact_sample_rate, jiffies_per_sample, jiffies_to_bytes,
    jiffies_to_samples, ms_to_jiffies, samples_to_jiffies, JIFFIES_PER_SECOND,
    SUPPORTED_SAMPLE_RATES,
};
pub use pool::{Pool, PoolHandle, Shared};
pub use ramp::{Ramp, RampDirection, RAMP_MAX, RAMP_MIN};
pub use types::{
    AudioPcmInfo, DecodedStreamInfo, DrainInfo, EncodedStreamFlags, EncodedStreamInfo, Message,
    Metadata, ModeFlags, ModeInfo, PlayableInfo, PooledMessage, SilenceInfo, TrackInfo,
};
