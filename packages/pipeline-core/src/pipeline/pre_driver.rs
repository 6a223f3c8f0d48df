//! Pre-driver / Silencer (SPEC_FULL.md §4.14): the last element before the
//! driver boundary. Bakes each message's ramp envelope into concrete
//! sample bytes and hands the driver a `Playable` it can write out with no
//! further interpretation. If upstream (the starvation monitor) produces
//! nothing within `max_stalled_pulls` consecutive pulls — it's mid
//! recovery, buffering — this synthesizes a silent `Playable` instead of
//! blocking the driver thread indefinitely, using the same cached
//! silence-buffer idiom as the teacher's `stream/mod.rs`.

use std::collections::HashMap;
use std::sync::OnceLock;

use bytes::{Bytes, BytesMut};
use parking_lot::RwLock;

use crate::message::{jiffies_to_bytes, Message, Pool, PooledMessage, Ramp};
use crate::pipeline::Pullable;

static SILENCE_CACHE: OnceLock<RwLock<HashMap<usize, Bytes>>> = OnceLock::new();

fn get_or_create_silence(byte_len: usize) -> Bytes {
    let cache = SILENCE_CACHE.get_or_init(|| RwLock::new(HashMap::new()));

    if let Some(silence) = cache.read().get(&byte_len) {
        return silence.clone();
    }

    let mut cache_write = cache.write();
    if let Some(silence) = cache_write.get(&byte_len) {
        return silence.clone();
    }

    let silence = Bytes::from(vec![0u8; byte_len]);
    cache_write.insert(byte_len, silence.clone());
    silence
}

/// Scales 16-bit signed PCM samples in place by a ramp whose value moves
/// linearly from `ramp.start()` to `ramp.end()` across the block.
fn apply_ramp_16bit(data: &Bytes, ramp: Ramp) -> Bytes {
    if !ramp.is_enabled() {
        return data.clone();
    }
    let num_samples = data.len() / 2;
    if num_samples == 0 {
        return data.clone();
    }
    let mut out = BytesMut::with_capacity(data.len());
    for i in 0..num_samples {
        let fraction = if num_samples > 1 {
            i as f64 / (num_samples - 1) as f64
        } else {
            1.0
        };
        let gain = ramp.value_at(fraction) as f64 / u32::MAX as f64;
        let raw = i16::from_le_bytes([data[i * 2], data[i * 2 + 1]]);
        let scaled = (raw as f64 * gain).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        out.extend_from_slice(&scaled.to_le_bytes());
    }
    out.freeze()
}

pub struct PreDriver<U> {
    upstream: U,
    pool: Pool<Message>,
    max_stalled_pulls: u32,
}

impl<U: Pullable> PreDriver<U> {
    #[must_use]
    pub fn new(upstream: U, pool: Pool<Message>, max_stalled_pulls: u32) -> Self {
        Self {
            upstream,
            pool,
            max_stalled_pulls,
        }
    }

    fn to_playable(&self, msg: &PooledMessage) -> Option<PooledMessage> {
        match &**msg {
            Message::AudioPcm(pcm) => Some(self.pool.alloc_shared(Message::Playable(
                crate::message::PlayableInfo {
                    stream_id: pcm.stream_id,
                    position_jiffies: pcm.position_jiffies,
                    duration_jiffies: pcm.duration_jiffies,
                    sample_rate: pcm.sample_rate,
                    num_channels: pcm.num_channels,
                    bit_depth: pcm.bit_depth,
                    data: apply_ramp_16bit(&pcm.data, pcm.ramp),
                },
            ))),
            Message::Silence(s) => {
                let frame_bytes = u64::from(s.num_channels) * u64::from(s.bit_depth) / 8;
                let byte_len =
                    jiffies_to_bytes(s.duration_jiffies, frame_bytes, s.sample_rate) as usize;
                Some(self.pool.alloc_shared(Message::Playable(
                    crate::message::PlayableInfo {
                        stream_id: s.stream_id,
                        position_jiffies: s.position_jiffies,
                        duration_jiffies: s.duration_jiffies,
                        sample_rate: s.sample_rate,
                        num_channels: s.num_channels,
                        bit_depth: s.bit_depth,
                        data: get_or_create_silence(byte_len),
                    },
                )))
            }
            _ => None,
        }
    }
}

impl<U: Pullable> Pullable for PreDriver<U> {
    fn pull(&self) -> PooledMessage {
        let mut stalled = 0u32;
        loop {
            let msg = self.upstream.pull();
            match self.to_playable(&msg) {
                Some(playable) => return playable,
                None => {
                    if matches!(&*msg, Message::Playable(_)) {
                        return msg;
                    }
                    stalled += 1;
                    if stalled >= self.max_stalled_pulls {
                        return self.pool.alloc_shared(Message::Playable(
                            crate::message::PlayableInfo {
                                stream_id: 0,
                                position_jiffies: 0,
                                duration_jiffies: crate::message::ms_to_jiffies(20),
                                sample_rate: 44_100,
                                num_channels: 2,
                                bit_depth: 16,
                                data: get_or_create_silence(44_100 / 50 * 4),
                            },
                        ));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{AudioPcmInfo, RampDirection, SilenceInfo};
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    struct ScriptedUpstream {
        queue: StdMutex<VecDeque<PooledMessage>>,
    }

    impl Pullable for ScriptedUpstream {
        fn pull(&self) -> PooledMessage {
            self.queue.lock().unwrap().pop_front().expect("script exhausted")
        }
    }

    #[test]
    fn full_volume_audio_passes_through_byte_for_byte() {
        let pool: Pool<Message> = Pool::new(8);
        let samples: Vec<i16> = vec![1000, -1000, 2000, -2000];
        let mut bytes = BytesMut::new();
        for s in &samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        let mut queue = VecDeque::new();
        queue.push_back(pool.alloc_shared(Message::AudioPcm(AudioPcmInfo {
            stream_id: 1,
            position_jiffies: 0,
            duration_jiffies: 100,
            sample_rate: 44_100,
            num_channels: 2,
            bit_depth: 16,
            data: bytes.freeze(),
            ramp: Ramp::NONE,
        })));
        let upstream = ScriptedUpstream { queue: StdMutex::new(queue) };
        let driver = PreDriver::new(upstream, pool, 10);

        let out = driver.pull();
        match &*out {
            Message::Playable(p) => {
                let first = i16::from_le_bytes([p.data[0], p.data[1]]);
                assert_eq!(first, 1000);
            }
            _ => panic!("expected Playable"),
        }
    }

    #[test]
    fn ramped_down_audio_is_attenuated_towards_silence() {
        let pool: Pool<Message> = Pool::new(8);
        let samples: Vec<i16> = vec![10_000; 8];
        let mut bytes = BytesMut::new();
        for s in &samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        let mut queue = VecDeque::new();
        queue.push_back(pool.alloc_shared(Message::AudioPcm(AudioPcmInfo {
            stream_id: 1,
            position_jiffies: 0,
            duration_jiffies: 100,
            sample_rate: 44_100,
            num_channels: 2,
            bit_depth: 16,
            data: bytes.freeze(),
            ramp: Ramp::new(u32::MAX, 0, RampDirection::Down),
        })));
        let upstream = ScriptedUpstream { queue: StdMutex::new(queue) };
        let driver = PreDriver::new(upstream, pool, 10);

        let out = driver.pull();
        match &*out {
            Message::Playable(p) => {
                let first = i16::from_le_bytes([p.data[0], p.data[1]]);
                let last_idx = p.data.len() - 2;
                let last = i16::from_le_bytes([p.data[last_idx], p.data[last_idx + 1]]);
                assert!(first > last);
                assert_eq!(last, 0);
            }
            _ => panic!("expected Playable"),
        }
    }

    #[test]
    fn silence_message_becomes_playable_with_cached_zero_buffer() {
        let pool: Pool<Message> = Pool::new(8);
        let mut queue = VecDeque::new();
        queue.push_back(pool.alloc_shared(Message::Silence(SilenceInfo {
            stream_id: 1,
            position_jiffies: 0,
            duration_jiffies: crate::message::ms_to_jiffies(10),
            sample_rate: 44_100,
            num_channels: 2,
            bit_depth: 16,
            ramp: Ramp::NONE,
        })));
        let upstream = ScriptedUpstream { queue: StdMutex::new(queue) };
        let driver = PreDriver::new(upstream, pool, 10);

        let out = driver.pull();
        match &*out {
            Message::Playable(p) => assert!(p.data.iter().all(|&b| b == 0)),
            _ => panic!("expected Playable"),
        }
    }
}
