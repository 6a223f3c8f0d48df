//! Variable delay (spec.md §4.8, used twice in the chain per spec.md §2
//! row 8): holds a target latency in jiffies. Each `Delay` message (or a
//! sample-rate change observed on a `DecodedStream`) compares the target
//! against what this element has already contributed and either inserts
//! a block of silence (target above current) or trims audio (target
//! below current), ramping around the edit via the shared [`RampGate`]
//! discipline.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::message::{bytes_to_jiffies, jiffies_to_bytes, Message, Pool, PooledMessage, SilenceInfo};
use crate::pipeline::ramp_gate::RampGate;
use crate::pipeline::Pullable;

#[derive(Clone, Copy)]
enum Pending {
    None,
    Insert { remaining_jiffies: u64 },
    Trim { remaining_jiffies: u64 },
}

#[derive(Clone, Copy, Default)]
struct Format {
    stream_id: u32,
    sample_rate: u32,
    num_channels: u16,
    bit_depth: u16,
}

pub struct VariableDelay<U> {
    upstream: U,
    pool: Pool<Message>,
    current_jiffies: AtomicU64,
    pending: Mutex<Pending>,
    format: Mutex<Format>,
    gate: RampGate,
}

impl<U: Pullable> VariableDelay<U> {
    #[must_use]
    pub fn new(upstream: U, pool: Pool<Message>, ramp_duration_jiffies: u64) -> Self {
        Self {
            upstream,
            pool,
            current_jiffies: AtomicU64::new(0),
            pending: Mutex::new(Pending::None),
            format: Mutex::new(Format::default()),
            gate: RampGate::new(ramp_duration_jiffies),
        }
    }

    fn retarget(&self, target_jiffies: u64) {
        let current = self.current_jiffies.swap(target_jiffies, Ordering::AcqRel);
        let diff = target_jiffies as i64 - current as i64;
        let mut pending = self.pending.lock();
        *pending = if diff > 0 {
            self.gate.request_ramp_down();
            Pending::Insert { remaining_jiffies: diff as u64 }
        } else if diff < 0 {
            self.gate.request_ramp_down();
            Pending::Trim { remaining_jiffies: (-diff) as u64 }
        } else {
            Pending::None
        };
    }

    fn silence(&self, duration_jiffies: u64) -> PooledMessage {
        let format = *self.format.lock();
        self.pool.alloc_shared(Message::Silence(SilenceInfo {
            stream_id: format.stream_id,
            position_jiffies: 0,
            duration_jiffies,
            sample_rate: format.sample_rate,
            num_channels: format.num_channels,
            bit_depth: format.bit_depth,
            ramp: crate::message::Ramp::NONE,
        }))
    }

    fn frame_bytes(format: Format) -> u64 {
        format.num_channels as u64 * (format.bit_depth as u64 / 8)
    }
}

impl<U: Pullable> Pullable for VariableDelay<U> {
    fn pull(&self) -> PooledMessage {
        loop {
            {
                let remaining = match *self.pending.lock() {
                    Pending::Insert { remaining_jiffies } => Some(remaining_jiffies),
                    _ => None,
                };
                if let Some(remaining) = remaining {
                    *self.pending.lock() = Pending::None;
                    self.gate.request_ramp_up();
                    return self.silence(remaining);
                }
            }

            let msg = self.upstream.pull();
            match &*msg {
                Message::Delay { target_jiffies } => {
                    self.retarget(*target_jiffies);
                    continue;
                }
                Message::DecodedStream(info) => {
                    *self.format.lock() = Format {
                        stream_id: info.stream_id,
                        sample_rate: info.sample_rate,
                        num_channels: info.num_channels,
                        bit_depth: info.bit_depth,
                    };
                    return msg;
                }
                Message::AudioPcm(pcm) => {
                    let remaining = match *self.pending.lock() {
                        Pending::Trim { remaining_jiffies } => remaining_jiffies,
                        _ => 0,
                    };
                    if remaining == 0 {
                        return msg;
                    }
                    let format = *self.format.lock();
                    let frame_bytes = Self::frame_bytes(format).max(1);
                    let drop_jiffies = remaining.min(pcm.duration_jiffies);
                    let drop_bytes =
                        jiffies_to_bytes(drop_jiffies, frame_bytes, pcm.sample_rate).min(pcm.data.len() as u64) as usize;

                    let left = remaining - drop_jiffies;
                    *self.pending.lock() = if left > 0 {
                        Pending::Trim { remaining_jiffies: left }
                    } else {
                        self.gate.request_ramp_up();
                        Pending::None
                    };

                    if drop_bytes >= pcm.data.len() {
                        continue;
                    }
                    let mut trimmed = pcm.clone();
                    let actually_dropped_jiffies = bytes_to_jiffies(drop_bytes as u64, frame_bytes, pcm.sample_rate);
                    trimmed.data = pcm.data.slice(drop_bytes..);
                    trimmed.duration_jiffies = pcm.duration_jiffies - actually_dropped_jiffies;
                    trimmed.position_jiffies = pcm.position_jiffies + actually_dropped_jiffies;
                    return self.pool.alloc_shared(Message::AudioPcm(trimmed));
                }
                _ => return msg,
            }
        }
    }
}
