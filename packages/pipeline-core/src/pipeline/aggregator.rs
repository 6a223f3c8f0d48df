//! Decoded-audio aggregator (spec.md §2 row 5): coalesces the small,
//! codec-native `AudioPcm` fragments the codec controller emits into
//! larger, sample-aligned blocks before they reach the decoded reservoir.
//! Ramped fragments are never merged — an active ramp's start/end only
//! make sense attached to the exact message it was computed for, so a
//! ramped `AudioPcm` flushes whatever is pending and passes straight
//! through.

use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;

use crate::message::{AudioPcmInfo, Message, Pool, PooledMessage, Ramp};
use crate::pipeline::reservoir::{DecodedJiffies, Reservoir};
use crate::pipeline::Pullable;

struct Pending {
    stream_id: u32,
    position_jiffies: u64,
    duration_jiffies: u64,
    sample_rate: u32,
    num_channels: u16,
    bit_depth: u16,
    data: BytesMut,
}

/// Push-side coalescing stage sitting in front of the decoded reservoir.
pub struct Aggregator {
    reservoir: Arc<Reservoir<DecodedJiffies>>,
    pool: Pool<Message>,
    pending: Mutex<Option<Pending>>,
    target_jiffies: u64,
}

impl Aggregator {
    #[must_use]
    pub fn new(reservoir: Arc<Reservoir<DecodedJiffies>>, pool: Pool<Message>, target_jiffies: u64) -> Self {
        Self {
            reservoir,
            pool,
            pending: Mutex::new(None),
            target_jiffies,
        }
    }

    fn flush_locked(&self, slot: &mut Option<Pending>) {
        if let Some(p) = slot.take() {
            self.reservoir.push(self.pool.alloc_shared(Message::AudioPcm(AudioPcmInfo {
                stream_id: p.stream_id,
                position_jiffies: p.position_jiffies,
                duration_jiffies: p.duration_jiffies,
                sample_rate: p.sample_rate,
                num_channels: p.num_channels,
                bit_depth: p.bit_depth,
                data: p.data.freeze(),
                ramp: Ramp::NONE,
            })));
        }
    }

    pub fn push(&self, msg: PooledMessage) {
        let pcm = match &*msg {
            Message::AudioPcm(pcm) if !pcm.ramp.is_enabled() => pcm.clone(),
            _ => {
                let mut slot = self.pending.lock();
                self.flush_locked(&mut slot);
                drop(slot);
                self.reservoir.push(msg);
                return;
            }
        };

        let mut slot = self.pending.lock();
        let compatible = slot.as_ref().is_some_and(|p| {
            p.stream_id == pcm.stream_id
                && p.sample_rate == pcm.sample_rate
                && p.num_channels == pcm.num_channels
                && p.bit_depth == pcm.bit_depth
                && p.position_jiffies + p.duration_jiffies == pcm.position_jiffies
        });

        if !compatible {
            self.flush_locked(&mut slot);
            *slot = Some(Pending {
                stream_id: pcm.stream_id,
                position_jiffies: pcm.position_jiffies,
                duration_jiffies: 0,
                sample_rate: pcm.sample_rate,
                num_channels: pcm.num_channels,
                bit_depth: pcm.bit_depth,
                data: BytesMut::new(),
            });
        }

        let pending = slot.as_mut().expect("just ensured present");
        pending.data.extend_from_slice(&pcm.data);
        pending.duration_jiffies += pcm.duration_jiffies;

        if pending.duration_jiffies >= self.target_jiffies {
            self.flush_locked(&mut slot);
        }
    }

    /// Forces out whatever is pending (used on Halt/Flush/Quit boundaries
    /// where waiting for `target_jiffies` would stall the pipeline).
    pub fn drain(&self) {
        let mut slot = self.pending.lock();
        self.flush_locked(&mut slot);
    }
}

impl Pullable for Aggregator {
    fn pull(&self) -> PooledMessage {
        self.reservoir.pull()
    }
}
