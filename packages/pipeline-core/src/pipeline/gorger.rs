//! Gorger (spec.md §4.7): sits upstream of the decoded reservoir. When a
//! non-real-time mode begins, it holds its downstream `Pull` back until
//! the reservoir holds at least `gorge_size_jiffies` of audio, then lets
//! pulls through normally until the next mid-stream Halt re-arms gorging.
//! Disabled entirely for real-time modes (e.g. Songcast), which can't
//! tolerate the startup latency a gorge adds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::message::{Message, PooledMessage};
use crate::pipeline::reservoir::{DecodedJiffies, Reservoir};
use crate::pipeline::Pullable;

pub struct Gorger {
    upstream: Arc<Reservoir<DecodedJiffies>>,
    gorge_size_jiffies: u64,
    gorging: AtomicBool,
    real_time: AtomicBool,
}

impl Gorger {
    #[must_use]
    pub fn new(upstream: Arc<Reservoir<DecodedJiffies>>, gorge_size_jiffies: u64) -> Self {
        Self {
            upstream,
            gorge_size_jiffies,
            gorging: AtomicBool::new(true),
            real_time: AtomicBool::new(false),
        }
    }

    /// Switches between real-time (gorge disabled) and non-real-time
    /// (gorge enabled) mode, called when the active `Mode` changes.
    pub fn set_real_time(&self, real_time: bool) {
        self.real_time.store(real_time, Ordering::Release);
        if real_time {
            self.gorging.store(false, Ordering::Release);
        }
    }

    fn rearm(&self) {
        if !self.real_time.load(Ordering::Acquire) {
            self.gorging.store(true, Ordering::Release);
        }
    }
}

impl Pullable for Gorger {
    fn pull(&self) -> PooledMessage {
        if self.gorging.load(Ordering::Acquire) && !self.real_time.load(Ordering::Acquire) {
            self.upstream.wait_for_fill(self.gorge_size_jiffies);
            self.gorging.store(false, Ordering::Release);
        }
        let msg = self.upstream.pull();
        if matches!(&*msg, Message::Halt { .. }) {
            self.rearm();
        }
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Pool;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn blocks_downstream_pull_until_gorge_size_reached() {
        let reservoir = Arc::new(Reservoir::new(u64::MAX, DecodedJiffies));
        let gorger = Arc::new(Gorger::new(reservoir.clone(), 200));
        let pool: Pool<Message> = Pool::new(8);

        let g2 = gorger.clone();
        let handle = thread::spawn(move || g2.pull());
        thread::sleep(Duration::from_millis(20));

        reservoir.push(pool.alloc_shared(Message::AudioPcm(crate::message::AudioPcmInfo {
            stream_id: 1,
            position_jiffies: 0,
            duration_jiffies: 50,
            sample_rate: 44_100,
            num_channels: 2,
            bit_depth: 16,
            data: bytes::Bytes::new(),
            ramp: crate::message::Ramp::NONE,
        })));
        thread::sleep(Duration::from_millis(20));
        assert!(!handle.is_finished(), "gorge size not reached yet");

        reservoir.push(pool.alloc_shared(Message::AudioPcm(crate::message::AudioPcmInfo {
            stream_id: 1,
            position_jiffies: 50,
            duration_jiffies: 200,
            sample_rate: 44_100,
            num_channels: 2,
            bit_depth: 16,
            data: bytes::Bytes::new(),
            ramp: crate::message::Ramp::NONE,
        })));
        let msg = handle.join().unwrap();
        assert!(matches!(&*msg, Message::AudioPcm(_)));
    }

    #[test]
    fn real_time_mode_disables_the_gorge() {
        let reservoir = Arc::new(Reservoir::new(u64::MAX, DecodedJiffies));
        let gorger = Gorger::new(reservoir.clone(), 1_000_000);
        gorger.set_real_time(true);
        let pool: Pool<Message> = Pool::new(8);
        reservoir.push(pool.alloc_shared(Message::Quit));
        assert!(matches!(&*gorger.pull(), Message::Quit));
    }
}
