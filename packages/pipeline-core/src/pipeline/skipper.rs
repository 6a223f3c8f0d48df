//! Skipper (spec.md §4.5): `RemoveCurrentStream` ramps the current audio
//! down, emits a self-generated Flush that swallows whatever remains of
//! the current stream, and ramps the next `DecodedStream`'s audio back up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::message::{IdManager, Message, Pool, PooledMessage};
use crate::pipeline::ramp_gate::RampGate;
use crate::pipeline::Pullable;

pub struct Skipper<U> {
    upstream: U,
    pool: Pool<Message>,
    ids: Arc<IdManager>,
    gate: RampGate,
    requested: AtomicBool,
    draining: AtomicBool,
}

impl<U: Pullable> Skipper<U> {
    #[must_use]
    pub fn new(upstream: U, pool: Pool<Message>, ids: Arc<IdManager>, ramp_duration_jiffies: u64) -> Self {
        Self {
            upstream,
            pool,
            ids,
            gate: RampGate::new(ramp_duration_jiffies),
            requested: AtomicBool::new(false),
            draining: AtomicBool::new(false),
        }
    }

    /// Requests that the current stream be skipped, effective on the next
    /// ramp/flush cycle. Safe to call from any thread.
    pub fn remove_current_stream(&self) {
        self.requested.store(true, Ordering::Release);
    }

    fn rebuild_with_ramp(&self, msg: &PooledMessage, ramp: crate::message::Ramp) -> PooledMessage {
        match &**msg {
            Message::AudioPcm(pcm) => {
                let mut pcm = pcm.clone();
                pcm.ramp = ramp;
                self.pool.alloc_shared(Message::AudioPcm(pcm))
            }
            Message::Silence(s) => {
                let mut s = s.clone();
                s.ramp = ramp;
                self.pool.alloc_shared(Message::Silence(s))
            }
            _ => msg.clone(),
        }
    }
}

impl<U: Pullable> Pullable for Skipper<U> {
    fn pull(&self) -> PooledMessage {
        loop {
            if self.requested.swap(false, Ordering::AcqRel) && !self.draining.load(Ordering::Acquire) {
                self.gate.request_ramp_down();
            }

            let msg = self.upstream.pull();

            if self.draining.load(Ordering::Acquire) {
                match &*msg {
                    Message::DecodedStream(_) => {
                        self.draining.store(false, Ordering::Release);
                        self.gate.request_ramp_up();
                        return msg;
                    }
                    Message::Quit => return msg,
                    _ => continue,
                }
            }

            let duration = match &*msg {
                Message::AudioPcm(p) => p.duration_jiffies,
                Message::Silence(s) => s.duration_jiffies,
                _ => return msg,
            };

            match self.gate.apply(duration) {
                Some(ramp) => {
                    if self.gate.is_suspended() {
                        // The ramp-down completed within this very span; swallow
                        // this segment and flush now instead of delivering it,
                        // matching the already-suspended (`None`) case below.
                        self.draining.store(true, Ordering::Release);
                        let flush_id = self.ids.next_flush_id();
                        return self.pool.alloc_shared(Message::Flush { id: flush_id });
                    }
                    return self.rebuild_with_ramp(&msg, ramp);
                }
                None => {
                    self.draining.store(true, Ordering::Release);
                    let flush_id = self.ids.next_flush_id();
                    return self.pool.alloc_shared(Message::Flush { id: flush_id });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{AudioPcmInfo, DecodedStreamInfo, Ramp};
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    struct NoopStreamHandler;
    impl crate::interfaces::StreamHandler for NoopStreamHandler {
        fn ok_to_play(&self, _stream_id: u32) -> crate::message::StreamPlay {
            crate::message::StreamPlay::Yes
        }
        fn try_seek(&self, _stream_id: u32, _byte_offset: u64) -> u32 {
            0
        }
        fn try_stop(&self, _stream_id: u32) -> u32 {
            0
        }
        fn notify_starving(&self, _mode: &str, _stream_id: u32) {}
    }

    struct ScriptedUpstream {
        queue: StdMutex<VecDeque<PooledMessage>>,
    }

    impl Pullable for ScriptedUpstream {
        fn pull(&self) -> PooledMessage {
            self.queue.lock().unwrap().pop_front().expect("script exhausted")
        }
    }

    fn pcm(pool: &Pool<Message>, duration: u64) -> PooledMessage {
        pool.alloc_shared(Message::AudioPcm(AudioPcmInfo {
            stream_id: 1,
            position_jiffies: 0,
            duration_jiffies: duration,
            sample_rate: 44_100,
            num_channels: 2,
            bit_depth: 16,
            data: bytes::Bytes::new(),
            ramp: Ramp::NONE,
        }))
    }

    #[test]
    fn skip_ramps_down_flushes_then_ramps_up_on_next_stream() {
        let pool: Pool<Message> = Pool::new(32);
        let mut queue = VecDeque::new();
        queue.push_back(pcm(&pool, 60));
        queue.push_back(pcm(&pool, 60));
        queue.push_back(pool.alloc_shared(Message::DecodedStream(Arc::new(DecodedStreamInfo {
            stream_id: 2,
            bit_rate: 0,
            bit_depth: 16,
            sample_rate: 44_100,
            num_channels: 2,
            codec_name: "raw-pcm".into(),
            track_length_jiffies: 0,
            sample_start_jiffies: 0,
            lossless: true,
            seekable: false,
            live: false,
            stream_handler: Arc::new(NoopStreamHandler),
        }))));
        queue.push_back(pcm(&pool, 60));

        let upstream = ScriptedUpstream { queue: StdMutex::new(queue) };
        let skipper = Skipper::new(upstream, pool, Arc::new(IdManager::new()), 100);
        skipper.remove_current_stream();

        let first = skipper.pull();
        assert!(matches!(&*first, Message::AudioPcm(p) if p.ramp.start() > p.ramp.end()));
        let second = skipper.pull();
        assert!(matches!(&*second, Message::Flush { .. }));
        let third = skipper.pull();
        assert!(matches!(&*third, Message::DecodedStream(_)));
        let fourth = skipper.pull();
        assert!(matches!(&*fourth, Message::AudioPcm(p) if p.ramp.is_enabled()));
    }
}
