//! Ramper (spec.md §4.6): ramps up the first audio of a `DecodedStream`
//! that began mid-stream (`sample_start_jiffies > 0`) or is live, since
//! those starts weren't already ramped by a Seeker/Skipper/Stopper.

use crate::message::{Message, Pool, PooledMessage};
use crate::pipeline::ramp_gate::RampGate;
use crate::pipeline::Pullable;

pub struct Ramper<U> {
    upstream: U,
    pool: Pool<Message>,
    gate: RampGate,
}

impl<U: Pullable> Ramper<U> {
    #[must_use]
    pub fn new(upstream: U, pool: Pool<Message>, ramp_duration_jiffies: u64) -> Self {
        Self {
            upstream,
            pool,
            gate: RampGate::new(ramp_duration_jiffies),
        }
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

impl<U: Pullable> Pullable for Ramper<U> {
    fn pull(&self) -> PooledMessage {
        let msg = self.upstream.pull();
        match &*msg {
            Message::DecodedStream(info) => {
                if info.sample_start_jiffies > 0 || info.live {
                    self.gate.suspend();
                    self.gate.request_ramp_up();
                } else {
                    self.gate.run();
                }
                msg
            }
            Message::AudioPcm(p) => match self.gate.apply(p.duration_jiffies) {
                Some(ramp) => self.rebuild_with_ramp(&msg, ramp),
                None => msg,
            },
            Message::Silence(s) => match self.gate.apply(s.duration_jiffies) {
                Some(ramp) => self.rebuild_with_ramp(&msg, ramp),
                None => msg,
            },
            _ => msg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{AudioPcmInfo, DecodedStreamInfo, Ramp};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct ScriptedUpstream {
        queue: Mutex<VecDeque<PooledMessage>>,
    }

    impl Pullable for ScriptedUpstream {
        fn pull(&self) -> PooledMessage {
            self.queue.lock().unwrap().pop_front().expect("script exhausted")
        }
    }

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

    #[test]
    fn mid_stream_start_ramps_up_from_silence() {
        let pool: Pool<Message> = Pool::new(16);
        let mut queue = VecDeque::new();
        queue.push_back(pool.alloc_shared(Message::DecodedStream(Arc::new(DecodedStreamInfo {
            stream_id: 1,
            bit_rate: 0,
            bit_depth: 16,
            sample_rate: 44_100,
            num_channels: 2,
            codec_name: "raw-pcm".into(),
            track_length_jiffies: 0,
            sample_start_jiffies: 44_100,
            lossless: true,
            seekable: true,
            live: false,
            stream_handler: Arc::new(NoopStreamHandler),
        }))));
        queue.push_back(pool.alloc_shared(Message::AudioPcm(AudioPcmInfo {
            stream_id: 1,
            position_jiffies: 0,
            duration_jiffies: 100,
            sample_rate: 44_100,
            num_channels: 2,
            bit_depth: 16,
            data: bytes::Bytes::new(),
            ramp: Ramp::NONE,
        })));
        let upstream = ScriptedUpstream { queue: Mutex::new(queue) };
        let ramper = Ramper::new(upstream, pool, 100);

        let first = ramper.pull();
        assert!(matches!(&*first, Message::DecodedStream(_)));
        let second = ramper.pull();
        assert!(matches!(&*second, Message::AudioPcm(p) if p.ramp.start() < p.ramp.end()));
    }
}
