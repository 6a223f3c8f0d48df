//! Muter (spec.md §4.10): externally-driven ramp-down to silence and
//! ramp-up from silence, with the same ramp-interruption algebra as
//! Stopper/Skipper/Waiter — reuses [`RampGate`] directly with no flush or
//! halt bookkeeping of its own, since muting never discards anything, it
//! only rides the current audio's volume down and back up.

use crate::message::{Message, Pool, PooledMessage};
use crate::pipeline::ramp_gate::RampGate;
use crate::pipeline::Pullable;

pub struct Muter<U> {
    upstream: U,
    pool: Pool<Message>,
    gate: RampGate,
}

impl<U: Pullable> Muter<U> {
    #[must_use]
    pub fn new(upstream: U, pool: Pool<Message>, ramp_duration_jiffies: u64) -> Self {
        Self {
            upstream,
            pool,
            gate: RampGate::new(ramp_duration_jiffies),
        }
    }

    /// Ramps audio down to silence. Safe to call from any thread.
    pub fn mute(&self) {
        self.gate.request_ramp_down();
    }

    /// Ramps audio back up to full volume. Safe to call from any thread.
    pub fn unmute(&self) {
        self.gate.request_ramp_up();
    }

    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.gate.is_suspended()
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

impl<U: Pullable> Pullable for Muter<U> {
    fn pull(&self) -> PooledMessage {
        let msg = self.upstream.pull();
        let duration = match &*msg {
            Message::AudioPcm(p) => p.duration_jiffies,
            Message::Silence(s) => s.duration_jiffies,
            _ => return msg,
        };
        match self.gate.apply(duration) {
            Some(ramp) => self.rebuild_with_ramp(&msg, ramp),
            None => {
                let format = match &*msg {
                    Message::AudioPcm(p) => (p.stream_id, p.position_jiffies, p.sample_rate, p.num_channels, p.bit_depth),
                    Message::Silence(s) => (s.stream_id, s.position_jiffies, s.sample_rate, s.num_channels, s.bit_depth),
                    _ => unreachable!("duration match above guarantees AudioPcm or Silence"),
                };
                self.pool.alloc_shared(Message::Silence(crate::message::SilenceInfo {
                    stream_id: format.0,
                    position_jiffies: format.1,
                    duration_jiffies: duration,
                    sample_rate: format.2,
                    num_channels: format.3,
                    bit_depth: format.4,
                    ramp: crate::message::Ramp::NONE,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{AudioPcmInfo, Ramp};
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
    fn mute_ramps_to_silence_then_unmute_ramps_back() {
        let pool: Pool<Message> = Pool::new(32);
        let mut queue = VecDeque::new();
        for _ in 0..4 {
            queue.push_back(pcm(&pool, 50));
        }
        let upstream = ScriptedUpstream { queue: StdMutex::new(queue) };
        let muter = Muter::new(upstream, pool, 50);
        muter.mute();

        let first = muter.pull();
        assert!(matches!(&*first, Message::AudioPcm(p) if p.ramp.start() > p.ramp.end()));
        let second = muter.pull();
        assert!(matches!(&*second, Message::Silence(_)));
        assert!(muter.is_muted());

        muter.unmute();
        let third = muter.pull();
        assert!(matches!(&*third, Message::AudioPcm(p) if p.ramp.start() < p.ramp.end()));
    }
}
