//! Stopper (spec.md §4.5): `Pause` ramps down then stops pulling upstream
//! entirely ("consume nothing") until `Play` ramps back up; `Stop(haltId)`
//! ramps down, discards until the matching Halt passes, then behaves like
//! a pause; `RemoveStream(streamId)` is Skipper's discipline but targeted
//! at a specific stream id rather than "whatever is current".

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::message::{Message, Pool, PooledMessage};
use crate::pipeline::ramp_gate::{GatePhase, RampGate};
use crate::pipeline::Pullable;

#[derive(Clone, Copy)]
enum Target {
    Pause,
    Stop { halt_id: u32 },
    RemoveStream { stream_id: u32 },
}

pub struct Stopper<U> {
    upstream: U,
    pool: Pool<Message>,
    gate: RampGate,
    requested: Mutex<Option<Target>>,
    draining: Mutex<Option<Target>>,
    paused: AtomicBool,
    paused_cv: Condvar,
    paused_lock: Mutex<()>,
}

impl<U: Pullable> Stopper<U> {
    #[must_use]
    pub fn new(upstream: U, pool: Pool<Message>, ramp_duration_jiffies: u64) -> Self {
        Self {
            upstream,
            pool,
            gate: RampGate::new(ramp_duration_jiffies),
            requested: Mutex::new(None),
            draining: Mutex::new(None),
            paused: AtomicBool::new(false),
            paused_cv: Condvar::new(),
            paused_lock: Mutex::new(()),
        }
    }

    pub fn pause(&self) {
        *self.requested.lock() = Some(Target::Pause);
    }

    pub fn stop(&self, halt_id: u32) {
        *self.requested.lock() = Some(Target::Stop { halt_id });
    }

    pub fn remove_stream(&self, stream_id: u32) {
        *self.requested.lock() = Some(Target::RemoveStream { stream_id });
    }

    /// Resumes from `Pause`/`Stop`, ramping audio back up.
    pub fn play(&self) {
        self.paused.store(false, Ordering::Release);
        self.gate.request_ramp_up();
        self.paused_cv.notify_all();
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
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

impl<U: Pullable> Pullable for Stopper<U> {
    fn pull(&self) -> PooledMessage {
        loop {
            {
                let mut guard = self.paused_lock.lock();
                while self.paused.load(Ordering::Acquire) {
                    self.paused_cv.wait(&mut guard);
                }
            }

            if let Some(target) = self.requested.lock().take() {
                self.gate.request_ramp_down();
                *self.draining.lock() = Some(target);
            }

            let msg = self.upstream.pull();

            let duration = match &*msg {
                Message::AudioPcm(p) => Some(p.duration_jiffies),
                Message::Silence(s) => Some(s.duration_jiffies),
                _ => None,
            };

            if let Some(d) = duration {
                if self.gate.phase() != GatePhase::Running {
                    match self.gate.apply(d) {
                        Some(ramp) => {
                            if self.gate.is_suspended() {
                                // The ramp-down completed within this very span;
                                // engage pause now rather than waiting for a
                                // later `None`, which may never come if the
                                // next message isn't audio.
                                if let Some(Target::Pause) = self.draining.lock().take() {
                                    self.paused.store(true, Ordering::Release);
                                }
                            }
                            return self.rebuild_with_ramp(&msg, ramp);
                        }
                        None => {
                            if let Some(Target::Pause) = self.draining.lock().take() {
                                self.paused.store(true, Ordering::Release);
                            }
                            continue;
                        }
                    }
                }
            }

            let target = *self.draining.lock();
            if let Some(target) = target {
                match target {
                    Target::Pause => continue,
                    Target::Stop { halt_id } => match &*msg {
                        Message::Halt { id } if *id == halt_id => {
                            *self.draining.lock() = None;
                            self.paused.store(true, Ordering::Release);
                            continue;
                        }
                        Message::Quit => return msg,
                        _ => continue,
                    },
                    Target::RemoveStream { stream_id } => match &*msg {
                        Message::DecodedStream(info) if info.stream_id != stream_id => {
                            *self.draining.lock() = None;
                            self.gate.request_ramp_up();
                            return msg;
                        }
                        Message::Quit => return msg,
                        _ => continue,
                    },
                }
            }

            return msg;
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
    fn stop_ramps_current_audio_down_to_silence() {
        let pool: Pool<Message> = Pool::new(32);
        let mut queue = VecDeque::new();
        queue.push_back(pcm(&pool, 100));
        queue.push_back(pool.alloc_shared(Message::Halt { id: 9 }));
        let upstream = ScriptedUpstream { queue: StdMutex::new(queue) };
        let stopper = Stopper::new(upstream, pool, 100);
        stopper.stop(9);

        let first = stopper.pull();
        assert!(matches!(&*first, Message::AudioPcm(p) if p.ramp.end() == crate::message::RAMP_MIN));
        assert!(!stopper.is_paused(), "pause only takes effect once the matching Halt is drained");
    }

    #[test]
    fn stop_blocks_the_caller_until_play_after_draining_the_halt() {
        let pool: Pool<Message> = Pool::new(32);
        let mut queue = VecDeque::new();
        queue.push_back(pool.alloc_shared(Message::Halt { id: 9 }));
        queue.push_back(pcm(&pool, 100));
        let upstream = ScriptedUpstream { queue: StdMutex::new(queue) };
        let stopper = std::sync::Arc::new(Stopper::new(upstream, pool, 100));
        stopper.stop(9);

        let worker = {
            let stopper = stopper.clone();
            std::thread::spawn(move || stopper.pull())
        };
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(stopper.is_paused());
        stopper.play();
        let resumed = worker.join().unwrap();
        assert!(matches!(&*resumed, Message::AudioPcm(p) if p.ramp.is_enabled()));
    }
}
