//! Waiter (spec.md §4.5): `Wait(flushId)` ramps down, discards messages up
//! to and including the identified Flush, notifies that the wait is over,
//! then resumes with a ramp up.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex as StdMutex;

use crate::message::{Message, Pool, PooledMessage, FLUSH_ID_INVALID};
use crate::pipeline::ramp_gate::RampGate;
use crate::pipeline::Pullable;

pub struct Waiter<U> {
    upstream: U,
    pool: Pool<Message>,
    gate: RampGate,
    pending_flush_id: AtomicU32,
    draining: std::sync::atomic::AtomicBool,
    on_resume: StdMutex<Option<Box<dyn FnMut() + Send>>>,
}

impl<U: Pullable> Waiter<U> {
    #[must_use]
    pub fn new(upstream: U, pool: Pool<Message>, ramp_duration_jiffies: u64) -> Self {
        Self {
            upstream,
            pool,
            gate: RampGate::new(ramp_duration_jiffies),
            pending_flush_id: AtomicU32::new(FLUSH_ID_INVALID),
            draining: std::sync::atomic::AtomicBool::new(false),
            on_resume: StdMutex::new(None),
        }
    }

    /// Registers the callback fired once the wait for `flush_id` is over.
    pub fn set_on_resume(&self, callback: Box<dyn FnMut() + Send>) {
        *self.on_resume.lock().unwrap() = Some(callback);
    }

    /// Requests a wait for `flush_id`. Safe to call from any thread.
    pub fn wait(&self, flush_id: u32) {
        self.pending_flush_id.store(flush_id, Ordering::Release);
        self.gate.request_ramp_down();
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

impl<U: Pullable> Pullable for Waiter<U> {
    fn pull(&self) -> PooledMessage {
        loop {
            let msg = self.upstream.pull();

            if self.draining.load(Ordering::Acquire) {
                let target = self.pending_flush_id.load(Ordering::Acquire);
                if let Message::Flush { id } = &*msg {
                    if *id == target {
                        self.draining.store(false, Ordering::Release);
                        self.pending_flush_id.store(FLUSH_ID_INVALID, Ordering::Release);
                        if let Some(cb) = self.on_resume.lock().unwrap().as_mut() {
                            cb();
                        }
                        self.gate.request_ramp_up();
                    }
                }
                if matches!(&*msg, Message::Quit) {
                    return msg;
                }
                continue;
            }

            let duration = match &*msg {
                Message::AudioPcm(p) => p.duration_jiffies,
                Message::Silence(s) => s.duration_jiffies,
                _ => return msg,
            };

            match self.gate.apply(duration) {
                Some(ramp) => {
                    let out = self.rebuild_with_ramp(&msg, ramp);
                    if self.gate.is_suspended() {
                        // The ramp-down completed within this very span; engage
                        // draining now rather than waiting for a later `None`,
                        // which may never come if the next message isn't audio.
                        self.draining.store(true, Ordering::Release);
                    }
                    return out;
                }
                None => {
                    self.draining.store(true, Ordering::Release);
                    continue;
                }
            }
        }
    }
}
