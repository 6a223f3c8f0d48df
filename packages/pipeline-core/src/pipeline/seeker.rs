//! Seeker (spec.md §4.4): `Seek(streamId, seconds)` ramps the current audio
//! down, calls the stream handler's `TrySeek`, discards until the returned
//! Flush passes, and lets the first audio of the post-seek `DecodedStream`
//! ramp back up. A `TrySeek` that returns the invalid sentinel triggers one
//! restream attempt via a caller-supplied callback before giving up and
//! ramping back in place.
//!
//! A concurrent `seek()` call replaces whatever seek is still pending —
//! "the second wins" (spec.md §4.4) — by simply overwriting the single
//! `requested` slot; a seek already past the ramp-down stage runs to
//! completion rather than being torn down mid-flight.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use parking_lot::Mutex;

use crate::interfaces::StreamHandler;
use crate::message::{Message, Pool, PooledMessage, FLUSH_ID_INVALID};
use crate::pipeline::ramp_gate::{GatePhase, RampGate};
use crate::pipeline::Pullable;

#[derive(Clone)]
struct CurrentStream {
    stream_id: u32,
    seekable: bool,
    bit_rate: u32,
    stream_handler: Arc<dyn StreamHandler>,
}

#[derive(Clone, Copy)]
enum Draining {
    RampingDown { seconds: u64 },
    AwaitingFlush { flush_id: u32 },
    GivingUp,
}

pub struct Seeker<U> {
    upstream: U,
    pool: Pool<Message>,
    gate: RampGate,
    requested: AtomicU32,
    requested_seconds: Mutex<u64>,
    current: Mutex<Option<CurrentStream>>,
    draining: Mutex<Option<Draining>>,
    on_restream: StdMutex<Option<Box<dyn FnMut(u32) + Send>>>,
}

/// Sentinel meaning "no seek requested" for the `requested` flag (seconds
/// are stored separately since an `AtomicU32` can't carry both a flag and a
/// payload atomically).
const NO_SEEK_REQUESTED: u32 = 0;
const SEEK_REQUESTED: u32 = 1;

impl<U: Pullable> Seeker<U> {
    #[must_use]
    pub fn new(upstream: U, pool: Pool<Message>, ramp_duration_jiffies: u64) -> Self {
        Self {
            upstream,
            pool,
            gate: RampGate::new(ramp_duration_jiffies),
            requested: AtomicU32::new(NO_SEEK_REQUESTED),
            requested_seconds: Mutex::new(0),
            current: Mutex::new(None),
            draining: Mutex::new(None),
            on_restream: StdMutex::new(None),
        }
    }

    /// Registers the callback invoked with a track id when a `TrySeek`
    /// fails and this element wants the same track re-fetched from the
    /// start. There's no dedicated restream interface named in spec.md §6,
    /// so (as with [`Waiter::set_on_resume`](crate::pipeline::waiter::Waiter::set_on_resume))
    /// a plain callback stands in for it.
    pub fn set_on_restream(&self, callback: Box<dyn FnMut(u32) + Send>) {
        *self.on_restream.lock().unwrap() = Some(callback);
    }

    /// Requests a seek to `seconds` into the stream identified by
    /// `stream_id`. Replaces any seek still pending. Safe to call from any
    /// thread.
    pub fn seek(&self, stream_id: u32, seconds: u64) {
        let is_current = self
            .current
            .lock()
            .as_ref()
            .is_some_and(|c| c.stream_id == stream_id);
        if !is_current {
            return;
        }
        *self.requested_seconds.lock() = seconds;
        self.requested.store(SEEK_REQUESTED, Ordering::Release);
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

    /// Called once the ramp-down for a pending seek has fully completed.
    /// Drives `TrySeek`, falling back to one restream attempt on failure.
    fn attempt_seek(&self, seconds: u64) {
        let current = self.current.lock().clone();
        let Some(current) = current else {
            self.gate.request_ramp_up();
            return;
        };
        if !current.seekable {
            self.gate.request_ramp_up();
            return;
        }

        // Bit rate gives bytes/second; exact enough for a seek target,
        // the codec corrects to the nearest frame boundary on its side.
        let byte_offset = (current.bit_rate as u64 / 8) * seconds;
        let flush_id = current.stream_handler.try_seek(current.stream_id, byte_offset);

        if flush_id != FLUSH_ID_INVALID {
            *self.draining.lock() = Some(Draining::AwaitingFlush { flush_id });
            return;
        }

        if let Some(cb) = self.on_restream.lock().unwrap().as_mut() {
            cb(current.stream_id);
        }
        *self.draining.lock() = Some(Draining::GivingUp);
        self.gate.request_ramp_up();
    }
}

impl<U: Pullable> Pullable for Seeker<U> {
    fn pull(&self) -> PooledMessage {
        loop {
            if self.requested.swap(NO_SEEK_REQUESTED, Ordering::AcqRel) == SEEK_REQUESTED
                && self.draining.lock().is_none()
            {
                let seconds = *self.requested_seconds.lock();
                self.gate.request_ramp_down();
                *self.draining.lock() = Some(Draining::RampingDown { seconds });
            }

            let msg = self.upstream.pull();

            if let Message::DecodedStream(info) = &*msg {
                *self.current.lock() = Some(CurrentStream {
                    stream_id: info.stream_id,
                    seekable: info.seekable,
                    bit_rate: info.bit_rate,
                    stream_handler: info.stream_handler.clone(),
                });
            }

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
                                // The ramp-down completed within this very
                                // span; drive the seek now rather than
                                // waiting for a later `None`, which never
                                // comes if the next message isn't audio
                                // (it's the Flush we're about to wait on).
                                let pending = self.draining.lock().take();
                                if let Some(Draining::RampingDown { seconds }) = pending {
                                    self.attempt_seek(seconds);
                                } else if let Some(other) = pending {
                                    *self.draining.lock() = Some(other);
                                }
                                if matches!(*self.draining.lock(), Some(Draining::AwaitingFlush { .. })) {
                                    // TrySeek accepted; swallow this completing
                                    // segment and wait for its Flush to arrive.
                                    continue;
                                }
                                // Not seekable, no current stream, or TrySeek
                                // failed: ramp back up starting from this very
                                // block instead of discarding it.
                                let ramp = self.gate.apply(d).unwrap_or(ramp);
                                return self.rebuild_with_ramp(&msg, ramp);
                            }
                            return self.rebuild_with_ramp(&msg, ramp);
                        }
                        None => {
                            if let Some(Draining::RampingDown { seconds }) = self.draining.lock().take() {
                                self.attempt_seek(seconds);
                            }
                            continue;
                        }
                    }
                }
            }

            let draining = *self.draining.lock();
            if let Some(target) = draining {
                match target {
                    Draining::AwaitingFlush { flush_id } => match &*msg {
                        Message::Flush { id } if *id == flush_id => {
                            *self.draining.lock() = None;
                            self.gate.request_ramp_up();
                            return msg;
                        }
                        Message::Quit => return msg,
                        _ => continue,
                    },
                    Draining::RampingDown { .. } | Draining::GivingUp => continue,
                }
            }

            return msg;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{AudioPcmInfo, DecodedStreamInfo, Ramp};
    use std::collections::VecDeque;
    use std::sync::Mutex as StdSyncMutex;

    struct ScriptedUpstream {
        queue: StdSyncMutex<VecDeque<PooledMessage>>,
    }

    impl Pullable for ScriptedUpstream {
        fn pull(&self) -> PooledMessage {
            self.queue.lock().unwrap().pop_front().expect("script exhausted")
        }
    }

    struct ScriptedStreamHandler {
        flush_id: u32,
    }
    impl StreamHandler for ScriptedStreamHandler {
        fn ok_to_play(&self, _stream_id: u32) -> crate::message::StreamPlay {
            crate::message::StreamPlay::Yes
        }
        fn try_seek(&self, _stream_id: u32, _byte_offset: u64) -> u32 {
            self.flush_id
        }
        fn try_stop(&self, _stream_id: u32) -> u32 {
            0
        }
        fn notify_starving(&self, _mode: &str, _stream_id: u32) {}
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

    fn decoded_stream(pool: &Pool<Message>, stream_id: u32, seekable: bool, flush_id: u32) -> PooledMessage {
        pool.alloc_shared(Message::DecodedStream(Arc::new(DecodedStreamInfo {
            stream_id,
            bit_rate: 320_000,
            bit_depth: 16,
            sample_rate: 44_100,
            num_channels: 2,
            codec_name: "raw-pcm".into(),
            track_length_jiffies: 0,
            sample_start_jiffies: 0,
            lossless: true,
            seekable,
            live: false,
            stream_handler: Arc::new(ScriptedStreamHandler { flush_id }),
        })))
    }

    #[test]
    fn successful_seek_ramps_down_flushes_then_ramps_up() {
        let pool: Pool<Message> = Pool::new(32);
        let mut queue = VecDeque::new();
        queue.push_back(decoded_stream(&pool, 1, true, 7));
        queue.push_back(pcm(&pool, 60));
        queue.push_back(pcm(&pool, 60));
        queue.push_back(pool.alloc_shared(Message::Flush { id: 7 }));
        queue.push_back(pcm(&pool, 60));

        let upstream = ScriptedUpstream { queue: StdSyncMutex::new(queue) };
        let seeker = Seeker::new(upstream, pool, 100);

        let first = seeker.pull();
        assert!(matches!(&*first, Message::DecodedStream(_)));
        seeker.seek(1, 10);

        let second = seeker.pull();
        assert!(matches!(&*second, Message::AudioPcm(p) if p.ramp.start() > p.ramp.end()));
        let third = seeker.pull();
        assert!(matches!(&*third, Message::Flush { id } if *id == 7));
        let fourth = seeker.pull();
        assert!(matches!(&*fourth, Message::AudioPcm(p) if p.ramp.is_enabled()));
    }

    #[test]
    fn unseekable_stream_ignores_seek_request() {
        let pool: Pool<Message> = Pool::new(32);
        let mut queue = VecDeque::new();
        queue.push_back(decoded_stream(&pool, 1, false, 7));
        queue.push_back(pcm(&pool, 60));

        let upstream = ScriptedUpstream { queue: StdSyncMutex::new(queue) };
        let seeker = Seeker::new(upstream, pool, 100);

        assert!(matches!(&*seeker.pull(), Message::DecodedStream(_)));
        seeker.seek(1, 10);

        let second = seeker.pull();
        assert!(matches!(&*second, Message::AudioPcm(p) if p.ramp == Ramp::NONE));
    }

    #[test]
    fn failed_seek_fires_restream_then_gives_up_in_place() {
        let pool: Pool<Message> = Pool::new(32);
        let mut queue = VecDeque::new();
        queue.push_back(decoded_stream(&pool, 1, true, FLUSH_ID_INVALID));
        queue.push_back(pcm(&pool, 60));
        queue.push_back(pcm(&pool, 60));

        let upstream = ScriptedUpstream { queue: StdSyncMutex::new(queue) };
        let seeker = Seeker::new(upstream, pool, 100);
        let restreamed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let r2 = restreamed.clone();
        seeker.set_on_restream(Box::new(move |_track| r2.store(true, Ordering::SeqCst)));

        assert!(matches!(&*seeker.pull(), Message::DecodedStream(_)));
        seeker.seek(1, 10);

        let second = seeker.pull();
        assert!(matches!(&*second, Message::AudioPcm(p) if p.ramp.start() > p.ramp.end()));
        let third = seeker.pull();
        assert!(matches!(&*third, Message::AudioPcm(p) if p.ramp.is_enabled()));
        assert!(restreamed.load(Ordering::SeqCst));
    }
}
