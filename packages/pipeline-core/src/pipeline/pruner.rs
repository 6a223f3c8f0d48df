//! Pruner (spec.md §2 row 15): sits on the Splitter's secondary branch and
//! drops whatever that branch has no use for — encoded-stream plumbing,
//! metatext, delay/wait control chatter — while holding `Mode`/`Track`
//! until real audio actually follows, so a track change with no audio
//! behind it (the last entry in a playlist) never reaches the secondary
//! sink's buffering stage at all. Grounded in `Pruner.cpp`'s
//! `iWaitingForAudio`/`iPendingMode` discipline.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::message::{Message, PooledMessage};
use crate::pipeline::Pullable;

struct State {
    queue: VecDeque<PooledMessage>,
    pending_mode: Option<PooledMessage>,
    waiting_for_audio: bool,
}

pub struct Pruner<U> {
    upstream: U,
    state: Mutex<State>,
}

impl<U: Pullable> Pruner<U> {
    #[must_use]
    pub fn new(upstream: U) -> Self {
        Self {
            upstream,
            state: Mutex::new(State {
                queue: VecDeque::new(),
                pending_mode: None,
                waiting_for_audio: false,
            }),
        }
    }

    fn try_queue(state: &mut State, msg: PooledMessage) -> Option<PooledMessage> {
        if state.waiting_for_audio {
            state.queue.push_back(msg);
            None
        } else {
            Some(msg)
        }
    }

    fn try_queue_cancel_waiting(state: &mut State, msg: PooledMessage) -> Option<PooledMessage> {
        let out = Self::try_queue(state, msg.clone());
        let out = out.or_else(|| if state.waiting_for_audio { None } else { Some(msg) });
        state.waiting_for_audio = false;
        out
    }

    /// Folds one freshly-pulled upstream message into the queueing state,
    /// returning it immediately if it should be forwarded now, or `None`
    /// if it was dropped or queued for later.
    fn process(&self, msg: PooledMessage) -> Option<PooledMessage> {
        let mut state = self.state.lock();
        match &*msg {
            Message::Mode(_) => {
                if state.waiting_for_audio {
                    state.queue.clear();
                }
                state.waiting_for_audio = true;
                state.pending_mode = Some(msg);
                None
            }
            Message::Track(_) => {
                if state.waiting_for_audio {
                    state.queue.clear();
                }
                state.waiting_for_audio = true;
                Self::try_queue(&mut state, msg)
            }
            Message::Delay { .. }
            | Message::EncodedStream(_)
            | Message::MetaText(_)
            | Message::Wait
            | Message::Flush { .. } => None,
            Message::Halt { .. }
            | Message::DecodedStream(_)
            | Message::BitRate(_)
            | Message::Drain(_)
            | Message::StreamInterrupted => Self::try_queue(&mut state, msg),
            Message::AudioPcm(_) | Message::Silence(_) | Message::Playable(_) | Message::Quit => {
                Self::try_queue_cancel_waiting(&mut state, msg)
            }
        }
    }
}

impl<U: Pullable> Pullable for Pruner<U> {
    fn pull(&self) -> PooledMessage {
        loop {
            let (waiting, queue_empty) = {
                let state = self.state.lock();
                (state.waiting_for_audio, state.queue.is_empty())
            };

            if waiting || queue_empty {
                let msg = self.upstream.pull();
                if let Some(out) = self.process(msg) {
                    return out;
                }
                continue;
            }

            let mut state = self.state.lock();
            if let Some(pending) = state.pending_mode.take() {
                return pending;
            }
            if let Some(msg) = state.queue.pop_front() {
                return msg;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{AudioPcmInfo, Metadata, Pool, Ramp, TrackInfo};
    use std::collections::VecDeque as StdDeque;
    use std::sync::{Arc, Mutex as StdMutex};

    struct ScriptedUpstream {
        queue: StdMutex<StdDeque<PooledMessage>>,
    }

    impl Pullable for ScriptedUpstream {
        fn pull(&self) -> PooledMessage {
            self.queue.lock().unwrap().pop_front().expect("script exhausted")
        }
    }

    fn track(pool: &Pool<Message>, id: u32) -> PooledMessage {
        pool.alloc_shared(Message::Track(Arc::new(TrackInfo {
            track_id: id,
            uri: format!("file://t{id}.wav"),
            metadata: Metadata::from(""),
            start_of_stream: true,
        })))
    }

    fn pcm(pool: &Pool<Message>) -> PooledMessage {
        pool.alloc_shared(Message::AudioPcm(AudioPcmInfo {
            stream_id: 1,
            position_jiffies: 0,
            duration_jiffies: 100,
            sample_rate: 44_100,
            num_channels: 2,
            bit_depth: 16,
            data: bytes::Bytes::new(),
            ramp: Ramp::NONE,
        }))
    }

    #[test]
    fn metatext_and_encoded_stream_chatter_is_dropped() {
        let pool: Pool<Message> = Pool::new(16);
        let mut queue = StdDeque::new();
        queue.push_back(pool.alloc_shared(Message::MetaText("now playing".into())));
        queue.push_back(track(&pool, 1));
        queue.push_back(pcm(&pool));

        let upstream = ScriptedUpstream { queue: StdMutex::new(queue) };
        let pruner = Pruner::new(upstream);

        let first = pruner.pull();
        assert!(matches!(&*first, Message::Track(t) if t.track_id == 1));
        let second = pruner.pull();
        assert!(matches!(&*second, Message::AudioPcm(_)));
    }

    #[test]
    fn track_with_no_following_audio_is_dropped_when_superseded() {
        let pool: Pool<Message> = Pool::new(16);
        let mut queue = StdDeque::new();
        queue.push_back(track(&pool, 1));
        queue.push_back(track(&pool, 2));
        queue.push_back(pcm(&pool));

        let upstream = ScriptedUpstream { queue: StdMutex::new(queue) };
        let pruner = Pruner::new(upstream);

        // track(1) never reaches a consumer: it's queued waiting for audio,
        // then dropped once track(2) supersedes it before any audio arrived.
        let first = pruner.pull();
        assert!(matches!(&*first, Message::Track(t) if t.track_id == 2));
        let second = pruner.pull();
        assert!(matches!(&*second, Message::AudioPcm(_)));
    }
}
