//! Reporter (spec.md §4.11): a passive pass-through observer. Watches
//! `Track`/`MetaText`/`DecodedStream`/`AudioPcm` go by, maintains the
//! current (track id, position, duration, stream format), and fires
//! [`PipelineObserver`] callbacks — at most once per elapsed second for
//! `time`, as every other variant arrives for everything else.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::interfaces::{PipelineObserver, StreamFormat};
use crate::message::{Message, PooledMessage, JIFFIES_PER_SECOND};
use crate::pipeline::Pullable;

struct State {
    track_id: u32,
    uri: String,
    duration_jiffies: u64,
    position_jiffies: u64,
    sample_rate: u32,
    last_reported_second: Option<u32>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            track_id: 0,
            uri: String::new(),
            duration_jiffies: 0,
            position_jiffies: 0,
            sample_rate: 44_100,
            last_reported_second: None,
        }
    }
}

pub struct Reporter<U> {
    upstream: U,
    observer: Arc<dyn PipelineObserver>,
    state: Mutex<State>,
}

impl<U: Pullable> Reporter<U> {
    #[must_use]
    pub fn new(upstream: U, observer: Arc<dyn PipelineObserver>) -> Self {
        Self {
            upstream,
            observer,
            state: Mutex::new(State::default()),
        }
    }

    fn maybe_report_time(&self, state: &mut State) {
        let elapsed_seconds = (state.position_jiffies / JIFFIES_PER_SECOND) as u32;
        if state.last_reported_second != Some(elapsed_seconds) {
            state.last_reported_second = Some(elapsed_seconds);
            let duration_seconds = (state.duration_jiffies / JIFFIES_PER_SECOND) as u32;
            self.observer.time(elapsed_seconds, duration_seconds);
        }
    }
}

impl<U: Pullable> Pullable for Reporter<U> {
    fn pull(&self) -> PooledMessage {
        let msg = self.upstream.pull();
        match &*msg {
            Message::Track(track) => {
                let mut state = self.state.lock();
                state.track_id = track.track_id;
                state.uri = track.uri.clone();
                state.position_jiffies = 0;
                state.last_reported_second = None;
                self.observer.track(track.track_id, &track.uri);
            }
            Message::MetaText(text) => {
                self.observer.meta_text(text);
            }
            Message::DecodedStream(info) => {
                let mut state = self.state.lock();
                state.duration_jiffies = info.track_length_jiffies;
                state.position_jiffies = info.sample_start_jiffies;
                state.sample_rate = info.sample_rate;
                state.last_reported_second = None;
                self.observer.stream_info(StreamFormat {
                    bit_rate: info.bit_rate,
                    bit_depth: info.bit_depth,
                    sample_rate: info.sample_rate,
                    num_channels: info.num_channels,
                    lossless: info.lossless,
                });
                self.maybe_report_time(&mut state);
            }
            Message::AudioPcm(pcm) => {
                let mut state = self.state.lock();
                state.position_jiffies = pcm.position_jiffies + pcm.duration_jiffies;
                self.maybe_report_time(&mut state);
            }
            _ => {}
        }
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{samples_to_jiffies, AudioPcmInfo, DecodedStreamInfo, Pool, Ramp, TrackInfo};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;

    struct ScriptedUpstream {
        queue: StdMutex<VecDeque<PooledMessage>>,
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

    #[derive(Default)]
    struct CountingObserver {
        time_calls: AtomicU32,
        last_seconds: AtomicU32,
    }

    impl PipelineObserver for CountingObserver {
        fn state(&self, _state: &str) {}
        fn track(&self, _track_id: u32, _uri: &str) {}
        fn meta_text(&self, _text: &str) {}
        fn time(&self, seconds: u32, _duration_seconds: u32) {
            self.time_calls.fetch_add(1, Ordering::SeqCst);
            self.last_seconds.store(seconds, Ordering::SeqCst);
        }
        fn stream_info(&self, _format: StreamFormat) {}
    }

    #[test]
    fn time_notification_fires_at_most_once_per_elapsed_second() {
        let pool: Pool<Message> = Pool::new(32);
        let mut queue = VecDeque::new();
        queue.push_back(pool.alloc_shared(Message::Track(Arc::new(TrackInfo {
            track_id: 1,
            uri: "file://t.wav".into(),
            metadata: "".into(),
            start_of_stream: true,
        }))));
        queue.push_back(pool.alloc_shared(Message::DecodedStream(Arc::new(DecodedStreamInfo {
            stream_id: 1,
            bit_rate: 0,
            bit_depth: 16,
            sample_rate: 44_100,
            num_channels: 2,
            codec_name: "raw-pcm".into(),
            track_length_jiffies: samples_to_jiffies(44_100 * 60, 44_100),
            sample_start_jiffies: 0,
            lossless: true,
            seekable: false,
            live: false,
            stream_handler: Arc::new(NoopStreamHandler),
        }))));
        // Two half-second blocks: the second one crosses the 1s boundary.
        for _ in 0..2 {
            queue.push_back(pool.alloc_shared(Message::AudioPcm(AudioPcmInfo {
                stream_id: 1,
                position_jiffies: 0,
                duration_jiffies: samples_to_jiffies(22_050, 44_100),
                sample_rate: 44_100,
                num_channels: 2,
                bit_depth: 16,
                data: bytes::Bytes::new(),
                ramp: Ramp::NONE,
            })));
        }

        let upstream = ScriptedUpstream { queue: StdMutex::new(queue) };
        let observer = Arc::new(CountingObserver::default());
        let reporter = Reporter::new(upstream, observer.clone());

        reporter.pull(); // Track
        reporter.pull(); // DecodedStream: time(0, 60)
        assert_eq!(observer.time_calls.load(Ordering::SeqCst), 1);
        reporter.pull(); // 0.5s in: still second 0
        assert_eq!(observer.time_calls.load(Ordering::SeqCst), 1);
        reporter.pull(); // 1.0s in: crosses into second 1
        assert_eq!(observer.time_calls.load(Ordering::SeqCst), 2);
        assert_eq!(observer.last_seconds.load(Ordering::SeqCst), 1);
    }
}
