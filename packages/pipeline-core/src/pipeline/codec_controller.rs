//! Codec controller (spec.md §4.3): the pipeline's second active worker.
//! Recognises a codec for each new `EncodedStream` in registration order,
//! then drives `Codec::process` in a loop, feeding it encoded bytes
//! pulled from upstream and forwarding whatever `DecodedStream`/`AudioPcm`
//! it produces to the decoded reservoir.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::interfaces::{Codec, DecodedSink, EncodedSource};
use crate::message::{AudioPcmInfo, DecodedStreamInfo, IdManager, Message, Pool, PooledMessage};
use crate::pipeline::aggregator::Aggregator;
use crate::pipeline::Pullable;

const PROBE_LEN: usize = 6 * 1024;

/// Adapts the upstream `Pullable` chain into the byte-oriented
/// [`EncodedSource`] a [`Codec`] reads from, buffering any leftover bytes
/// between `read` calls and surfacing the control message (if any) that
/// ended the stream so the controller loop can act on it afterward.
struct PullSource<'a> {
    upstream: &'a dyn Pullable,
    leftover: Vec<u8>,
    ended_by: Option<PooledMessage>,
}

impl<'a> PullSource<'a> {
    fn new(upstream: &'a dyn Pullable) -> Self {
        Self {
            upstream,
            leftover: Vec::new(),
            ended_by: None,
        }
    }
}

impl EncodedSource for PullSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.ended_by.is_some() {
            return Ok(0);
        }
        while self.leftover.is_empty() {
            let msg = self.upstream.pull();
            match &*msg {
                Message::EncodedAudio(bytes) => {
                    self.leftover.extend_from_slice(bytes);
                }
                _ => {
                    self.ended_by = Some(msg);
                    return Ok(0);
                }
            }
        }
        let n = buf.len().min(self.leftover.len());
        buf[..n].copy_from_slice(&self.leftover[..n]);
        self.leftover.drain(..n);
        Ok(n)
    }
}

struct PushSink<'a> {
    pool: &'a Pool<Message>,
    downstream: &'a Aggregator,
}

impl DecodedSink for PushSink<'_> {
    fn output_decoded_stream(&mut self, info: DecodedStreamInfo) {
        self.downstream.push(self.pool.alloc_shared(Message::DecodedStream(Arc::new(info))));
    }

    fn output_audio_pcm(&mut self, pcm: AudioPcmInfo) {
        self.downstream.push(self.pool.alloc_shared(Message::AudioPcm(pcm)));
    }
}

/// Drives codec recognition and decoding for the stream of
/// `EncodedStream`/`EncodedAudio` arriving from upstream.
pub struct CodecController<U> {
    upstream: U,
    downstream: Arc<Aggregator>,
    codecs: Vec<Box<dyn Codec>>,
    pool: Pool<Message>,
    ids: Arc<IdManager>,
}

impl<U: Pullable> CodecController<U> {
    #[must_use]
    pub fn new(
        upstream: U,
        downstream: Arc<Aggregator>,
        pool: Pool<Message>,
        ids: Arc<IdManager>,
    ) -> Self {
        Self {
            upstream,
            downstream,
            codecs: Vec::new(),
            pool,
            ids,
        }
    }

    /// Registers a codec. Codecs are consulted in registration order when
    /// recognising a new stream (spec.md §4.3).
    pub fn register_codec(&mut self, codec: Box<dyn Codec>) {
        self.codecs.push(codec);
    }

    fn recognise(&self, probe: &[u8]) -> Option<usize> {
        self.codecs.iter().position(|c| c.recognise(probe))
    }

    /// Runs the controller loop until `Quit` is forwarded downstream.
    pub fn run(&mut self) {
        loop {
            let msg = self.upstream.pull();
            match &*msg {
                Message::EncodedStream(info) => {
                    let info = info.clone();
                    self.downstream.push(msg.clone());
                    self.handle_stream(&info);
                }
                Message::Quit => {
                    self.downstream.push(msg);
                    break;
                }
                _ => self.downstream.push(msg),
            }
        }
    }

    fn handle_stream(&mut self, info: &crate::message::EncodedStreamInfo) {
        let stream_id = info.stream_id;
        let mut source = PullSource::new(&self.upstream);
        let mut probe = vec![0u8; PROBE_LEN];
        let n = match source.read(&mut probe) {
            Ok(n) => n,
            Err(e) => {
                warn!(stream_id, %e, "i/o error probing stream");
                return;
            }
        };
        probe.truncate(n);

        let Some(idx) = self.recognise(&probe) else {
            let flush_id = self.ids.next_flush_id();
            warn!(stream_id, uri = %info.uri, "no codec recognised stream");
            self.downstream.push(self.pool.alloc_shared(Message::Flush { id: flush_id }));
            return;
        };

        // Re-feed the probe bytes ahead of the rest of the stream.
        source.leftover.splice(0..0, probe.iter().copied());
        self.codecs[idx].stream_initialise(info);
        debug!(stream_id, codec = self.codecs[idx].name(), "codec recognised stream");

        loop {
            let mut sink = PushSink {
                pool: &self.pool,
                downstream: &self.downstream,
            };
            match self.codecs[idx].process(&mut source, &mut sink) {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) => {
                    warn!(stream_id, %e, "codec reported a corrupt stream");
                    break;
                }
            }
        }
        self.codecs[idx].stream_completed();

        let halt_id = self.ids.next_flush_id();
        self.downstream.push(self.pool.alloc_shared(Message::Halt { id: halt_id }));

        if let Some(end_msg) = source.ended_by.take() {
            if !matches!(&*end_msg, Message::EncodedAudio(_)) {
                self.downstream.push(end_msg);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{RawPcmCodec, RawPcmFormat};
    use crate::message::{EncodedStreamFlags, EncodedStreamInfo};
    use crate::pipeline::reservoir::{DecodedJiffies, Reservoir};
    use std::sync::Mutex as StdMutex;

    struct FakeStreamHandler;
    impl crate::interfaces::StreamHandler for FakeStreamHandler {
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
        queue: StdMutex<std::collections::VecDeque<PooledMessage>>,
        pool: Pool<Message>,
    }

    impl Pullable for ScriptedUpstream {
        fn pull(&self) -> PooledMessage {
            self.queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.pool.alloc_shared(Message::Quit))
        }
    }

    #[test]
    fn unrecognised_stream_emits_flush() {
        let pool = Pool::new(16);
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(pool.alloc_shared(Message::EncodedStream(Arc::new(EncodedStreamInfo {
            uri: "x://y".into(),
            metatext: None,
            total_bytes: 0,
            stream_id: 1,
            flags: EncodedStreamFlags::default(),
            stream_handler: Arc::new(FakeStreamHandler),
        }))));
        queue.push_back(pool.alloc_shared(Message::EncodedAudio(bytes::Bytes::from_static(b"nonsense"))));
        queue.push_back(pool.alloc_shared(Message::Quit));
        let upstream = Arc::new(ScriptedUpstream {
            queue: StdMutex::new(queue),
            pool: pool.clone(),
        });
        let reservoir = Arc::new(Reservoir::new(u64::MAX, DecodedJiffies));
        let downstream = Arc::new(Aggregator::new(reservoir, pool.clone(), 0));
        let ids = Arc::new(IdManager::new());
        let mut controller = CodecController::new(upstream, downstream.clone(), pool, ids);
        controller.register_codec(Box::new(RawPcmCodec::new(RawPcmFormat::default())));
        controller.run();

        let first = downstream.pull();
        assert!(matches!(&*first, Message::EncodedStream(_)));
        let second = downstream.pull();
        assert!(matches!(&*second, Message::Flush { .. }));
    }
}
