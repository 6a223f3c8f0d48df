//! The one codec the core ships built in: a raw-PCM passthrough. Used in
//! tests and by sources that already deliver linear PCM (`EncodedStream`
//! flagged `raw_pcm`) where no real decode step is needed — SPEC_FULL.md
//! §"raw-PCM test codec" documents the rationale.

use std::sync::Arc;

use crate::interfaces::{Codec, DecodedSink, EncodedSource, StreamHandler};
use crate::message::{AudioPcmInfo, DecodedStreamInfo, EncodedStreamInfo, Ramp};

const BLOCK_FRAMES: usize = 1024;

/// Format parameters a [`RawPcmCodec`] is configured with; since raw PCM
/// carries no self-describing header, these must come from the stream's
/// metadata (or a fixed default for test fixtures).
#[derive(Debug, Clone, Copy)]
pub struct RawPcmFormat {
    pub sample_rate: u32,
    pub num_channels: u16,
    pub bit_depth: u16,
}

impl Default for RawPcmFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            num_channels: 2,
            bit_depth: 16,
        }
    }
}

pub struct RawPcmCodec {
    format: RawPcmFormat,
    stream_id: u32,
    stream_handler: Option<Arc<dyn StreamHandler>>,
    seekable: bool,
    live: bool,
    position_jiffies: u64,
    format_emitted: bool,
}

impl RawPcmCodec {
    #[must_use]
    pub fn new(format: RawPcmFormat) -> Self {
        Self {
            format,
            stream_id: 0,
            stream_handler: None,
            seekable: false,
            live: false,
            position_jiffies: 0,
            format_emitted: false,
        }
    }

    fn frame_bytes(&self) -> usize {
        self.format.num_channels as usize * (self.format.bit_depth as usize / 8)
    }
}

impl Codec for RawPcmCodec {
    fn name(&self) -> &str {
        "raw-pcm"
    }

    fn recognise(&self, _probe: &[u8]) -> bool {
        // Only ever selected explicitly for streams flagged `raw_pcm`;
        // never wins generic recognition order.
        false
    }

    fn stream_initialise(&mut self, stream: &EncodedStreamInfo) {
        self.stream_id = stream.stream_id;
        self.stream_handler = Some(stream.stream_handler.clone());
        self.seekable = stream.flags.seekable;
        self.live = stream.flags.live;
        self.position_jiffies = 0;
        self.format_emitted = false;
    }

    fn process(
        &mut self,
        source: &mut dyn EncodedSource,
        sink: &mut dyn DecodedSink,
    ) -> std::io::Result<bool> {
        let frame_bytes = self.frame_bytes().max(1);
        let mut buf = vec![0u8; BLOCK_FRAMES * frame_bytes];
        let read = source.read(&mut buf)?;
        if read == 0 {
            return Ok(false);
        }
        let aligned = read - (read % frame_bytes);
        if aligned == 0 {
            return Ok(true);
        }
        buf.truncate(aligned);
        let samples = (aligned / frame_bytes) as u64;
        let duration = crate::message::samples_to_jiffies(samples, self.format.sample_rate);

        if !self.format_emitted {
            self.format_emitted = true;
            if let Some(stream_handler) = self.stream_handler.clone() {
                sink.output_decoded_stream(DecodedStreamInfo {
                    stream_id: self.stream_id,
                    bit_rate: self.format.sample_rate
                        * self.format.num_channels as u32
                        * self.format.bit_depth as u32,
                    bit_depth: self.format.bit_depth,
                    sample_rate: self.format.sample_rate,
                    num_channels: self.format.num_channels,
                    codec_name: self.name().into(),
                    track_length_jiffies: 0,
                    sample_start_jiffies: self.position_jiffies,
                    lossless: true,
                    seekable: self.seekable,
                    live: self.live,
                    stream_handler,
                });
            }
        }

        sink.output_audio_pcm(AudioPcmInfo {
            stream_id: self.stream_id,
            position_jiffies: self.position_jiffies,
            duration_jiffies: duration,
            sample_rate: self.format.sample_rate,
            num_channels: self.format.num_channels,
            bit_depth: self.format.bit_depth,
            data: buf.into(),
            ramp: Ramp::NONE,
        });
        self.position_jiffies += duration;
        Ok(true)
    }

    fn try_seek(&mut self, _stream_id: u32, sample_offset: u64) -> bool {
        self.position_jiffies = crate::message::samples_to_jiffies(sample_offset, self.format.sample_rate);
        true
    }

    fn stream_completed(&mut self) {
        self.position_jiffies = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{EncodedStreamFlags, StreamPlay};

    struct FakeStreamHandler;
    impl StreamHandler for FakeStreamHandler {
        fn ok_to_play(&self, _stream_id: u32) -> StreamPlay {
            StreamPlay::Yes
        }
        fn try_seek(&self, _stream_id: u32, _byte_offset: u64) -> u32 {
            0
        }
        fn try_stop(&self, _stream_id: u32) -> u32 {
            0
        }
        fn notify_starving(&self, _mode: &str, _stream_id: u32) {}
    }

    fn fixture_stream(stream_id: u32) -> EncodedStreamInfo {
        EncodedStreamInfo {
            uri: "file://fixture.pcm".into(),
            metatext: None,
            total_bytes: 0,
            stream_id,
            flags: EncodedStreamFlags {
                seekable: true,
                live: false,
                raw_pcm: true,
            },
            stream_handler: Arc::new(FakeStreamHandler),
        }
    }

    struct FakeSource {
        data: Vec<u8>,
        offset: usize,
    }

    impl EncodedSource for FakeSource {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let remaining = &self.data[self.offset..];
            let n = remaining.len().min(buf.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            self.offset += n;
            Ok(n)
        }
    }

    #[derive(Default)]
    struct FakeSink {
        formats: Vec<DecodedStreamInfo>,
        blocks: Vec<AudioPcmInfo>,
    }

    impl DecodedSink for FakeSink {
        fn output_decoded_stream(&mut self, info: DecodedStreamInfo) {
            self.formats.push(info);
        }
        fn output_audio_pcm(&mut self, pcm: AudioPcmInfo) {
            self.blocks.push(pcm);
        }
    }

    #[test]
    fn emits_decoded_stream_once_then_sample_aligned_blocks() {
        let format = RawPcmFormat {
            sample_rate: 44_100,
            num_channels: 2,
            bit_depth: 16,
        };
        let mut codec = RawPcmCodec::new(format);
        codec.stream_initialise(&fixture_stream(7));
        let frame_bytes = 4;
        let mut source = FakeSource {
            data: vec![0u8; frame_bytes * 2000 + 1],
            offset: 0,
        };
        let mut sink = FakeSink::default();
        assert!(codec.process(&mut source, &mut sink).unwrap());
        assert_eq!(sink.formats.len(), 1);
        assert_eq!(sink.formats[0].stream_id, 7);
        assert_eq!(sink.formats[0].sample_rate, 44_100);
        assert_eq!(sink.blocks.len(), 1);
        assert_eq!(sink.blocks[0].data.len() % frame_bytes, 0);

        // A second process() call on the same stream must not re-emit the format.
        let mut source2 = FakeSource { data: vec![0u8; frame_bytes * 10], offset: 0 };
        assert!(codec.process(&mut source2, &mut sink).unwrap());
        assert_eq!(sink.formats.len(), 1);
    }

    #[test]
    fn returns_false_once_source_exhausted() {
        let mut codec = RawPcmCodec::new(RawPcmFormat::default());
        codec.stream_initialise(&fixture_stream(1));
        let mut source = FakeSource { data: Vec::new(), offset: 0 };
        let mut sink = FakeSink::default();
        assert!(!codec.process(&mut source, &mut sink).unwrap());
    }
}
