//! Headless harness that wires the full pipeline together over a local
//! raw-PCM file: filler → container → codec controller → aggregator →
//! gorger → ramper → variable delay → muter → reporter → starvation
//! monitor → pre-driver, then writes the resulting `Playable` bytes to an
//! output file (or discards them with `--output /dev/null`).

use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex as PlMutex;

use pipeline_core::config::PipelineConfig;
use pipeline_core::interfaces::{PipelineObserver, StreamFormat, Supply};
use pipeline_core::message::{EncodedStreamFlags, EncodedStreamInfo, IdManager, Message, ModeInfo, Pool, StreamPlay};
use pipeline_core::pipeline::aggregator::Aggregator;
use pipeline_core::pipeline::codec_controller::CodecController;
use pipeline_core::pipeline::container::Container;
use pipeline_core::pipeline::filler::{Filler, ProtocolManager};
use pipeline_core::pipeline::gorger::Gorger;
use pipeline_core::pipeline::muter::Muter;
use pipeline_core::pipeline::pre_driver::PreDriver;
use pipeline_core::pipeline::ramper::Ramper;
use pipeline_core::pipeline::reporter::Reporter;
use pipeline_core::pipeline::reservoir::{DecodedJiffies, EncodedBytes, Reservoir};
use pipeline_core::pipeline::starvation_monitor::StarvationMonitor;
use pipeline_core::pipeline::variable_delay::VariableDelay;
use pipeline_core::pipeline::Pullable;
use pipeline_core::runtime::{ThreadSpawner, WorkerSpawner};
use pipeline_core::track::{TrackDatabase, UriProviderImpl};

/// Drives the streaming audio pipeline over a single local raw-PCM file.
#[derive(Parser, Debug)]
#[command(name = "pipeline-cli")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Raw 16-bit stereo PCM input file.
    input: PathBuf,

    /// Where to write the decoded, ramp-baked PCM bytes (use /dev/null
    /// to exercise the pipeline without keeping the output).
    #[arg(short, long, default_value = "out.pcm")]
    output: PathBuf,

    /// Path to a YAML config file (see `pipeline_core::config`).
    #[arg(short, long, env = "PIPELINE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "PIPELINE_LOG_LEVEL")]
    log_level: tracing::Level,
}

struct NoopStreamHandler;
impl pipeline_core::interfaces::StreamHandler for NoopStreamHandler {
    fn ok_to_play(&self, _stream_id: u32) -> StreamPlay {
        StreamPlay::Yes
    }
    fn try_seek(&self, _stream_id: u32, _byte_offset: u64) -> u32 {
        0
    }
    fn try_stop(&self, _stream_id: u32) -> u32 {
        0
    }
    fn notify_starving(&self, mode: &str, stream_id: u32) {
        tracing::warn!(mode, stream_id, "downstream buffer starving");
    }
}

/// Streams one raw-PCM file's bytes through `Supply` in fixed chunks.
struct FileProtocol {
    ids: Arc<IdManager>,
}

impl ProtocolManager for FileProtocol {
    fn stream(
        &self,
        track: &pipeline_core::message::TrackInfo,
        supply: &mut dyn Supply,
        interrupt: &AtomicBool,
    ) {
        let mut file = match File::open(&track.uri) {
            Ok(f) => f,
            Err(e) => {
                tracing::error!(uri = %track.uri, %e, "failed to open input file");
                return;
            }
        };

        let stream_id = self.ids.next_stream_id();
        supply.output_encoded_stream(EncodedStreamInfo {
            uri: track.uri.clone(),
            metatext: None,
            total_bytes: file.metadata().map(|m| m.len()).unwrap_or(0),
            stream_id,
            flags: EncodedStreamFlags {
                seekable: true,
                live: false,
                raw_pcm: true,
            },
            stream_handler: Arc::new(NoopStreamHandler),
        });

        let mut buf = vec![0u8; 64 * 1024];
        loop {
            if interrupt.load(std::sync::atomic::Ordering::Acquire) {
                break;
            }
            match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => supply.output_data(bytes::Bytes::copy_from_slice(&buf[..n])),
                Err(e) => {
                    tracing::error!(%e, "i/o error reading input file");
                    break;
                }
            }
        }
    }
}

/// Logs pipeline state/track/time notifications to `tracing` and keeps
/// the last-known stream format around for a final summary.
struct LoggingObserver {
    last_format: PlMutex<Option<StreamFormat>>,
}

impl PipelineObserver for LoggingObserver {
    fn state(&self, state: &str) {
        tracing::info!(state, "pipeline state changed");
    }
    fn track(&self, track_id: u32, uri: &str) {
        tracing::info!(track_id, uri, "now playing");
    }
    fn meta_text(&self, text: &str) {
        tracing::debug!(text, "metatext");
    }
    fn time(&self, seconds: u32, duration_seconds: u32) {
        tracing::info!(seconds, duration_seconds, "playback position");
    }
    fn stream_info(&self, format: StreamFormat) {
        tracing::info!(?format, "stream format");
        *self.last_format.lock() = Some(format);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    let config = PipelineConfig::load(args.config.as_deref()).context("failed to load pipeline config")?;

    let pool: Pool<Message> = Pool::new(config.pool_capacity);
    let ids = Arc::new(IdManager::new());

    let encoded = Arc::new(Reservoir::new(config.encoded_reservoir_max_bytes, EncodedBytes));
    let container = Container::new(encoded.clone(), pool.clone());

    let decoded = Arc::new(Reservoir::new(config.decoded_reservoir_max_jiffies, DecodedJiffies));
    let aggregator = Arc::new(Aggregator::new(decoded.clone(), pool.clone(), config.default_sample_rate as u64 / 50));

    let mut controller = CodecController::new(container, aggregator, pool.clone(), ids.clone());
    controller.register_codec(Box::new(pipeline_core::codec::RawPcmCodec::new(
        pipeline_core::codec::RawPcmFormat {
            sample_rate: config.default_sample_rate,
            num_channels: config.default_num_channels,
            bit_depth: config.default_bit_depth,
        },
    )));
    std::thread::Builder::new()
        .name("codec-controller".into())
        .spawn(move || controller.run())
        .context("failed to spawn codec controller worker")?;

    let gorger = Gorger::new(decoded.clone(), config.gorge_size_jiffies);
    let ramper = Ramper::new(gorger, pool.clone(), config.ramp_duration_jiffies);
    let delay = VariableDelay::new(ramper, pool.clone(), config.ramp_duration_jiffies);
    let muter = Arc::new(Muter::new(delay, pool.clone(), config.ramp_duration_jiffies));

    let observer: Arc<dyn PipelineObserver> = Arc::new(LoggingObserver {
        last_format: PlMutex::new(None),
    });
    let reporter = Reporter::new(muter, observer.clone());

    let monitor = StarvationMonitor::spawn(
        reporter,
        pool.clone(),
        config.starvation_buffer_max_jiffies,
        config.starvation_threshold_jiffies,
        config.normal_max_jiffies,
        config.ramp_duration_jiffies,
        observer,
        &ThreadSpawner,
    );
    let pre_driver = PreDriver::new(monitor, pool.clone(), 200);

    let db = Arc::new(TrackDatabase::new());
    let track_id = db
        .insert(0, args.input.display().to_string(), "".into())
        .context("failed to register input track")?;
    let provider = Box::new(UriProviderImpl::new(db));

    let filler = Filler::new(encoded, pool, ids.clone(), Arc::new(FileProtocol { ids }));
    filler.play(
        ModeInfo {
            name: "file".into(),
            flags: Default::default(),
            clock_puller: None,
        },
        provider,
        track_id,
    );
    Filler::spawn(&filler, &ThreadSpawner);

    let mut output = File::create(&args.output).context("failed to create output file")?;
    loop {
        let msg = pre_driver.pull();
        match &*msg {
            Message::Playable(p) => {
                output.write_all(&p.data).context("failed to write output file")?;
            }
            Message::Quit => break,
            _ => {}
        }
    }

    Ok(())
}
