//! Filler (spec.md §4.1): the pipeline's first active worker. Repeatedly
//! calls `GetNext` on the active `UriProvider`, emits a `Track` message for
//! each, then hands the track's URI to a *protocol manager* that streams
//! its bytes back through the `Supply` interface the filler itself
//! implements. `Play`/`Stop`/`Next`/`Prev` commands arrive from whatever
//! control-plane thread calls them and are serialised behind `state`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::interfaces::{Playability, Supply, UriProvider};
use crate::message::{EncodedStreamInfo, IdManager, Message, ModeInfo, Pool, TrackInfo};
use crate::pipeline::reservoir::{EncodedBytes, Reservoir};
use crate::runtime::WorkerSpawner;

/// Streams one track's URI, pushing `EncodedStream`/`EncodedAudio`
/// messages through `supply` until the protocol naturally ends or
/// `interrupt` is observed. Implemented per URI scheme/MIME type by a
/// collaborator outside the pipeline core (spec.md §1 Non-goals).
pub trait ProtocolManager: Send + Sync {
    /// Streams `track`'s content through `supply`. `interrupt` is polled
    /// between writes; once it reads `true` the implementation should
    /// return promptly without necessarily finishing the stream.
    fn stream(&self, track: &TrackInfo, supply: &mut dyn Supply, interrupt: &AtomicBool);
}

struct State {
    provider: Option<Box<dyn UriProvider>>,
    stop_requested: bool,
    interrupt: Arc<AtomicBool>,
}

/// Pushes Mode/Track/EncodedStream/EncodedAudio/MetaText/Flush/Halt/Quit
/// messages into the downstream encoded reservoir. The one `Supply`
/// implementation the core ships; protocol managers are handed `&mut dyn
/// Supply` and never see the reservoir directly.
struct ReservoirSupply<'a> {
    downstream: &'a Reservoir<EncodedBytes>,
    pool: &'a Pool<Message>,
    ids: &'a IdManager,
}

impl Supply for ReservoirSupply<'_> {
    fn output_mode(&mut self, mode: ModeInfo) {
        self.downstream.push(self.pool.alloc_shared(Message::Mode(Arc::new(mode))));
    }

    fn output_track(&mut self, track: TrackInfo) {
        self.downstream.push(self.pool.alloc_shared(Message::Track(Arc::new(track))));
    }

    fn output_encoded_stream(&mut self, stream: EncodedStreamInfo) {
        self.downstream.push(self.pool.alloc_shared(Message::EncodedStream(Arc::new(stream))));
    }

    fn output_data(&mut self, bytes: bytes::Bytes) {
        self.downstream.push(self.pool.alloc_shared(Message::EncodedAudio(bytes)));
    }

    fn output_metadata(&mut self, text: String) {
        self.downstream.push(self.pool.alloc_shared(Message::MetaText(text.into())));
    }

    fn output_flush(&mut self) -> u32 {
        let id = self.ids.next_flush_id();
        self.downstream.push(self.pool.alloc_shared(Message::Flush { id }));
        id
    }

    fn output_halt(&mut self) -> u32 {
        let id = self.ids.next_flush_id();
        self.downstream.push(self.pool.alloc_shared(Message::Halt { id }));
        id
    }

    fn output_quit(&mut self) {
        self.downstream.push(self.pool.alloc_shared(Message::Quit));
    }
}

pub struct Filler {
    downstream: Arc<Reservoir<EncodedBytes>>,
    pool: Pool<Message>,
    ids: Arc<IdManager>,
    protocols: Arc<dyn ProtocolManager>,
    mode: Mutex<Option<ModeInfo>>,
    state: Mutex<State>,
}

impl Filler {
    #[must_use]
    pub fn new(
        downstream: Arc<Reservoir<EncodedBytes>>,
        pool: Pool<Message>,
        ids: Arc<IdManager>,
        protocols: Arc<dyn ProtocolManager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            downstream,
            pool,
            ids,
            protocols,
            mode: Mutex::new(None),
            state: Mutex::new(State {
                provider: None,
                stop_requested: false,
                interrupt: Arc::new(AtomicBool::new(false)),
            }),
        })
    }

    /// Spawns the filler's one worker (spec.md §5, worker 1).
    pub fn spawn(filler: &Arc<Self>, spawner: &dyn WorkerSpawner) {
        let filler = filler.clone();
        spawner.spawn("filler", Box::new(move || filler.run()));
    }

    /// Switches to `mode`/`provider` and begins at `track_id`. Emits the
    /// `Mode` message immediately; the run loop picks up `GetNext` next
    /// time it's idle between tracks.
    pub fn play(&self, mode: ModeInfo, mut provider: Box<dyn UriProvider>, track_id: u32) {
        provider.begin(track_id);
        {
            let mut state = self.state.lock();
            state.provider = Some(provider);
            state.stop_requested = false;
            state.interrupt.store(false, Ordering::Release);
        }
        let mut current_mode = self.mode.lock();
        let emit = !matches!(&*current_mode, Some(m) if m.name == mode.name);
        if emit {
            let mut supply = ReservoirSupply {
                downstream: &self.downstream,
                pool: &self.pool,
                ids: &self.ids,
            };
            supply.output_mode(mode.clone());
        }
        *current_mode = Some(mode);
    }

    /// Raises the stop flag; the current protocol exits cleanly on its
    /// next interrupt check and a `Halt` is emitted once it does.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.stop_requested = true;
        state.interrupt.store(true, Ordering::Release);
    }

    /// Advances the active provider's cursor and interrupts the current
    /// stream so the run loop moves on immediately.
    pub fn next(&self) -> Option<u32> {
        let mut state = self.state.lock();
        let id = state.provider.as_mut()?.move_next();
        state.interrupt.store(true, Ordering::Release);
        id
    }

    pub fn previous(&self) -> Option<u32> {
        let mut state = self.state.lock();
        let id = state.provider.as_mut()?.move_previous();
        state.interrupt.store(true, Ordering::Release);
        id
    }

    /// Runs until the active provider is exhausted and `stop_requested` is
    /// set, emitting a final `Quit`. Intended to run on the worker spawned
    /// by [`Filler::spawn`].
    fn run(&self) {
        loop {
            let next = {
                let mut state = self.state.lock();
                let Some(provider) = state.provider.as_mut() else {
                    break;
                };
                provider.get_next()
            };

            let Some((track, playability)) = next else {
                debug!("uri provider exhausted");
                break;
            };

            let track_id = match playability {
                Playability::Begin { track_id } | Playability::BeginLater { track_id } => track_id,
            };
            info!(track_id, uri = %track.uri, "filler streaming track");

            {
                let mut supply = ReservoirSupply {
                    downstream: &self.downstream,
                    pool: &self.pool,
                    ids: &self.ids,
                };
                supply.output_track(track.clone());
            }

            let interrupt = self.state.lock().interrupt.clone();
            interrupt.store(false, Ordering::Release);
            let mut supply = ReservoirSupply {
                downstream: &self.downstream,
                pool: &self.pool,
                ids: &self.ids,
            };
            self.protocols.stream(&track, &mut supply, &interrupt);

            let stop_requested = {
                let mut state = self.state.lock();
                let stopped = state.stop_requested;
                state.stop_requested = false;
                stopped
            };
            if stop_requested {
                let mut supply = ReservoirSupply {
                    downstream: &self.downstream,
                    pool: &self.pool,
                    ids: &self.ids,
                };
                supply.output_halt();
                break;
            }
        }

        let mut supply = ReservoirSupply {
            downstream: &self.downstream,
            pool: &self.pool,
            ids: &self.ids,
        };
        supply.output_quit();
    }
}
