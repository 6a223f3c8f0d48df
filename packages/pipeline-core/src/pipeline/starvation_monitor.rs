//! Starvation monitor (spec.md §4.9): the terminal buffer before the
//! pre-driver. A dedicated worker (spec.md §5, worker 4) greedily pulls
//! from upstream into a fixed-capacity [`Reservoir`], while `pull()` (run
//! by the driver thread) watches that buffer's own fill level: once it
//! drops below `starvation_threshold_jiffies` with no Halt imminent, the
//! monitor ramps the audio it delivers down to silence and enters
//! *buffering* — delivering nothing further until the buffer has
//! recovered to `normal_max_jiffies` — then ramps back up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::interfaces::PipelineObserver;
use crate::message::{Message, Pool, PooledMessage};
use crate::pipeline::ramp_gate::{GatePhase, RampGate};
use crate::pipeline::reservoir::{DecodedJiffies, Reservoir};
use crate::pipeline::Pullable;
use crate::runtime::WorkerSpawner;

pub struct StarvationMonitor {
    buffer: Arc<Reservoir<DecodedJiffies>>,
    pool: Pool<Message>,
    gate: RampGate,
    starvation_threshold_jiffies: u64,
    normal_max_jiffies: u64,
    planned_halt: AtomicBool,
    buffering: AtomicBool,
    observer: Arc<dyn PipelineObserver>,
}

impl StarvationMonitor {
    /// Spawns the greedy pre-fetch worker and returns the monitor, which is
    /// itself [`Pullable`] for whatever sits downstream (the pre-driver).
    #[must_use]
    pub fn spawn<U: Pullable + 'static>(
        upstream: U,
        pool: Pool<Message>,
        capacity_jiffies: u64,
        starvation_threshold_jiffies: u64,
        normal_max_jiffies: u64,
        ramp_duration_jiffies: u64,
        observer: Arc<dyn PipelineObserver>,
        spawner: &dyn WorkerSpawner,
    ) -> Arc<Self> {
        let buffer = Arc::new(Reservoir::new(capacity_jiffies, DecodedJiffies));
        let monitor = Arc::new(Self {
            buffer: buffer.clone(),
            pool,
            gate: RampGate::new(ramp_duration_jiffies),
            starvation_threshold_jiffies,
            normal_max_jiffies,
            planned_halt: AtomicBool::new(false),
            buffering: AtomicBool::new(false),
            observer,
        });

        let worker_monitor = monitor.clone();
        spawner.spawn(
            "starvation-monitor",
            Box::new(move || loop {
                let msg = upstream.pull();
                if matches!(&*msg, Message::Halt { .. }) {
                    worker_monitor.planned_halt.store(true, Ordering::Release);
                }
                let quit = matches!(&*msg, Message::Quit);
                worker_monitor.buffer.push(msg);
                if quit {
                    break;
                }
            }),
        );

        monitor
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

impl Pullable for StarvationMonitor {
    fn pull(&self) -> PooledMessage {
        loop {
            if self.buffering.swap(false, Ordering::AcqRel) {
                self.buffer.wait_for_fill(self.normal_max_jiffies);
                self.gate.request_ramp_up();
                self.observer.state("playing");
            }

            let msg = self.buffer.pull();

            if matches!(&*msg, Message::Halt { .. }) {
                self.planned_halt.store(false, Ordering::Release);
            }

            let duration = match &*msg {
                Message::AudioPcm(p) => p.duration_jiffies,
                Message::Silence(s) => s.duration_jiffies,
                _ => return msg,
            };

            if self.gate.phase() == GatePhase::Running
                && self.buffer.fill() < self.starvation_threshold_jiffies
                && !self.planned_halt.load(Ordering::Acquire)
            {
                self.gate.request_ramp_down();
            }

            match self.gate.apply(duration) {
                Some(ramp) => {
                    if self.gate.is_suspended() {
                        // The ramp-down completed within this very span; enter
                        // buffering now rather than waiting for a later `None`,
                        // which may never come if the next message isn't audio.
                        self.buffering.store(true, Ordering::Release);
                        self.observer.state("buffering");
                    }
                    return self.rebuild_with_ramp(&msg, ramp);
                }
                None => {
                    self.buffering.store(true, Ordering::Release);
                    self.observer.state("buffering");
                    continue;
                }
            }
        }
    }
}
