//! Bounded FIFO of messages with producer backpressure (spec.md §4.2).
//! The encoded reservoir measures its contents in bytes; the decoded
//! reservoir measures them in jiffies of audio. Both are the same
//! generic [`Reservoir`], parameterised by a [`SizeMetric`].

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::interfaces::ClockPuller;
use crate::message::{Message, PooledMessage};

/// Measures how much of a reservoir's capacity one message occupies.
pub trait SizeMetric: Send + Sync {
    fn size_of(&self, msg: &PooledMessage) -> u64;
}

/// Sizes encoded audio in bytes; everything else (control messages) costs
/// nothing.
pub struct EncodedBytes;

impl SizeMetric for EncodedBytes {
    fn size_of(&self, msg: &PooledMessage) -> u64 {
        match &**msg {
            Message::EncodedAudio(b) => b.len() as u64,
            _ => 0,
        }
    }
}

/// Sizes decoded audio in jiffies; everything else costs nothing.
pub struct DecodedJiffies;

impl SizeMetric for DecodedJiffies {
    fn size_of(&self, msg: &PooledMessage) -> u64 {
        msg.duration_jiffies().unwrap_or(0)
    }
}

struct Inner {
    queue: VecDeque<PooledMessage>,
    size: u64,
    jiffies_since_notify: u64,
}

/// A bounded FIFO connecting one producer worker to one consumer worker.
///
/// `push` never blocks while enqueueing, but once the queue's measured
/// size exceeds `max` it parks the *calling* thread until a `pull` brings
/// it back under threshold — so in practice the producer's next `push`
/// call is what blocks, one message later than the spec's description
/// might suggest, which is equivalent in steady state.
pub struct Reservoir<M: SizeMetric> {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    not_full: Condvar,
    max: u64,
    metric: M,
    clock_puller: Mutex<Option<Arc<dyn ClockPuller>>>,
    notify_interval_jiffies: u64,
}

impl<M: SizeMetric> Reservoir<M> {
    #[must_use]
    pub fn new(max: u64, metric: M) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                size: 0,
                jiffies_since_notify: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            max,
            metric,
            clock_puller: Mutex::new(None),
            notify_interval_jiffies: crate::message::ms_to_jiffies(20),
        }
    }

    /// Registers a clock puller to be notified of fill every
    /// `notify_interval_jiffies` of audio pulled (decoded reservoir only;
    /// see spec.md §4.2).
    pub fn set_clock_puller(&self, puller: Option<Arc<dyn ClockPuller>>) {
        *self.clock_puller.lock() = puller;
    }

    #[must_use]
    pub fn fill(&self) -> u64 {
        self.inner.lock().size
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.fill() >= self.max
    }

    /// Enqueues `msg`, then blocks the caller until the reservoir's size
    /// drops back under `max` (if it doesn't exceed `max`, returns
    /// immediately).
    pub fn push(&self, msg: PooledMessage) {
        let added = self.metric.size_of(&msg);
        let mut inner = self.inner.lock();
        inner.queue.push_back(msg);
        inner.size += added;
        self.not_empty.notify_one();
        while inner.size > self.max {
            trace!(size = inner.size, max = self.max, "reservoir full, blocking producer");
            self.not_full.wait(&mut inner);
        }
    }

    /// Blocks the calling thread until the reservoir's fill reaches
    /// `target` (used by the [`Gorger`](crate::pipeline::gorger::Gorger)'s
    /// gorge-size wait, spec.md §4.7/§5).
    pub fn wait_for_fill(&self, target: u64) {
        let mut inner = self.inner.lock();
        while inner.size < target {
            self.not_empty.wait(&mut inner);
        }
    }

    /// Blocks until a message is available, then dequeues it.
    pub fn pull(&self) -> PooledMessage {
        let mut inner = self.inner.lock();
        while inner.queue.is_empty() {
            self.not_empty.wait(&mut inner);
        }
        let msg = inner.queue.pop_front().expect("checked non-empty");
        let removed = self.metric.size_of(&msg);
        inner.size = inner.size.saturating_sub(removed);
        if inner.size < self.max {
            self.not_full.notify_one();
        }

        inner.jiffies_since_notify += removed;
        if inner.jiffies_since_notify >= self.notify_interval_jiffies {
            inner.jiffies_since_notify = 0;
            let fill = inner.size;
            drop(inner);
            if let Some(puller) = self.clock_puller.lock().as_ref() {
                puller.notify_size(fill);
            }
        }
        msg
    }
}

impl<M: SizeMetric> super::Pullable for Reservoir<M> {
    fn pull(&self) -> PooledMessage {
        Reservoir::pull(self)
    }
}
