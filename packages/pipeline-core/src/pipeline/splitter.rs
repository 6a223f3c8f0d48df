//! Splitter (spec.md §2 row 14, §9 Design Notes: "model that explicitly
//! with an explicit clone that bumps an atomic counter"): tees every
//! message pulled from upstream onto an optional secondary sink, at the
//! cost of one `Arc` clone (a refcount bump, no data copy) per message —
//! the one place in this pipeline where a message is genuinely shared
//! rather than owned by a single consumer.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::message::PooledMessage;
use crate::pipeline::reservoir::{Reservoir, SizeMetric};
use crate::pipeline::Pullable;

/// A push-based destination a [`Splitter`] can tee messages onto.
pub trait Sink: Send + Sync {
    fn push(&self, msg: PooledMessage);
}

impl<M: SizeMetric> Sink for Reservoir<M> {
    fn push(&self, msg: PooledMessage) {
        Reservoir::push(self, msg);
    }
}

pub struct Splitter<U> {
    upstream: U,
    sink: Mutex<Option<Arc<dyn Sink>>>,
}

impl<U: Pullable> Splitter<U> {
    #[must_use]
    pub fn new(upstream: U) -> Self {
        Self {
            upstream,
            sink: Mutex::new(None),
        }
    }

    /// Attaches (or detaches, with `None`) the secondary branch.
    pub fn set_sink(&self, sink: Option<Arc<dyn Sink>>) {
        *self.sink.lock() = sink;
    }
}

impl<U: Pullable> Pullable for Splitter<U> {
    fn pull(&self) -> PooledMessage {
        let msg = self.upstream.pull();
        if let Some(sink) = self.sink.lock().as_ref() {
            sink.push(msg.clone());
        }
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, Pool};
    use crate::pipeline::reservoir::EncodedBytes;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    struct ScriptedUpstream {
        queue: StdMutex<VecDeque<PooledMessage>>,
    }

    impl Pullable for ScriptedUpstream {
        fn pull(&self) -> PooledMessage {
            self.queue.lock().unwrap().pop_front().expect("script exhausted")
        }
    }

    #[test]
    fn tees_every_message_onto_the_secondary_sink() {
        let pool: Pool<Message> = Pool::new(8);
        let mut queue = VecDeque::new();
        queue.push_back(pool.alloc_shared(Message::Quit));
        let upstream = ScriptedUpstream { queue: StdMutex::new(queue) };
        let splitter = Splitter::new(upstream);
        let secondary = Arc::new(Reservoir::new(u64::MAX, EncodedBytes));
        splitter.set_sink(Some(secondary.clone() as Arc<dyn Sink>));

        let primary = splitter.pull();
        assert!(matches!(&*primary, Message::Quit));
        let from_secondary = secondary.pull();
        assert!(matches!(&*from_secondary, Message::Quit));
    }
}
