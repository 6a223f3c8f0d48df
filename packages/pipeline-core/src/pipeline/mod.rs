//! The message-passing elements of spec.md §2/§4: a linear chain from the
//! filler down to the pre-driver. Most elements are passive pull-through
//! transforms that run on whichever thread calls `pull`; a handful own a
//! background worker (codec controller, gorger, starvation monitor) per
//! spec.md §5.

pub mod aggregator;
pub mod codec_controller;
pub mod container;
pub mod filler;
pub mod gorger;
pub mod muter;
pub mod pre_driver;
pub mod pruner;
pub mod ramp_gate;
pub mod ramper;
pub mod reporter;
pub mod reservoir;
pub mod seeker;
pub mod skipper;
pub mod splitter;
pub mod starvation_monitor;
pub mod stopper;
pub mod variable_delay;
pub mod waiter;

use crate::message::PooledMessage;

/// A pull-based element: produces the next message in the chain, pulling
/// from (and usually transforming the output of) its upstream.
///
/// Reservoirs are the one element that can also be pushed into; every
/// other element reaches its upstream exclusively through this trait,
/// which is how spec.md §5's "passive elements run on whichever worker
/// calls Pull" falls out for free — there is no dedicated thread behind
/// a `Pullable` unless it is also a [`reservoir::Reservoir`] or a worker
/// documented as owning one.
pub trait Pullable: Send + Sync {
    fn pull(&self) -> PooledMessage;
}

impl<P: Pullable + ?Sized> Pullable for std::sync::Arc<P> {
    fn pull(&self) -> PooledMessage {
        (**self).pull()
    }
}
