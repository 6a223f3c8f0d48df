//! External interfaces the core calls into collaborators through
//! (spec.md §6). Concrete wire-protocol clients, codec decoders, and UPnP
//! providers implement these traits; the core never depends on a concrete
//! implementation, only on `dyn Trait` objects handed to it at
//! construction time.
//!
//! These are coarse-grained and don't sit on the hot path (Design Notes,
//! §9), so plain `async_trait`-free sync traits with boxed closures/`Arc`
//! ownership are enough — no need for zero-cost generics here.

mod clock_puller;
mod codec;
mod observer;
mod stream_handler;
mod supply;
mod uri_provider;

pub use clock_puller::ClockPuller;
pub use codec::{Codec, DecodedSink, EncodedSource};
pub use observer::{PipelineObserver, StreamFormat};
pub use stream_handler::{FlushId, StreamHandler, FLUSH_INVALID};
pub use supply::Supply;
pub use uri_provider::{Playability, UriProvider};
