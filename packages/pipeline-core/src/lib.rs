//! Core streaming audio pipeline for a networked media renderer: the
//! message-passing elements between a track source and a driver (spec.md
//! §2–§5), the track database/shuffler/repeater the filler draws from,
//! and the clock puller a timestamped mode uses to correct playback rate.
//!
//! This crate owns no I/O. Concrete protocol clients, codec decoders, and
//! the driver that writes `Playable` bytes out to a device all live
//! outside it, wired in through the traits in [`interfaces`].

pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod interfaces;
pub mod message;
pub mod pipeline;
pub mod runtime;
pub mod track;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
