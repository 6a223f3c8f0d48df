//! The concrete clock puller (spec.md §4.12). The trait itself
//! ([`crate::interfaces::ClockPuller`]) lives with the other external
//! interfaces; this module holds the core's own implementation of it.

mod puller;

pub use puller::ClockPullerUtilisation;
