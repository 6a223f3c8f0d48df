//! `IUriProvider` (spec.md §6, §4.1): the interface the filler element
//! pulls tracks from. A concrete implementation wires together the track
//! database, shuffler and repeater (see [`crate::track`]).

use crate::message::TrackInfo;

/// Whether a track the filler just pulled can start playing immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playability {
    /// Play as soon as the pipeline is ready.
    Begin { track_id: u32 },
    /// This track will become playable once an earlier one finishes; the
    /// filler should keep asking `GetNext` has something ready.
    BeginLater { track_id: u32 },
}

/// Source of tracks the filler draws from in playback order.
pub trait UriProvider: Send {
    /// The id most recently returned by `GetNext`, if any.
    fn current_track_id(&self) -> Option<u32>;

    /// Seeks the provider so the next `GetNext` starts at `track_id`.
    fn begin(&mut self, track_id: u32);

    /// Like [`UriProvider::begin`], but the provider should defer actually
    /// making the track current until it is fetched via `GetNext`.
    fn begin_later(&mut self, track_id: u32);

    /// Pulls the next track in playback order, or `None` if the provider
    /// has nothing left to offer right now.
    fn get_next(&mut self) -> Option<(TrackInfo, Playability)>;

    fn move_next(&mut self) -> Option<u32>;
    fn move_previous(&mut self) -> Option<u32>;
}
