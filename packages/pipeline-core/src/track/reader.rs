//! `ITrackDatabaseReader` (spec.md §4.1): the read-only, observable view
//! the filler's [`crate::track::UriProviderImpl`] and the [`Shuffler`]/
//! [`Repeater`] decorators consume. [`TrackDatabase`](crate::track::TrackDatabase)
//! is the base implementation; `Shuffler` and `Repeater` each wrap another
//! reader and present the same interface back out, so they compose in
//! either order.

use crate::message::TrackInfo;
use crate::track::database::TrackDatabaseObserver;

/// Read-only, observable access to an ordered track list.
pub trait TrackDatabaseReader: Send + Sync {
    fn set_observer(&self, observer: Box<dyn TrackDatabaseObserver>);
    fn track_ref(&self, id: u32) -> Option<TrackInfo>;
    fn next_track_ref(&self, id: u32) -> Option<TrackInfo>;
    fn prev_track_ref(&self, id: u32) -> Option<TrackInfo>;
    fn track_ref_by_index(&self, index: usize) -> Option<TrackInfo>;
}
