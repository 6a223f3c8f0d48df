//! The track database and the shuffle/repeat decorators layered over it
//! (spec.md §4.1). Grounded on `Av/Playlist/TrackDatabase.h` and
//! `Av/UpnpAv/UriProviderRepeater.cpp`.

mod database;
mod reader;
mod repeater;
mod shuffler;
mod uri_provider;

pub use database::{TrackDatabase, TrackDatabaseObserver, MAX_TRACKS, TRACK_ID_NONE};
pub use reader::TrackDatabaseReader;
pub use repeater::Repeater;
pub use shuffler::Shuffler;
pub use uri_provider::UriProviderImpl;
