//! Concrete [`UriProvider`](crate::interfaces::UriProvider) wiring a
//! [`TrackDatabaseReader`] chain (database → shuffler → repeater) into
//! the shape the filler expects. Grounded on
//! `Av/UpnpAv/UriProviderRepeater.cpp`'s `Begin`/`BeginLater`/`GetNext`
//! state machine.

use parking_lot::Mutex;

use crate::interfaces::{Playability, UriProvider};
use crate::message::TrackInfo;
use crate::track::database::TRACK_ID_NONE;
use crate::track::reader::TrackDatabaseReader;

struct State {
    current: Option<TrackInfo>,
    retrieved: bool,
    play_later: bool,
}

/// Walks a [`TrackDatabaseReader`] chain in playback order, handing the
/// filler one track at a time.
pub struct UriProviderImpl {
    reader: std::sync::Arc<dyn TrackDatabaseReader>,
    state: Mutex<State>,
}

impl UriProviderImpl {
    #[must_use]
    pub fn new(reader: std::sync::Arc<dyn TrackDatabaseReader>) -> Self {
        Self {
            reader,
            state: Mutex::new(State {
                current: None,
                retrieved: true,
                play_later: false,
            }),
        }
    }

    fn do_begin(&self, track_id: u32, later: bool) {
        let track = self.reader.track_ref(track_id);
        let mut state = self.state.lock();
        state.retrieved = match (&state.current, &track) {
            (Some(cur), Some(t)) => cur.track_id != t.track_id,
            _ => true,
        };
        state.current = track;
        state.play_later = later;
    }
}

impl UriProvider for UriProviderImpl {
    fn current_track_id(&self) -> Option<u32> {
        self.state.lock().current.as_ref().map(|t| t.track_id)
    }

    fn begin(&mut self, track_id: u32) {
        self.do_begin(track_id, false);
    }

    fn begin_later(&mut self, track_id: u32) {
        self.do_begin(track_id, true);
    }

    fn get_next(&mut self) -> Option<(TrackInfo, Playability)> {
        let mut state = self.state.lock();
        let track = state.current.clone()?;
        let play_later = if state.retrieved {
            true
        } else {
            state.play_later
        };
        state.retrieved = true;
        let playability = if play_later {
            Playability::BeginLater {
                track_id: track.track_id,
            }
        } else {
            Playability::Begin {
                track_id: track.track_id,
            }
        };
        Some((track, playability))
    }

    fn move_next(&mut self) -> Option<u32> {
        let mut state = self.state.lock();
        if state.current.is_none() || !state.retrieved {
            return None;
        }
        let next_id = state.current.as_ref().map(|t| t.track_id).unwrap_or(TRACK_ID_NONE);
        let next = self.reader.next_track_ref(next_id)?;
        let id = next.track_id;
        state.current = Some(next);
        state.retrieved = false;
        Some(id)
    }

    fn move_previous(&mut self) -> Option<u32> {
        let mut state = self.state.lock();
        if state.current.is_none() || !state.retrieved {
            return None;
        }
        let cur_id = state.current.as_ref().map(|t| t.track_id).unwrap_or(TRACK_ID_NONE);
        let prev = self.reader.prev_track_ref(cur_id)?;
        let id = prev.track_id;
        state.current = Some(prev);
        state.retrieved = false;
        Some(id)
    }
}
