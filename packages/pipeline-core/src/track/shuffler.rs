//! Shuffle decorator over a [`TrackDatabaseReader`] (spec.md §4.1).
//! Grounded on `Av/Playlist/TrackDatabase.h`'s `Shuffler`: it keeps its
//! own permutation of the underlying track list and reshuffles on
//! request, but always keeps already-played tracks (everything up to and
//! including the last one returned by `track_ref`) in their original
//! relative order at the front.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rand::seq::SliceRandom;

use crate::message::TrackInfo;
use crate::track::database::{TrackDatabaseObserver, TRACK_ID_NONE};
use crate::track::reader::TrackDatabaseReader;

struct State {
    order: Vec<TrackInfo>,
    prev_track_id: u32,
}

/// Wraps a [`TrackDatabaseReader`] and presents a shuffled (or, when
/// disabled, pass-through) ordering of the same tracks.
pub struct Shuffler {
    reader: std::sync::Arc<dyn TrackDatabaseReader>,
    state: Mutex<State>,
    enabled: AtomicBool,
}

impl Shuffler {
    #[must_use]
    pub fn new(reader: std::sync::Arc<dyn TrackDatabaseReader>) -> Self {
        Self {
            reader,
            state: Mutex::new(State {
                order: Vec::new(),
                prev_track_id: TRACK_ID_NONE,
            }),
            enabled: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_shuffle(&self, shuffle: bool) {
        self.enabled.store(shuffle, Ordering::Release);
        if shuffle {
            self.reshuffle();
        }
    }

    /// Rebuilds the permutation from scratch, reading the underlying
    /// track order fresh and shuffling everything after `prev_track_id`.
    pub fn reshuffle(&self) {
        let mut order = Vec::new();
        let mut index = 0;
        while let Some(track) = self.reader.track_ref_by_index(index) {
            order.push(track);
            index += 1;
        }
        let mut state = self.state.lock();
        let split = state
            .prev_track_id
            .ne(&TRACK_ID_NONE)
            .then(|| order.iter().position(|t| t.track_id == state.prev_track_id))
            .flatten()
            .map_or(0, |i| i + 1);
        let (played, mut unplayed) = {
            let tail = order.split_off(split);
            (order, tail)
        };
        unplayed.shuffle(&mut rand::thread_rng());
        let mut result = played;
        result.extend(unplayed);
        state.order = result;
    }

    /// Moves `id` to directly follow the last-played track, as though it
    /// had just been inserted there (used when a track that was already
    /// shuffled elsewhere gets selected explicitly via `Begin`).
    pub fn move_to_start_of_unplayed(&self, id: u32) {
        if !self.enabled() {
            return;
        }
        let mut state = self.state.lock();
        let Some(pos) = state.order.iter().position(|t| t.track_id == id) else {
            return;
        };
        let track = state.order.remove(pos);
        let insert_at = state
            .order
            .iter()
            .position(|t| t.track_id == state.prev_track_id)
            .map_or(0, |i| i + 1);
        state.order.insert(insert_at, track);
    }
}

impl TrackDatabaseObserver for Shuffler {
    fn notify_track_inserted(&self, track: &TrackInfo, _id_before: u32, _id_after: u32) {
        let mut state = self.state.lock();
        state.order.push(track.clone());
        drop(state);
        if self.enabled() {
            self.reshuffle();
        }
    }

    fn notify_track_deleted(&self, id: u32, _before: Option<u32>, _after: Option<u32>) {
        let mut state = self.state.lock();
        state.order.retain(|t| t.track_id != id);
        if state.prev_track_id == id {
            state.prev_track_id = TRACK_ID_NONE;
        }
    }

    fn notify_all_deleted(&self) {
        let mut state = self.state.lock();
        state.order.clear();
        state.prev_track_id = TRACK_ID_NONE;
    }
}

impl TrackDatabaseObserver for std::sync::Arc<Shuffler> {
    fn notify_track_inserted(&self, track: &TrackInfo, id_before: u32, id_after: u32) {
        (**self).notify_track_inserted(track, id_before, id_after);
    }

    fn notify_track_deleted(&self, id: u32, before: Option<u32>, after: Option<u32>) {
        (**self).notify_track_deleted(id, before, after);
    }

    fn notify_all_deleted(&self) {
        (**self).notify_all_deleted();
    }
}

impl TrackDatabaseReader for Shuffler {
    fn set_observer(&self, observer: Box<dyn TrackDatabaseObserver>) {
        self.reader.set_observer(observer);
    }

    fn track_ref(&self, id: u32) -> Option<TrackInfo> {
        let found = self.state.lock().order.iter().any(|t| t.track_id == id);
        if found {
            self.state.lock().prev_track_id = id;
        }
        self.reader.track_ref(id)
    }

    fn next_track_ref(&self, id: u32) -> Option<TrackInfo> {
        let mut state = self.state.lock();
        let pos = if id == TRACK_ID_NONE {
            None
        } else {
            state.order.iter().position(|t| t.track_id == id)
        };
        let next = match pos {
            Some(i) => state.order.get(i + 1).cloned(),
            None => state.order.first().cloned(),
        };
        if let Some(ref t) = next {
            state.prev_track_id = t.track_id;
        }
        next
    }

    fn prev_track_ref(&self, id: u32) -> Option<TrackInfo> {
        let state = self.state.lock();
        let pos = state.order.iter().position(|t| t.track_id == id)?;
        pos.checked_sub(1).and_then(|i| state.order.get(i)).cloned()
    }

    fn track_ref_by_index(&self, index: usize) -> Option<TrackInfo> {
        self.state.lock().order.get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackDatabase;

    fn populated(n: u32) -> std::sync::Arc<TrackDatabase> {
        let db = std::sync::Arc::new(TrackDatabase::new());
        for i in 0..n {
            db.insert(0, format!("track-{i}"), "".into()).unwrap();
        }
        db
    }

    #[test]
    fn disabled_shuffler_is_not_enabled_by_default() {
        let db = populated(3);
        let shuffler = Shuffler::new(db);
        assert!(!shuffler.enabled());
    }

    #[test]
    fn reshuffle_preserves_full_track_set() {
        let db = populated(10);
        let shuffler = Shuffler::new(db);
        shuffler.set_shuffle(true);
        let mut ids: Vec<u32> = (0..10)
            .map_while(|i| shuffler.track_ref_by_index(i).map(|t| t.track_id))
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn next_track_ref_from_none_returns_first_in_current_order() {
        let db = populated(3);
        let shuffler = Shuffler::new(db);
        let first = shuffler.track_ref_by_index(0).unwrap();
        assert_eq!(shuffler.next_track_ref(TRACK_ID_NONE), Some(first));
    }
}
