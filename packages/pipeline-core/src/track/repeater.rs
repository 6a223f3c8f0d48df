//! Repeat decorator over a [`TrackDatabaseReader`] (spec.md §4.1).
//! Grounded on `Av/Playlist/TrackDatabase.h`'s `Repeater`: when repeat is
//! enabled and the wrapped reader runs out of tracks, wraps back around
//! to the first track instead of returning `None`.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::message::TrackInfo;
use crate::track::database::TrackDatabaseObserver;
use crate::track::reader::TrackDatabaseReader;

pub struct Repeater {
    reader: std::sync::Arc<dyn TrackDatabaseReader>,
    repeat: AtomicBool,
}

impl Repeater {
    #[must_use]
    pub fn new(reader: std::sync::Arc<dyn TrackDatabaseReader>) -> Self {
        Self {
            reader,
            repeat: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn repeat(&self) -> bool {
        self.repeat.load(Ordering::Acquire)
    }

    pub fn set_repeat(&self, repeat: bool) {
        self.repeat.store(repeat, Ordering::Release);
    }
}

impl TrackDatabaseObserver for Repeater {
    fn notify_track_inserted(&self, _track: &TrackInfo, _id_before: u32, _id_after: u32) {}
    fn notify_track_deleted(&self, _id: u32, _before: Option<u32>, _after: Option<u32>) {}
    fn notify_all_deleted(&self) {}
}

impl TrackDatabaseReader for Repeater {
    fn set_observer(&self, observer: Box<dyn TrackDatabaseObserver>) {
        self.reader.set_observer(observer);
    }

    fn track_ref(&self, id: u32) -> Option<TrackInfo> {
        self.reader.track_ref(id)
    }

    fn next_track_ref(&self, id: u32) -> Option<TrackInfo> {
        self.reader.next_track_ref(id).or_else(|| {
            if self.repeat() {
                self.reader.track_ref_by_index(0)
            } else {
                None
            }
        })
    }

    fn prev_track_ref(&self, id: u32) -> Option<TrackInfo> {
        self.reader.prev_track_ref(id)
    }

    fn track_ref_by_index(&self, index: usize) -> Option<TrackInfo> {
        self.reader.track_ref_by_index(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackDatabase;

    #[test]
    fn wraps_to_first_track_when_repeat_enabled() {
        let db = std::sync::Arc::new(TrackDatabase::new());
        let a = db.insert(0, "a".into(), "".into()).unwrap();
        let b = db.insert(a, "b".into(), "".into()).unwrap();
        let repeater = Repeater::new(db);
        repeater.set_repeat(true);
        let wrapped = repeater.next_track_ref(b).unwrap();
        assert_eq!(wrapped.track_id, a);
    }

    #[test]
    fn does_not_wrap_when_repeat_disabled() {
        let db = std::sync::Arc::new(TrackDatabase::new());
        let a = db.insert(0, "a".into(), "".into()).unwrap();
        let repeater = Repeater::new(db);
        assert_eq!(repeater.next_track_ref(a), None);
    }
}
