//! The track database: an ordered, observable list of tracks addressed by
//! a stable id rather than position (spec.md §4.1). Grounded on
//! `Av/Playlist/TrackDatabase.h`'s `ITrackDatabase`/`ITrackDatabaseReader`
//! split, collapsed into one Rust type behind `parking_lot::RwLock`.

use parking_lot::RwLock;

use crate::error::{PipelineError, PipelineResult};
use crate::message::TrackInfo;

/// Upper bound on the number of tracks a database will hold at once.
pub const MAX_TRACKS: usize = 1000;

/// Sentinel meaning "no track" where an id is expected.
pub const TRACK_ID_NONE: u32 = 0;

/// Notified whenever the database's contents change, so a [`Shuffler`]
/// or [`Repeater`](crate::track::Repeater) layered on top can keep its own
/// view in sync without polling.
///
/// [`Shuffler`]: crate::track::Shuffler
pub trait TrackDatabaseObserver: Send + Sync {
    fn notify_track_inserted(&self, track: &TrackInfo, id_before: u32, id_after: u32);
    fn notify_track_deleted(&self, id: u32, before: Option<u32>, after: Option<u32>);
    fn notify_all_deleted(&self);
}

struct Inner {
    tracks: Vec<TrackInfo>,
    next_id: u32,
    seq: u32,
}

/// Ordered, id-addressed track list. Reads copy out a [`TrackInfo`]
/// rather than handing back a reference, since callers may hold it
/// across a later mutation.
pub struct TrackDatabase {
    inner: RwLock<Inner>,
    observers: RwLock<Vec<Box<dyn TrackDatabaseObserver>>>,
}

impl Default for TrackDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                tracks: Vec::new(),
                next_id: 1,
                seq: 0,
            }),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn add_observer(&self, observer: Box<dyn TrackDatabaseObserver>) {
        self.observers.write().push(observer);
    }

    /// A monotonically increasing counter bumped on every mutation, so a
    /// reader can cheaply detect "nothing changed since I last looked".
    #[must_use]
    pub fn sequence(&self) -> u32 {
        self.inner.read().seq
    }

    #[must_use]
    pub fn track_count(&self) -> usize {
        self.inner.read().tracks.len()
    }

    /// Ids in playback order, alongside the sequence number they were
    /// read under.
    #[must_use]
    pub fn id_array(&self) -> (Vec<u32>, u32) {
        let inner = self.inner.read();
        (inner.tracks.iter().map(|t| t.track_id).collect(), inner.seq)
    }

    #[must_use]
    pub fn track_by_id(&self, id: u32) -> Option<TrackInfo> {
        let inner = self.inner.read();
        inner.tracks.iter().find(|t| t.track_id == id).cloned()
    }

    /// Like [`TrackDatabase::track_by_id`] but also returns the track's
    /// index, useful to callers that want to resume a linear scan.
    #[must_use]
    pub fn track_by_id_indexed(&self, id: u32) -> Option<(TrackInfo, usize)> {
        let inner = self.inner.read();
        inner
            .tracks
            .iter()
            .enumerate()
            .find(|(_, t)| t.track_id == id)
            .map(|(i, t)| (t.clone(), i))
    }

    #[must_use]
    pub fn track_by_index(&self, index: usize) -> Option<TrackInfo> {
        self.inner.read().tracks.get(index).cloned()
    }

    /// Inserts `uri`/`metadata` immediately after `id_after` (use
    /// [`TRACK_ID_NONE`] to insert at the head). Returns the newly
    /// allocated track id.
    pub fn insert(
        &self,
        id_after: u32,
        uri: String,
        metadata: crate::message::Metadata,
    ) -> PipelineResult<u32> {
        let (track, before_id, after_id) = {
            let mut inner = self.inner.write();
            if inner.tracks.len() >= MAX_TRACKS {
                return Err(PipelineError::TrackDatabaseFull { max: MAX_TRACKS });
            }
            let insert_at = if id_after == TRACK_ID_NONE {
                0
            } else {
                let idx = inner
                    .tracks
                    .iter()
                    .position(|t| t.track_id == id_after)
                    .ok_or(PipelineError::TrackDatabaseIdNotFound(id_after))?;
                idx + 1
            };
            let id = inner.next_id;
            inner.next_id += 1;
            inner.seq += 1;
            let track = TrackInfo {
                track_id: id,
                uri,
                metadata,
                start_of_stream: false,
            };
            let before_id = if insert_at == 0 {
                TRACK_ID_NONE
            } else {
                inner.tracks[insert_at - 1].track_id
            };
            let after_id = inner
                .tracks
                .get(insert_at)
                .map_or(TRACK_ID_NONE, |t| t.track_id);
            inner.tracks.insert(insert_at, track.clone());
            (track, before_id, after_id)
        };
        for observer in self.observers.read().iter() {
            observer.notify_track_inserted(&track, before_id, after_id);
        }
        Ok(track.track_id)
    }

    pub fn delete_id(&self, id: u32) -> PipelineResult<()> {
        let (before, after) = {
            let mut inner = self.inner.write();
            let idx = inner
                .tracks
                .iter()
                .position(|t| t.track_id == id)
                .ok_or(PipelineError::TrackDatabaseIdNotFound(id))?;
            inner.tracks.remove(idx);
            inner.seq += 1;
            let before = idx.checked_sub(1).and_then(|i| inner.tracks.get(i)).map(|t| t.track_id);
            let after = inner.tracks.get(idx).map(|t| t.track_id);
            (before, after)
        };
        for observer in self.observers.read().iter() {
            observer.notify_track_deleted(id, before, after);
        }
        Ok(())
    }

    pub fn delete_all(&self) {
        {
            let mut inner = self.inner.write();
            inner.tracks.clear();
            inner.seq += 1;
        }
        for observer in self.observers.read().iter() {
            observer.notify_all_deleted();
        }
    }

    #[must_use]
    pub fn next_track_id(&self, id: u32) -> Option<u32> {
        let inner = self.inner.read();
        let idx = inner.tracks.iter().position(|t| t.track_id == id)?;
        inner.tracks.get(idx + 1).map(|t| t.track_id)
    }

    #[must_use]
    pub fn prev_track_id(&self, id: u32) -> Option<u32> {
        let inner = self.inner.read();
        let idx = inner.tracks.iter().position(|t| t.track_id == id)?;
        idx.checked_sub(1).and_then(|i| inner.tracks.get(i)).map(|t| t.track_id)
    }
}

impl crate::track::reader::TrackDatabaseReader for TrackDatabase {
    fn set_observer(&self, observer: Box<dyn TrackDatabaseObserver>) {
        self.add_observer(observer);
    }

    fn track_ref(&self, id: u32) -> Option<TrackInfo> {
        self.track_by_id(id)
    }

    fn next_track_ref(&self, id: u32) -> Option<TrackInfo> {
        self.next_track_id(id).and_then(|id| self.track_by_id(id))
    }

    fn prev_track_ref(&self, id: u32) -> Option<TrackInfo> {
        self.prev_track_id(id).and_then(|id| self.track_by_id(id))
    }

    fn track_ref_by_index(&self, index: usize) -> Option<TrackInfo> {
        self.track_by_index(index)
    }
}
