use std::collections::HashMap;

use parking_lot::Mutex;

use crate::common::FrameId;

struct LruInner {
    /// frame id -> timestamp of its most recent unpin
    entries: HashMap<FrameId, u64>,
    /// Monotonic counter; no two entries ever share a timestamp
    next_stamp: u64,
}

/// Strict LRU replacement policy. The replacer tracks frames that are
/// candidates for eviction (resident and unpinned); the victim is the
/// frame whose last unpin is oldest.
pub struct LruReplacer {
    /// Maximum number of frames the replacer can track
    num_pages: usize,
    inner: Mutex<LruInner>,
}

impl LruReplacer {
    pub fn new(num_pages: usize) -> Self {
        Self {
            num_pages,
            inner: Mutex::new(LruInner {
                entries: HashMap::with_capacity(num_pages),
                next_stamp: 0,
            }),
        }
    }

    /// Removes and returns the least recently unpinned frame, or None if
    /// no frame is evictable.
    pub fn victim(&self) -> Option<FrameId> {
        let mut inner = self.inner.lock();

        let victim = inner
            .entries
            .iter()
            .min_by_key(|(_, &stamp)| stamp)
            .map(|(&frame_id, _)| frame_id)?;

        inner.entries.remove(&victim);
        Some(victim)
    }

    /// Removes a frame from the candidate set. No-op if absent. Called
    /// when a frame becomes pinned or otherwise leaves the pool's
    /// evictable population.
    pub fn pin(&self, frame_id: FrameId) {
        self.inner.lock().entries.remove(&frame_id);
    }

    /// Adds a frame to the candidate set, or refreshes its timestamp if
    /// it is already present.
    pub fn unpin(&self, frame_id: FrameId) {
        if frame_id.as_usize() >= self.num_pages {
            return;
        }

        let mut inner = self.inner.lock();
        let stamp = inner.next_stamp;
        inner.next_stamp += 1;
        inner.entries.insert(frame_id, stamp);
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.inner.lock().entries.len()
    }
}
