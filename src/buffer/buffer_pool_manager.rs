use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{FrameId, PageId, Result, VellumError};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{Frame, LruReplacer, ReadPageGuard, WritePageGuard};

/// Bookkeeping guarded by the pool latch.
struct PoolInner {
    /// Page table: maps resident page ids to frame ids
    page_table: HashMap<PageId, FrameId>,
    /// Frames that currently hold no live page
    free_list: VecDeque<FrameId>,
}

/// State shared between the pool and its page guards.
pub(crate) struct PoolState {
    frames: Vec<Arc<Frame>>,
    inner: Mutex<PoolInner>,
    replacer: LruReplacer,
}

impl PoolState {
    /// Releases one pin on a page, ORing in the dirty flag. Returns false
    /// for a page that is not resident or whose pin count is already zero
    /// (a double unpin is a caller bug and is surfaced, not absorbed).
    pub(crate) fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let inner = self.inner.lock();

        let frame_id = match inner.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return false,
        };
        let frame = &self.frames[frame_id.as_usize()];

        if frame.pin_count() == 0 {
            return false;
        }

        if is_dirty {
            frame.set_dirty(true);
        }
        if frame.unpin() == Some(0) {
            self.replacer.unpin(frame_id);
        }
        true
    }
}

/// BufferPoolManager mediates between the fixed array of in-memory frames
/// and the paged disk file. Pages are handed out as RAII guards that pin
/// the frame for their lifetime; eviction uses the LRU replacer and writes
/// dirty victims back before the frame is reused.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    /// Shared state (also referenced by outstanding guards)
    state: Arc<PoolState>,
    /// Disk scheduler for the backing file I/O
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(Frame::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let state = Arc::new(PoolState {
            frames,
            inner: Mutex::new(PoolInner {
                page_table: HashMap::with_capacity(pool_size),
                free_list,
            }),
            replacer: LruReplacer::new(pool_size),
        });

        Self {
            pool_size,
            state,
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Fetches a page for shared read access, pinning it for the guard's
    /// lifetime.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<ReadPageGuard> {
        let frame_id = self.fetch_frame(page_id)?;
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        Ok(ReadPageGuard::new(page_id, frame, Arc::clone(&self.state)))
    }

    /// Fetches a page for exclusive write access, pinning it for the
    /// guard's lifetime.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<WritePageGuard> {
        let frame_id = self.fetch_frame(page_id)?;
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        Ok(WritePageGuard::new(page_id, frame, Arc::clone(&self.state)))
    }

    /// Allocates a fresh page on disk and returns a pinned write guard
    /// over its zeroed frame. The page counts as clean until written.
    pub fn new_page(&self) -> Result<WritePageGuard> {
        let mut inner = self.state.inner.lock();

        let frame_id = self.acquire_frame(&mut inner)?;
        let frame = &self.state.frames[frame_id.as_usize()];

        let page_id = match self.disk_scheduler.disk_manager().allocate_page() {
            Ok(page_id) => page_id,
            Err(e) => {
                inner.free_list.push_front(frame_id);
                return Err(e);
            }
        };

        frame.set_page_id(page_id);
        frame.pin();
        inner.page_table.insert(page_id, frame_id);
        drop(inner);

        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        Ok(WritePageGuard::new(page_id, frame, Arc::clone(&self.state)))
    }

    /// Releases one pin on a page. See PoolState::unpin_page.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.state.unpin_page(page_id, is_dirty)
    }

    /// Writes a dirty resident page through to disk and clears its dirty
    /// flag. The frame stays resident and its pin state is untouched.
    /// Returns false if the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let inner = self.state.inner.lock();

        let frame_id = match inner.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Ok(false),
        };
        let frame = &self.state.frames[frame_id.as_usize()];

        if frame.is_dirty() {
            self.disk_scheduler
                .write_page_sync(page_id, frame.snapshot())?;
            frame.set_dirty(false);
        }
        Ok(true)
    }

    /// Flushes every dirty resident page.
    pub fn flush_all_pages(&self) -> Result<()> {
        let inner = self.state.inner.lock();

        for (&page_id, &frame_id) in inner.page_table.iter() {
            let frame = &self.state.frames[frame_id.as_usize()];
            if frame.is_dirty() {
                self.disk_scheduler
                    .write_page_sync(page_id, frame.snapshot())?;
                frame.set_dirty(false);
            }
        }
        Ok(())
    }

    /// Deletes a page. A non-resident page is deallocated directly. A
    /// resident page must be unpinned; deleting a pinned page returns
    /// Ok(false) and changes nothing.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.state.inner.lock();

        let frame_id = match inner.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => {
                self.disk_scheduler
                    .disk_manager()
                    .deallocate_page(page_id)?;
                return Ok(true);
            }
        };
        let frame = &self.state.frames[frame_id.as_usize()];

        if frame.pin_count() > 0 {
            return Ok(false);
        }

        inner.page_table.remove(&page_id);
        self.state.replacer.pin(frame_id);
        frame.reset_memory();
        inner.free_list.push_back(frame_id);

        self.disk_scheduler
            .disk_manager()
            .deallocate_page(page_id)?;
        Ok(true)
    }

    /// Returns the pin count of a resident page.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let inner = self.state.inner.lock();
        inner
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.state.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.inner.lock().free_list.len()
    }

    /// Pins the page into a frame and returns the frame id. A resident
    /// page is pinned in place; otherwise a frame is acquired (free list
    /// first, then eviction) and the page is read from disk into it.
    fn fetch_frame(&self, page_id: PageId) -> Result<FrameId> {
        let mut inner = self.state.inner.lock();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let frame = &self.state.frames[frame_id.as_usize()];
            frame.pin();
            self.state.replacer.pin(frame_id);
            return Ok(frame_id);
        }

        let frame_id = self.acquire_frame(&mut inner)?;
        let frame = &self.state.frames[frame_id.as_usize()];

        let buffer = match self.disk_scheduler.read_page_sync(page_id) {
            Ok(buffer) => buffer,
            Err(e) => {
                inner.free_list.push_front(frame_id);
                return Err(e);
            }
        };

        frame.install(buffer);
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();
        inner.page_table.insert(page_id, frame_id);

        Ok(frame_id)
    }

    /// Produces an empty, reset frame: from the free list if possible,
    /// otherwise by evicting the replacer's victim. A dirty victim is
    /// written back before its frame is handed out.
    fn acquire_frame(&self, inner: &mut PoolInner) -> Result<FrameId> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = match self.state.replacer.victim() {
            Some(frame_id) => frame_id,
            None => return Err(VellumError::BufferPoolFull),
        };
        let frame = &self.state.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            if let Err(e) = self
                .disk_scheduler
                .write_page_sync(old_page_id, frame.snapshot())
            {
                // Put the victim back so the pool stays consistent
                self.state.replacer.unpin(frame_id);
                return Err(e);
            }
        }

        inner.page_table.remove(&old_page_id);
        frame.reset_memory();
        Ok(frame_id)
    }
}
