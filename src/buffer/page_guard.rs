use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::buffer_pool_manager::PoolState;
use super::Frame;

/// RAII guard for shared read access to a pinned page. Holds the frame's
/// page latch for its lifetime; dropping the guard releases the latch and
/// performs the pin's matching unpin (clean).
pub struct ReadPageGuard {
    page_id: PageId,
    state: Arc<PoolState>,
    /// Keeps the latched frame alive for the 'static guard below
    _frame: Arc<Frame>,
    data_guard: Option<RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>>,
}

impl ReadPageGuard {
    pub(crate) fn new(page_id: PageId, frame: Arc<Frame>, state: Arc<PoolState>) -> Self {
        let data_guard = frame.data.read();
        // Safety: the guard borrows from the frame, and the Arc stored in
        // `_frame` keeps that frame alive at least as long as this struct.
        let data_guard: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>> =
            unsafe { std::mem::transmute(data_guard) };

        Self {
            page_id,
            state,
            _frame: frame,
            data_guard: Some(data_guard),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().unwrap()[..]
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        // The page latch must release before the unpin takes the pool latch
        self.data_guard.take();
        self.state.unpin_page(self.page_id, false);
    }
}

/// RAII guard for exclusive write access to a pinned page. Mutable access
/// marks the guard dirty; the drop path ORs that into the frame's dirty
/// flag before unpinning.
pub struct WritePageGuard {
    page_id: PageId,
    state: Arc<PoolState>,
    _frame: Arc<Frame>,
    data_guard: Option<RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>>,
    is_dirty: bool,
}

impl WritePageGuard {
    pub(crate) fn new(page_id: PageId, frame: Arc<Frame>, state: Arc<PoolState>) -> Self {
        let data_guard = frame.data.write();
        // Safety: as for ReadPageGuard.
        let data_guard: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>> =
            unsafe { std::mem::transmute(data_guard) };

        Self {
            page_id,
            state,
            _frame: frame,
            data_guard: Some(data_guard),
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().unwrap()[..]
    }

    /// Mutable access to the page image. Marks the guard dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.is_dirty = true;
        &mut self.data_guard.as_mut().unwrap()[..]
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        self.data_guard.take();
        self.state.unpin_page(self.page_id, self.is_dirty);
    }
}
