use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::common::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// One slot of the buffer pool. Holds the page buffer plus the metadata
/// the pool needs to manage it: the resident page id, the pin count and
/// the dirty flag. The buffer's RwLock doubles as the page latch that the
/// read/write guards hold.
pub struct Frame {
    /// Index of this frame in the pool array
    frame_id: FrameId,
    /// Raw id of the resident page (INVALID_PAGE_ID when empty)
    page_id: AtomicU32,
    /// Number of outstanding pins
    pin_count: AtomicU32,
    /// Whether the page has been modified since it was last written to disk
    is_dirty: AtomicBool,
    /// The page buffer (pub(crate) for guard construction)
    pub(crate) data: RwLock<Box<[u8; PAGE_SIZE]>>,
}

impl Frame {
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: AtomicU32::new(INVALID_PAGE_ID.as_u32()),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
            data: RwLock::new(Box::new([0u8; PAGE_SIZE])),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(self.page_id.load(Ordering::Acquire))
    }

    pub fn set_page_id(&self, page_id: PageId) {
        self.page_id.store(page_id.as_u32(), Ordering::Release);
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Increments the pin count and returns the new value.
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements the pin count and returns the new value, or None if the
    /// count was already zero.
    pub fn unpin(&self) -> Option<u32> {
        loop {
            let current = self.pin_count.load(Ordering::Acquire);
            if current == 0 {
                return None;
            }
            if self
                .pin_count
                .compare_exchange(current, current - 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(current - 1);
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.is_dirty.store(dirty, Ordering::Release);
    }

    /// Copies the page buffer out into an owned box, for write-back.
    pub fn snapshot(&self) -> Box<[u8; PAGE_SIZE]> {
        let guard = self.data.read();
        let mut copy = Box::new([0u8; PAGE_SIZE]);
        copy.copy_from_slice(&**guard);
        copy
    }

    /// Moves a freshly read page image into the buffer.
    pub fn install(&self, data: Box<[u8; PAGE_SIZE]>) {
        *self.data.write() = data;
    }

    /// Zeroes the buffer and clears all metadata, returning the frame to
    /// its just-constructed state.
    pub fn reset_memory(&self) {
        self.page_id
            .store(INVALID_PAGE_ID.as_u32(), Ordering::Release);
        self.pin_count.store(0, Ordering::Release);
        self.is_dirty.store(false, Ordering::Release);
        self.data.write().fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_new() {
        let frame = Frame::new(FrameId::new(3));
        assert_eq!(frame.frame_id(), FrameId::new(3));
        assert_eq!(frame.page_id(), INVALID_PAGE_ID);
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_frame_pin_unpin() {
        let frame = Frame::new(FrameId::new(0));

        assert_eq!(frame.pin(), 1);
        assert_eq!(frame.pin(), 2);
        assert_eq!(frame.pin_count(), 2);

        assert_eq!(frame.unpin(), Some(1));
        assert_eq!(frame.unpin(), Some(0));
        assert_eq!(frame.unpin(), None);
    }

    #[test]
    fn test_frame_snapshot_and_install() {
        let frame = Frame::new(FrameId::new(0));

        let mut image = Box::new([0u8; PAGE_SIZE]);
        image[0] = 42;
        image[PAGE_SIZE - 1] = 7;
        frame.install(image);

        let copy = frame.snapshot();
        assert_eq!(copy[0], 42);
        assert_eq!(copy[PAGE_SIZE - 1], 7);
    }

    #[test]
    fn test_frame_reset_memory() {
        let frame = Frame::new(FrameId::new(0));

        frame.set_page_id(PageId::new(5));
        frame.pin();
        frame.set_dirty(true);
        frame.data.write()[10] = 99;

        frame.reset_memory();

        assert_eq!(frame.page_id(), INVALID_PAGE_ID);
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
        assert_eq!(frame.snapshot()[10], 0);
    }
}
