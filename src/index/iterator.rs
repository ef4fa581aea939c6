use std::sync::Arc;

use crate::buffer::{BufferPoolManager, ReadPageGuard};
use crate::common::{RecordId, Result, INVALID_PAGE_ID};

use super::key::IndexKey;
use super::node::LeafNodeRef;

/// Forward scan over the leaf chain. Holds a pinned read guard on the
/// current leaf and a slot index within it; advancing past the last slot
/// releases the leaf and follows its next pointer. Dropping the iterator
/// releases whatever leaf it still holds.
pub struct IndexIterator {
    bpm: Arc<BufferPoolManager>,
    guard: Option<ReadPageGuard>,
    index: usize,
}

impl IndexIterator {
    pub(crate) fn new(
        bpm: Arc<BufferPoolManager>,
        guard: Option<ReadPageGuard>,
        index: usize,
    ) -> Result<Self> {
        let mut iterator = Self { bpm, guard, index };
        // A position at or past the leaf's size (empty leaf, or a start
        // key above every key in it) normalizes onto the next leaf.
        iterator.skip_past_end()?;
        Ok(iterator)
    }

    pub fn is_end(&self) -> bool {
        self.guard.is_none()
    }

    /// The (key, value) pair under the cursor, or None at the end.
    pub fn entry(&self) -> Option<(IndexKey, RecordId)> {
        let guard = self.guard.as_ref()?;
        let leaf = LeafNodeRef::new(guard.data());
        Some((leaf.key_at(self.index), leaf.value_at(self.index)))
    }

    /// Moves the cursor one slot forward, hopping to the next leaf (and
    /// unpinning the current one first) when the slots run out.
    pub fn advance(&mut self) -> Result<()> {
        let guard = match &self.guard {
            Some(guard) => guard,
            None => return Ok(()),
        };

        let leaf = LeafNodeRef::new(guard.data());
        if self.index + 1 < leaf.size() as usize {
            self.index += 1;
            return Ok(());
        }

        self.index = leaf.size() as usize;
        self.skip_past_end()
    }

    fn skip_past_end(&mut self) -> Result<()> {
        loop {
            let guard = match &self.guard {
                Some(guard) => guard,
                None => return Ok(()),
            };
            let leaf = LeafNodeRef::new(guard.data());
            if self.index < leaf.size() as usize {
                return Ok(());
            }

            let next = leaf.next_page_id();
            self.guard = None; // release the exhausted leaf first
            self.index = 0;
            if next == INVALID_PAGE_ID {
                return Ok(());
            }
            self.guard = Some(self.bpm.fetch_page_read(next)?);
        }
    }
}

impl Iterator for IndexIterator {
    type Item = Result<(IndexKey, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.entry()?;
        match self.advance() {
            Ok(()) => Some(Ok(item)),
            Err(e) => {
                self.guard = None;
                Some(Err(e))
            }
        }
    }
}
