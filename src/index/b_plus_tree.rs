use std::cmp::Ordering;
use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, RecordId, Result, VellumError, HEADER_PAGE_ID, INVALID_PAGE_ID};
use crate::storage::page::{HeaderPage, HeaderPageRef};

use super::comparator::KeyComparator;
use super::iterator::IndexIterator;
use super::key::IndexKey;
use super::node::{
    self, InternalNode, InternalNodeRef, LeafNode, LeafNodeRef, NodeHeader, INTERNAL_MAX_CAPACITY,
    LEAF_MAX_CAPACITY,
};
use super::transaction::Transaction;

/// A B+ tree index over fixed-size keys and record-id values, built
/// entirely on top of the buffer pool: every page access goes through a
/// pinned guard, and structural changes (splits, merges, redistribution)
/// operate on page images in place.
///
/// Keys are unique. Readers take `&self`; writers take `&mut self`, which
/// serializes structural changes without page-level latch crabbing.
pub struct BPlusTree<C: KeyComparator> {
    index_name: String,
    root_page_id: PageId,
    bpm: Arc<BufferPoolManager>,
    comparator: C,
    leaf_max_size: u16,
    internal_max_size: u16,
    /// Whether the header directory already holds a record for this index
    header_record_exists: bool,
}

impl<C: KeyComparator> BPlusTree<C> {
    /// Opens the named index, adopting its recorded root if the header
    /// directory already knows the name, and an empty tree otherwise.
    pub fn new(
        name: &str,
        bpm: Arc<BufferPoolManager>,
        comparator: C,
        leaf_max_size: u16,
        internal_max_size: u16,
    ) -> Result<Self> {
        assert!(
            (2..=LEAF_MAX_CAPACITY).contains(&leaf_max_size),
            "leaf max size out of range"
        );
        // Internal max below 4 would allow one-child internal nodes,
        // which the rebalancing paths do not support
        assert!(
            (4..=INTERNAL_MAX_CAPACITY).contains(&internal_max_size),
            "internal max size out of range"
        );

        let (root_page_id, header_record_exists) = {
            let guard = bpm.fetch_page_read(HEADER_PAGE_ID)?;
            let header = HeaderPageRef::new(guard.data());
            match header.get_root_id(name) {
                Some(root_page_id) => (root_page_id, true),
                None => (INVALID_PAGE_ID, false),
            }
        };

        Ok(Self {
            index_name: name.to_string(),
            root_page_id,
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
            header_record_exists,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.root_page_id == INVALID_PAGE_ID
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    /// Point lookup.
    pub fn get_value(&self, key: &IndexKey) -> Result<Option<RecordId>> {
        if self.is_empty() {
            return Ok(None);
        }

        let leaf_id = self.find_leaf_page(key, false)?;
        let guard = self.bpm.fetch_page_read(leaf_id)?;
        let leaf = LeafNodeRef::new(guard.data());
        Ok(leaf.lookup(key, &self.comparator))
    }

    /// Inserts a key/value pair. Returns false (and changes nothing) if
    /// the key is already present.
    pub fn insert(&mut self, key: &IndexKey, value: RecordId) -> Result<bool> {
        if self.is_empty() {
            self.start_new_tree(key, value)?;
            return Ok(true);
        }
        self.insert_into_leaf(key, value)
    }

    /// Removes a key. Absent keys are a no-op.
    pub fn remove(&mut self, key: &IndexKey) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        let leaf_id = self.find_leaf_page(key, false)?;
        let mut guard = self.bpm.fetch_page_write(leaf_id)?;

        let index = {
            let leaf = LeafNodeRef::new(guard.data());
            let index = leaf.key_index(key, &self.comparator);
            if index >= leaf.size() as usize
                || self
                    .comparator
                    .compare(leaf.key_at(index).as_bytes(), key.as_bytes())
                    != Ordering::Equal
            {
                // Not present: the leaf guard drops clean
                return Ok(());
            }
            index
        };

        {
            let mut leaf = LeafNode::new(guard.data_mut());
            leaf.remove_at(index);
        }
        let underflow = {
            let header = NodeHeader::new(guard.data());
            header.size() < header.min_size()
        };
        drop(guard);

        if underflow {
            let mut transaction = Transaction::new();
            if self.coalesce_or_redistribute(leaf_id, &mut transaction)? {
                transaction.add_deleted_page(leaf_id);
            }
            for &page_id in transaction.deleted_pages() {
                self.bpm.delete_page(page_id)?;
            }
        }
        Ok(())
    }

    /// Iterator positioned at the smallest key.
    pub fn iter(&self) -> Result<IndexIterator> {
        if self.is_empty() {
            return IndexIterator::new(Arc::clone(&self.bpm), None, 0);
        }
        let leaf_id = self.find_leaf_page(&IndexKey::from_u64(0), true)?;
        let guard = self.bpm.fetch_page_read(leaf_id)?;
        IndexIterator::new(Arc::clone(&self.bpm), Some(guard), 0)
    }

    /// Iterator positioned at the smallest key >= the given key.
    pub fn iter_from(&self, key: &IndexKey) -> Result<IndexIterator> {
        if self.is_empty() {
            return IndexIterator::new(Arc::clone(&self.bpm), None, 0);
        }
        let leaf_id = self.find_leaf_page(key, false)?;
        let guard = self.bpm.fetch_page_read(leaf_id)?;
        let index = LeafNodeRef::new(guard.data()).key_index(key, &self.comparator);
        IndexIterator::new(Arc::clone(&self.bpm), Some(guard), index)
    }

    /// Descends from the root to the leaf responsible for the key (or the
    /// leftmost leaf). Each internal page is released before its child is
    /// fetched.
    fn find_leaf_page(&self, key: &IndexKey, leftmost: bool) -> Result<PageId> {
        let mut page_id = self.root_page_id;

        loop {
            let guard = self.bpm.fetch_page_read(page_id)?;
            if NodeHeader::new(guard.data()).is_leaf() {
                return Ok(page_id);
            }

            let internal = InternalNodeRef::new(guard.data());
            page_id = if leftmost {
                internal.child_at(0)
            } else {
                internal.lookup(key, &self.comparator)
            };
        }
    }

    fn start_new_tree(&mut self, key: &IndexKey, value: RecordId) -> Result<()> {
        let mut guard = self.bpm.new_page()?;
        let page_id = guard.page_id();
        {
            let mut leaf = LeafNode::new(guard.data_mut());
            leaf.init(page_id, INVALID_PAGE_ID, self.leaf_max_size);
            leaf.insert(key, value, &self.comparator);
        }
        drop(guard);

        self.root_page_id = page_id;
        self.update_root_page_id()
    }

    fn insert_into_leaf(&mut self, key: &IndexKey, value: RecordId) -> Result<bool> {
        let leaf_id = self.find_leaf_page(key, false)?;
        let mut guard = self.bpm.fetch_page_write(leaf_id)?;

        {
            let leaf = LeafNodeRef::new(guard.data());
            let index = leaf.key_index(key, &self.comparator);
            if index < leaf.size() as usize
                && self
                    .comparator
                    .compare(leaf.key_at(index).as_bytes(), key.as_bytes())
                    == Ordering::Equal
            {
                // Duplicate: the leaf guard drops clean
                return Ok(false);
            }
        }

        let new_size = {
            let mut leaf = LeafNode::new(guard.data_mut());
            leaf.insert(key, value, &self.comparator)
        };
        if new_size < self.leaf_max_size {
            return Ok(true);
        }

        // Overflow: split off a new right sibling and splice the chain
        let mut new_guard = self.bpm.new_page()?;
        let new_leaf_id = new_guard.page_id();
        let parent_id = {
            let mut leaf = LeafNode::new(guard.data_mut());
            let mut new_leaf = LeafNode::new(new_guard.data_mut());
            new_leaf.init(new_leaf_id, leaf.parent_page_id(), self.leaf_max_size);
            leaf.move_half_to(&mut new_leaf);
            new_leaf.set_next_page_id(leaf.next_page_id());
            leaf.set_next_page_id(new_leaf_id);
            leaf.parent_page_id()
        };
        let separator = LeafNodeRef::new(new_guard.data()).key_at(0);

        drop(new_guard);
        drop(guard);

        self.insert_into_parent(leaf_id, parent_id, &separator, new_leaf_id)?;
        Ok(true)
    }

    /// Links a freshly split-off node into the parent of the node it was
    /// split from, splitting upward as long as parents overflow.
    fn insert_into_parent(
        &mut self,
        old_id: PageId,
        parent_id: PageId,
        separator: &IndexKey,
        new_id: PageId,
    ) -> Result<()> {
        if parent_id == INVALID_PAGE_ID {
            // The split node was the root: grow a new root above it
            let mut root_guard = self.bpm.new_page()?;
            let new_root_id = root_guard.page_id();
            {
                let mut root = InternalNode::new(root_guard.data_mut());
                root.init(new_root_id, INVALID_PAGE_ID, self.internal_max_size);
                root.populate_new_root(old_id, separator, new_id);
            }
            drop(root_guard);

            self.reparent(old_id, new_root_id)?;
            self.reparent(new_id, new_root_id)?;

            self.root_page_id = new_root_id;
            self.update_root_page_id()?;
            return Ok(());
        }

        let mut parent_guard = self.bpm.fetch_page_write(parent_id)?;
        let new_size = {
            let mut parent = InternalNode::new(parent_guard.data_mut());
            parent.insert_node_after(old_id, separator, new_id)
        };
        if new_size < self.internal_max_size {
            return Ok(());
        }

        // The parent overflowed in turn
        let mut new_guard = self.bpm.new_page()?;
        let new_internal_id = new_guard.page_id();
        let (grandparent_id, moved_children) = {
            let mut parent = InternalNode::new(parent_guard.data_mut());
            let mut new_node = InternalNode::new(new_guard.data_mut());
            let grandparent_id = parent.parent_page_id();
            new_node.init(new_internal_id, grandparent_id, self.internal_max_size);
            let moved_children = parent.move_half_to(&mut new_node);
            (grandparent_id, moved_children)
        };
        let promoted_key = InternalNodeRef::new(new_guard.data()).key_at(0);

        drop(new_guard);
        drop(parent_guard);

        for child in moved_children {
            self.reparent(child, new_internal_id)?;
        }

        self.insert_into_parent(parent_id, grandparent_id, &promoted_key, new_internal_id)
    }

    /// Restores the fill bound of an underflowing node by borrowing from
    /// a sibling that can spare an entry, or by merging with one that
    /// cannot. Returns true if the node itself was emptied and should be
    /// deleted by the caller.
    fn coalesce_or_redistribute(
        &mut self,
        node_id: PageId,
        transaction: &mut Transaction,
    ) -> Result<bool> {
        let (is_root, parent_id) = {
            let guard = self.bpm.fetch_page_read(node_id)?;
            let header = NodeHeader::new(guard.data());
            (header.is_root(), header.parent_page_id())
        };
        if is_root {
            return self.adjust_root(node_id);
        }

        let mut parent_guard = self.bpm.fetch_page_write(parent_id)?;
        let (node_index, parent_size) = {
            let parent = InternalNodeRef::new(parent_guard.data());
            let node_index = parent.value_index(node_id).ok_or_else(|| {
                VellumError::IndexCorrupted(format!(
                    "page {} missing from its parent {}",
                    node_id, parent_id
                ))
            })?;
            (node_index, parent.size() as usize)
        };

        // Borrow from the left sibling if it can spare an entry
        if node_index > 0 {
            let left_id = InternalNodeRef::new(parent_guard.data()).child_at(node_index - 1);
            let mut left_guard = self.bpm.fetch_page_write(left_id)?;
            let (left_size, left_min, left_is_leaf) = {
                let header = NodeHeader::new(left_guard.data());
                (header.size(), header.min_size(), header.is_leaf())
            };

            if left_size > left_min {
                let mut node_guard = self.bpm.fetch_page_write(node_id)?;
                if left_is_leaf {
                    {
                        let mut left = LeafNode::new(left_guard.data_mut());
                        let mut leaf = LeafNode::new(node_guard.data_mut());
                        left.move_last_to_front_of(&mut leaf);
                    }
                    let separator = LeafNodeRef::new(node_guard.data()).key_at(0);
                    InternalNode::new(parent_guard.data_mut())
                        .set_key_at(node_index, &separator);
                } else {
                    let middle_key =
                        InternalNodeRef::new(parent_guard.data()).key_at(node_index);
                    let pushed_up =
                        InternalNodeRef::new(left_guard.data()).key_at(left_size as usize - 1);
                    let moved_child = {
                        let mut left = InternalNode::new(left_guard.data_mut());
                        let mut internal = InternalNode::new(node_guard.data_mut());
                        left.move_last_to_front_of(&mut internal, &middle_key)
                    };
                    InternalNode::new(parent_guard.data_mut())
                        .set_key_at(node_index, &pushed_up);

                    drop(node_guard);
                    drop(left_guard);
                    drop(parent_guard);
                    self.reparent(moved_child, node_id)?;
                }
                return Ok(false);
            }
        }

        // Borrow from the right sibling if it can spare an entry
        if node_index + 1 < parent_size {
            let right_id = InternalNodeRef::new(parent_guard.data()).child_at(node_index + 1);
            let mut right_guard = self.bpm.fetch_page_write(right_id)?;
            let (right_size, right_min, right_is_leaf) = {
                let header = NodeHeader::new(right_guard.data());
                (header.size(), header.min_size(), header.is_leaf())
            };

            if right_size > right_min {
                let mut node_guard = self.bpm.fetch_page_write(node_id)?;
                if right_is_leaf {
                    {
                        let mut right = LeafNode::new(right_guard.data_mut());
                        let mut leaf = LeafNode::new(node_guard.data_mut());
                        right.move_first_to_end_of(&mut leaf);
                    }
                    let separator = LeafNodeRef::new(right_guard.data()).key_at(0);
                    InternalNode::new(parent_guard.data_mut())
                        .set_key_at(node_index + 1, &separator);
                } else {
                    let middle_key =
                        InternalNodeRef::new(parent_guard.data()).key_at(node_index + 1);
                    let pushed_up = InternalNodeRef::new(right_guard.data()).key_at(1);
                    let moved_child = {
                        let mut right = InternalNode::new(right_guard.data_mut());
                        let mut internal = InternalNode::new(node_guard.data_mut());
                        right.move_first_to_end_of(&mut internal, &middle_key)
                    };
                    InternalNode::new(parent_guard.data_mut())
                        .set_key_at(node_index + 1, &pushed_up);

                    drop(node_guard);
                    drop(right_guard);
                    drop(parent_guard);
                    self.reparent(moved_child, node_id)?;
                }
                return Ok(false);
            }
        }

        // No sibling can spare an entry: merge. The left sibling is the
        // survivor when one exists, otherwise the right sibling merges
        // into this node.
        let (survivor_id, removed_id, removed_index, node_is_removed) = if node_index > 0 {
            let left_id = InternalNodeRef::new(parent_guard.data()).child_at(node_index - 1);
            (left_id, node_id, node_index, true)
        } else {
            let right_id = InternalNodeRef::new(parent_guard.data()).child_at(node_index + 1);
            (node_id, right_id, node_index + 1, false)
        };

        let mut survivor_guard = self.bpm.fetch_page_write(survivor_id)?;
        let mut removed_guard = self.bpm.fetch_page_write(removed_id)?;
        let removed_is_leaf = NodeHeader::new(removed_guard.data()).is_leaf();

        let moved_children = if removed_is_leaf {
            let mut survivor = LeafNode::new(survivor_guard.data_mut());
            let mut removed = LeafNode::new(removed_guard.data_mut());
            removed.move_all_to(&mut survivor);
            Vec::new()
        } else {
            let middle_key = InternalNodeRef::new(parent_guard.data()).key_at(removed_index);
            let mut survivor = InternalNode::new(survivor_guard.data_mut());
            let mut removed = InternalNode::new(removed_guard.data_mut());
            removed.move_all_to(&mut survivor, &middle_key)
        };

        {
            let mut parent = InternalNode::new(parent_guard.data_mut());
            parent.remove(removed_index);
        }
        let (parent_size_after, parent_min) = {
            let header = NodeHeader::new(parent_guard.data());
            (header.size(), header.min_size())
        };

        if !node_is_removed {
            transaction.add_deleted_page(removed_id);
        }

        drop(removed_guard);
        drop(survivor_guard);
        drop(parent_guard);

        for child in moved_children {
            self.reparent(child, survivor_id)?;
        }

        if parent_size_after < parent_min {
            if self.coalesce_or_redistribute(parent_id, transaction)? {
                transaction.add_deleted_page(parent_id);
            }
        }

        Ok(node_is_removed)
    }

    /// Handles underflow at the root. An internal root down to one child
    /// hands the root role to that child; an emptied leaf root clears the
    /// tree. Returns true if the old root page should be deleted.
    fn adjust_root(&mut self, root_id: PageId) -> Result<bool> {
        let mut guard = self.bpm.fetch_page_write(root_id)?;
        let (is_leaf, size) = {
            let header = NodeHeader::new(guard.data());
            (header.is_leaf(), header.size())
        };

        if !is_leaf && size == 1 {
            let child_id = InternalNode::new(guard.data_mut()).remove_and_return_only_child();
            drop(guard);

            self.reparent(child_id, INVALID_PAGE_ID)?;
            self.root_page_id = child_id;
            self.update_root_page_id()?;
            return Ok(true);
        }

        if is_leaf && size == 0 {
            drop(guard);

            self.root_page_id = INVALID_PAGE_ID;
            self.update_root_page_id()?;
            return Ok(true);
        }

        Ok(false)
    }

    fn reparent(&self, child_id: PageId, parent_id: PageId) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(child_id)?;
        node::write_parent_page_id(guard.data_mut(), parent_id);
        Ok(())
    }

    /// Persists the current root page id in the header directory: an
    /// insert on first root creation, an update on every change after.
    fn update_root_page_id(&mut self) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(HEADER_PAGE_ID)?;
        let mut header = HeaderPage::new(guard.data_mut());

        if self.header_record_exists {
            header.update_record(&self.index_name, self.root_page_id);
        } else {
            header.insert_record(&self.index_name, self.root_page_id)?;
            self.header_record_exists = true;
        }
        Ok(())
    }
}
