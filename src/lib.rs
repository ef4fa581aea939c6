//! Vellum - a disk-oriented B+ tree storage engine
//!
//! This crate provides the storage core of a disk-oriented database:
//! pages live in a single file on disk and are cached in a fixed number
//! of in-memory frames, with an ordered index built on top.
//!
//! # Architecture
//!
//! The system is organized into three layers:
//!
//! - **Storage Layer** (`storage`): Disk I/O and special page formats
//!   - `DiskManager`: Reads, writes, allocates and deallocates pages
//!   - `DiskScheduler`: Background worker thread for disk requests
//!   - `HeaderPage`: Page 0 directory mapping index names to root pages
//!
//! - **Buffer Pool** (`buffer`): Memory management for database pages
//!   - `BufferPoolManager`: Caches pages in frames, evicting by LRU
//!   - `LruReplacer`: Picks the least recently unpinned frame as victim
//!   - `ReadPageGuard`/`WritePageGuard`: RAII pin handles over frames
//!
//! - **Index** (`index`): The B+ tree
//!   - `BPlusTree`: Unique-key ordered index with splits and merges
//!   - `IndexIterator`: Forward scan along the leaf chain
//!   - `KeyComparator`: Pluggable total order over fixed-size keys
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vellum::buffer::BufferPoolManager;
//! use vellum::common::{PageId, RecordId, SlotId};
//! use vellum::index::{BPlusTree, IndexKey, IntegerComparator};
//! use vellum::storage::disk::DiskManager;
//!
//! let disk_manager = Arc::new(DiskManager::new("index.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(50, disk_manager));
//!
//! let mut tree = BPlusTree::new("orders_pk", bpm, IntegerComparator, 64, 64).unwrap();
//!
//! let key = IndexKey::from_u64(42);
//! tree.insert(&key, RecordId::new(PageId::new(7), SlotId::new(0))).unwrap();
//! assert!(tree.get_value(&key).unwrap().is_some());
//!
//! for entry in tree.iter().unwrap() {
//!     let (key, value) = entry.unwrap();
//!     println!("{:?} -> {}", key, value);
//! }
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{FrameId, PageId, RecordId, Result, SlotId, VellumError};
