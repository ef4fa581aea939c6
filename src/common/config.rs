/// Size of a page in bytes (4 KiB)
pub const PAGE_SIZE: usize = 4096;

/// Invalid page ID constant
pub const INVALID_PAGE_ID: PageId = PageId(u32::MAX);

/// Invalid frame ID constant
pub const INVALID_FRAME_ID: FrameId = FrameId(u32::MAX);

/// Page that holds the index-name -> root-page-id directory
pub const HEADER_PAGE_ID: PageId = PageId(0);

/// Number of bytes in an index key record
pub const KEY_SIZE: usize = 8;

/// Default buffer pool size (number of frames)
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 50;

use super::types::{FrameId, PageId};
