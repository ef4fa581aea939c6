pub mod config;
pub mod error;
pub mod types;

pub use config::{
    DEFAULT_BUFFER_POOL_SIZE, HEADER_PAGE_ID, INVALID_FRAME_ID, INVALID_PAGE_ID, KEY_SIZE,
    PAGE_SIZE,
};
pub use error::{Result, VellumError};
pub use types::{FrameId, PageId, RecordId, SlotId};
