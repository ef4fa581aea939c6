use std::fmt;

use crate::common::KEY_SIZE;

/// A fixed-size opaque key record. The tree never interprets the bytes;
/// ordering comes entirely from the comparator.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexKey([u8; KEY_SIZE]);

impl IndexKey {
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.try_into().expect("key record has a fixed width"))
    }

    pub fn from_u64(value: u64) -> Self {
        Self(value.to_le_bytes())
    }

    pub fn to_u64(&self) -> u64 {
        u64::from_le_bytes(self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndexKey({})", self.to_u64())
    }
}
