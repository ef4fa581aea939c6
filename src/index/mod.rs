pub mod b_plus_tree;
pub mod comparator;
pub mod iterator;
pub mod key;
pub mod node;
pub mod transaction;

pub use b_plus_tree::BPlusTree;
pub use comparator::{BytewiseComparator, IntegerComparator, KeyComparator};
pub use iterator::IndexIterator;
pub use key::IndexKey;
pub use transaction::Transaction;
