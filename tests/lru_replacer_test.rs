//! Integration tests for the LRU replacer

use vellum::buffer::LruReplacer;
use vellum::common::FrameId;

#[test]
fn test_lru_replacer_lifecycle() {
    let replacer = LruReplacer::new(7);

    // Unpin frames 1..=6
    for i in 1..=6 {
        replacer.unpin(FrameId::new(i));
    }
    assert_eq!(replacer.size(), 6);

    // Oldest unpins are the first victims
    assert_eq!(replacer.victim(), Some(FrameId::new(1)));
    assert_eq!(replacer.victim(), Some(FrameId::new(2)));
    assert_eq!(replacer.victim(), Some(FrameId::new(3)));
    assert_eq!(replacer.size(), 3);

    // Pin removes frames from the candidate set
    replacer.pin(FrameId::new(3)); // already gone, no-op
    replacer.pin(FrameId::new(4));
    assert_eq!(replacer.size(), 2);

    // Unpin again makes frame 4 the most recently unpinned
    replacer.unpin(FrameId::new(4));
    assert_eq!(replacer.size(), 3);

    assert_eq!(replacer.victim(), Some(FrameId::new(5)));
    assert_eq!(replacer.victim(), Some(FrameId::new(6)));
    assert_eq!(replacer.victim(), Some(FrameId::new(4)));
    assert_eq!(replacer.victim(), None);
    assert_eq!(replacer.size(), 0);
}

#[test]
fn test_lru_replacer_refresh_on_repeat_unpin() {
    let replacer = LruReplacer::new(4);

    replacer.unpin(FrameId::new(0));
    replacer.unpin(FrameId::new(1));
    replacer.unpin(FrameId::new(2));

    // Repeated unpin refreshes frame 0 to most recently unpinned;
    // the size does not change
    replacer.unpin(FrameId::new(0));
    assert_eq!(replacer.size(), 3);

    assert_eq!(replacer.victim(), Some(FrameId::new(1)));
    assert_eq!(replacer.victim(), Some(FrameId::new(2)));
    assert_eq!(replacer.victim(), Some(FrameId::new(0)));
}

#[test]
fn test_lru_replacer_empty() {
    let replacer = LruReplacer::new(3);
    assert_eq!(replacer.victim(), None);

    replacer.unpin(FrameId::new(1));
    assert_eq!(replacer.victim(), Some(FrameId::new(1)));
    assert_eq!(replacer.victim(), None);
}

#[test]
fn test_lru_replacer_ignores_out_of_range_frames() {
    let replacer = LruReplacer::new(2);

    replacer.unpin(FrameId::new(0));
    replacer.unpin(FrameId::new(1));
    replacer.unpin(FrameId::new(2)); // beyond capacity, ignored

    assert_eq!(replacer.size(), 2);
    assert_eq!(replacer.victim(), Some(FrameId::new(0)));
    assert_eq!(replacer.victim(), Some(FrameId::new(1)));
    assert_eq!(replacer.victim(), None);
}
