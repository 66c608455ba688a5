//! Per-feed decoded frame history
//!
//! Written by exactly one producer (the receive loop for remote feeds, the
//! capture loop for the local camera) and read by the UI loop. The producer
//! pushes into a lock-free bounded queue that evicts its oldest entry when
//! full, so it never waits on a reader. The reader drains the queue and
//! keeps the newest frame it has seen; two readers racing on the same cache
//! means one of them reports no frame for that tick.

use crossbeam::queue::ArrayQueue;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::media::Frame;

/// Fixed-capacity FIFO of decoded frames
pub struct FrameCache {
    frames: ArrayQueue<Arc<Frame>>,
    /// Newest frame handed to a reader; only readers touch this
    shown: Mutex<Option<Arc<Frame>>>,
    pushed: AtomicU64,
    evicted: AtomicU64,
}

impl FrameCache {
    /// Create a cache holding at most `capacity` frames (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: ArrayQueue::new(capacity.max(1)),
            shown: Mutex::new(None),
            pushed: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    /// Append a frame, evicting the oldest when full
    pub fn push(&self, frame: Arc<Frame>) {
        if self.frames.force_push(frame).is_some() {
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        self.pushed.fetch_add(1, Ordering::Relaxed);
    }

    /// Most recent frame.
    ///
    /// Keeps returning the last frame until a newer one arrives. `None` when
    /// nothing has been pushed yet or another reader holds the cache.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        let mut shown = self.shown.try_lock()?;
        while let Some(frame) = self.frames.pop() {
            *shown = Some(frame);
        }
        shown.clone()
    }

    /// Take every queued frame, oldest first.
    ///
    /// The newest one also becomes what [`FrameCache::latest`] returns.
    pub fn drain(&self) -> Vec<Arc<Frame>> {
        let mut drained = Vec::with_capacity(self.frames.len());
        while let Some(frame) = self.frames.pop() {
            drained.push(frame);
        }
        if let Some(newest) = drained.last() {
            *self.shown.lock() = Some(newest.clone());
        }
        drained
    }

    /// Frames pushed but not yet taken by a reader
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.frames.capacity()
    }

    /// Drop every cached frame
    pub fn clear(&self) {
        while self.frames.pop().is_some() {}
        *self.shown.lock() = None;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            pushed: self.pushed.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }
}

/// Frame cache counters
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub pushed: u64,
    pub evicted: u64,
}

/// Thread-safe handle to a frame cache
pub type SharedFrameCache = Arc<FrameCache>;

/// Create a new shared frame cache
pub fn create_shared_cache(capacity: usize) -> SharedFrameCache {
    Arc::new(FrameCache::new(capacity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn frame(shade: u8) -> Arc<Frame> {
        Arc::new(Frame::new(1, 1, vec![shade; 3]).unwrap())
    }

    #[test]
    fn test_empty_cache() {
        let cache = FrameCache::new(3);
        assert!(cache.latest().is_none());
        assert!(cache.is_empty());
        assert!(cache.drain().is_empty());
    }

    #[test]
    fn test_fifo_eviction_keeps_most_recent() {
        let cache = FrameCache::new(3);
        for shade in 0..7u8 {
            cache.push(frame(shade));
        }

        assert_eq!(cache.len(), 3);
        let shades: Vec<u8> = cache.drain().iter().map(|f| f.data()[0]).collect();
        assert_eq!(shades, vec![4, 5, 6]);
        assert_eq!(cache.latest().unwrap().data()[0], 6);

        let stats = cache.stats();
        assert_eq!(stats.pushed, 7);
        assert_eq!(stats.evicted, 4);
    }

    #[test]
    fn test_latest_persists_until_newer_frame() {
        let cache = FrameCache::new(2);
        cache.push(frame(1));
        assert_eq!(cache.latest().unwrap().data()[0], 1);
        assert!(cache.is_empty());
        assert_eq!(cache.latest().unwrap().data()[0], 1);

        cache.push(frame(2));
        assert_eq!(cache.latest().unwrap().data()[0], 2);
    }

    #[test]
    fn test_clear() {
        let cache = FrameCache::new(2);
        cache.push(frame(1));
        assert!(cache.latest().is_some());
        cache.push(frame(2));
        cache.clear();
        assert!(cache.latest().is_none());
    }

    #[test]
    fn test_concurrent_push_and_latest() {
        let cache = create_shared_cache(4);
        let writer = {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..10_000u32 {
                    cache.push(frame((i % 251) as u8));
                }
            })
        };

        // Reader must never panic; a miss is acceptable
        for _ in 0..10_000 {
            if let Some(f) = cache.latest() {
                assert_eq!(f.dimensions(), (1, 1));
            }
        }
        writer.join().unwrap();
        assert!(cache.len() <= 4);
        assert_eq!(cache.latest().unwrap().data()[0], (9_999 % 251) as u8);
    }
}
