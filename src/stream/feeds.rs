//! Shared per-peer frame caches

use std::collections::HashMap;
use std::sync::Arc;

use crate::media::{create_shared_cache, Frame, SharedFrameCache};
use crate::peers::PeerId;

/// Fixed set of per-peer caches, created once per session.
///
/// The map itself never changes after construction, so it is shared
/// without synchronisation; each cache handles its own concurrency.
#[derive(Clone)]
pub struct FeedCaches {
    caches: Arc<HashMap<PeerId, SharedFrameCache>>,
}

impl FeedCaches {
    pub fn new<'a>(peers: impl IntoIterator<Item = &'a PeerId>, depth: usize) -> Self {
        let caches = peers
            .into_iter()
            .map(|id| (id.clone(), create_shared_cache(depth)))
            .collect();
        Self {
            caches: Arc::new(caches),
        }
    }

    pub fn get(&self, peer: &PeerId) -> Option<&SharedFrameCache> {
        self.caches.get(peer)
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.caches.contains_key(peer)
    }

    /// Most recent frame from `peer`; `None` for unknown peers, caches that
    /// never received a frame, or a concurrent read
    pub fn latest(&self, peer: &PeerId) -> Option<Arc<Frame>> {
        self.caches.get(peer)?.latest()
    }

    /// Drop all cached frames (session teardown)
    pub fn clear(&self) {
        for cache in self.caches.values() {
            cache.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_peer_has_no_frame() {
        let peers = [PeerId::new("a")];
        let feeds = FeedCaches::new(&peers, 2);
        assert!(feeds.contains(&PeerId::new("a")));
        assert!(feeds.latest(&PeerId::new("a")).is_none());
        assert!(feeds.latest(&PeerId::new("zz")).is_none());
    }

    #[test]
    fn test_clear() {
        let peers = [PeerId::new("a")];
        let feeds = FeedCaches::new(&peers, 2);
        feeds
            .get(&PeerId::new("a"))
            .unwrap()
            .push(Arc::new(Frame::black(1, 1)));
        assert!(feeds.latest(&PeerId::new("a")).is_some());
        feeds.clear();
        assert!(feeds.latest(&PeerId::new("a")).is_none());
    }
}
