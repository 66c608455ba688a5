//! Frame reassembly from UDP chunks
//!
//! Chunks of one frame may arrive in any order, more than once, or not at
//! all. Each in-flight frame is tracked by a record keyed on
//! `(source peer, frame_id)`:
//!
//! ```text
//! first chunk ──▶ record { slots[total], remaining, deadline }
//!                    │ each new chunk id fills a slot, remaining -= 1
//!                    ├─ remaining == 0 ──▶ concat ─▶ decode ─▶ peer cache
//!                    └─ deadline passed ──▶ swept
//! ```
//!
//! Every record leaves the table exactly once: on completion or on expiry.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::codec::FrameCodec;
use crate::media::Frame;
use crate::peers::PeerId;
use crate::protocol::ChunkHeader;
use crate::stream::FeedCaches;

/// Why a datagram was dropped without touching reassembly state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    UnknownPeer,
    TooShort,
    /// `total_chunks` zero or above the ceiling, or `chunk_id` out of range
    BadHeader,
    /// `total_chunks` disagrees with the record already open for this frame
    Inconsistent,
}

/// Result of feeding one datagram to the reassembler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Rejected(RejectReason),
    /// Chunk stored, frame still incomplete
    Pending,
    /// Chunk already seen for this frame
    Duplicate,
    /// Last chunk arrived and the frame was decoded into the peer cache
    Completed,
    /// Last chunk arrived but the payload did not decode; frame dropped
    DecodeFailed,
}

struct ReassemblyRecord {
    chunks: Vec<Option<Bytes>>,
    remaining: usize,
    deadline: Instant,
}

impl ReassemblyRecord {
    fn new(total: u16, deadline: Instant) -> Self {
        Self {
            chunks: vec![None; total as usize],
            remaining: total as usize,
            deadline,
        }
    }

    fn assemble(self) -> Vec<u8> {
        let len = self.chunks.iter().flatten().map(|c| c.len()).sum();
        let mut out = Vec::with_capacity(len);
        for chunk in self.chunks.into_iter().flatten() {
            out.extend_from_slice(&chunk);
        }
        out
    }
}

/// Reassembly counters, readable from any thread
#[derive(Debug, Default)]
pub struct ReassemblyStats {
    pub datagrams: AtomicU64,
    pub rejected: AtomicU64,
    pub duplicates: AtomicU64,
    pub frames_completed: AtomicU64,
    pub decode_failures: AtomicU64,
    pub frames_expired: AtomicU64,
}

impl ReassemblyStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Rebuilds frames from chunks and publishes them to per-peer caches
pub struct Reassembler {
    feeds: FeedCaches,
    records: HashMap<(PeerId, u16), ReassemblyRecord>,
    codec: Arc<dyn FrameCodec>,
    timeout: Duration,
    stats: Arc<ReassemblyStats>,
}

impl Reassembler {
    /// `timeout` is how long an incomplete frame may wait for its chunks
    pub fn new(feeds: FeedCaches, codec: Arc<dyn FrameCodec>, timeout: Duration) -> Self {
        Self {
            feeds,
            records: HashMap::new(),
            codec,
            timeout,
            stats: Arc::new(ReassemblyStats::default()),
        }
    }

    /// Feed one datagram received from `source`
    pub fn process_datagram(&mut self, data: &[u8], source: &PeerId) -> ProcessOutcome {
        self.process_datagram_at(data, source, Instant::now())
    }

    /// Same as [`process_datagram`](Self::process_datagram) with an explicit clock
    pub fn process_datagram_at(&mut self, data: &[u8], source: &PeerId, now: Instant) -> ProcessOutcome {
        ReassemblyStats::bump(&self.stats.datagrams);
        let outcome = self.insert(data, source, now);
        self.expire(now);

        match outcome {
            ProcessOutcome::Rejected(reason) => {
                ReassemblyStats::bump(&self.stats.rejected);
                tracing::trace!("Dropped datagram from {}: {:?}", source, reason);
            }
            ProcessOutcome::Duplicate => ReassemblyStats::bump(&self.stats.duplicates),
            ProcessOutcome::Completed => ReassemblyStats::bump(&self.stats.frames_completed),
            ProcessOutcome::DecodeFailed => {
                ReassemblyStats::bump(&self.stats.decode_failures);
                tracing::debug!("Frame from {} failed to decode, dropped", source);
            }
            ProcessOutcome::Pending => {}
        }
        outcome
    }

    fn insert(&mut self, data: &[u8], source: &PeerId, now: Instant) -> ProcessOutcome {
        if !self.feeds.contains(source) {
            return ProcessOutcome::Rejected(RejectReason::UnknownPeer);
        }
        let Some((header, payload)) = ChunkHeader::parse(data) else {
            return ProcessOutcome::Rejected(RejectReason::TooShort);
        };
        if !header.is_valid() {
            return ProcessOutcome::Rejected(RejectReason::BadHeader);
        }

        let key = (source.clone(), header.frame_id);
        let deadline = now + self.timeout;
        let record = self
            .records
            .entry(key.clone())
            .or_insert_with(|| ReassemblyRecord::new(header.total_chunks, deadline));

        if record.chunks.len() != header.total_chunks as usize {
            return ProcessOutcome::Rejected(RejectReason::Inconsistent);
        }

        let slot = &mut record.chunks[header.chunk_id as usize];
        if slot.is_some() {
            return ProcessOutcome::Duplicate;
        }
        *slot = Some(Bytes::copy_from_slice(payload));
        record.remaining -= 1;

        if record.remaining > 0 {
            return ProcessOutcome::Pending;
        }

        let Some(record) = self.records.remove(&key) else {
            return ProcessOutcome::Pending;
        };
        let encoded = record.assemble();
        match self.codec.decode(&encoded) {
            Some(frame) => {
                if let Some(cache) = self.feeds.get(source) {
                    cache.push(Arc::new(frame));
                }
                ProcessOutcome::Completed
            }
            None => ProcessOutcome::DecodeFailed,
        }
    }

    /// Drop every record whose deadline has passed
    fn expire(&mut self, now: Instant) {
        let before = self.records.len();
        self.records.retain(|_, record| record.deadline >= now);
        let expired = before - self.records.len();
        if expired > 0 {
            self.stats.frames_expired.fetch_add(expired as u64, Ordering::Relaxed);
            tracing::trace!("Expired {} incomplete frames", expired);
        }
    }

    /// Most recent decoded frame from `peer`
    pub fn latest(&self, peer: &PeerId) -> Option<Arc<Frame>> {
        self.feeds.latest(peer)
    }

    /// Number of frames currently being reassembled
    pub fn pending_frames(&self) -> usize {
        self.records.len()
    }

    pub fn feeds(&self) -> &FeedCaches {
        &self.feeds
    }

    pub fn stats(&self) -> Arc<ReassemblyStats> {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{build_datagram, chunk_count, payload_size, MAX_CHUNKS};
    use proptest::prelude::*;

    /// Codec that treats the payload bytes as the frame (1 pixel per 3 bytes)
    struct PassthroughCodec;

    impl FrameCodec for PassthroughCodec {
        fn encode(&self, frame: &Frame, _quality: u8) -> Result<Bytes, crate::error::CodecError> {
            Ok(Bytes::copy_from_slice(frame.data()))
        }

        fn decode(&self, data: &[u8]) -> Option<Frame> {
            if data.is_empty() || data.len() % 3 != 0 {
                return None;
            }
            Frame::new((data.len() / 3) as u32, 1, data.to_vec()).ok()
        }
    }

    fn peer(id: &str) -> PeerId {
        PeerId::new(id)
    }

    fn reassembler(depth: usize) -> Reassembler {
        let peers = [peer("p1"), peer("p2")];
        Reassembler::new(
            FeedCaches::new(&peers, depth),
            Arc::new(PassthroughCodec),
            Duration::from_secs(1),
        )
    }

    fn fragment(frame_id: u16, bytes: &[u8], max_datagram: usize) -> Vec<Vec<u8>> {
        let payload = payload_size(max_datagram);
        let total = chunk_count(bytes.len(), payload) as u16;
        bytes
            .chunks(payload)
            .enumerate()
            .map(|(i, chunk)| build_datagram(ChunkHeader::new(frame_id, i as u16, total), chunk).to_vec())
            .collect()
    }

    /// Codec that records every payload it is asked to decode
    struct RecordingCodec {
        decoded: Arc<parking_lot::Mutex<Vec<Vec<u8>>>>,
    }

    impl FrameCodec for RecordingCodec {
        fn encode(&self, frame: &Frame, _quality: u8) -> Result<Bytes, crate::error::CodecError> {
            Ok(Bytes::copy_from_slice(frame.data()))
        }

        fn decode(&self, data: &[u8]) -> Option<Frame> {
            self.decoded.lock().push(data.to_vec());
            Some(Frame::black(1, 1))
        }
    }

    #[test]
    fn test_reverse_order_reassembly() {
        let original: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let datagrams = fragment(7, &original, 1300);
        assert_eq!(datagrams.len(), 8);

        let decoded = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let peers = [peer("p1")];
        let mut r = Reassembler::new(
            FeedCaches::new(&peers, 5),
            Arc::new(RecordingCodec {
                decoded: decoded.clone(),
            }),
            Duration::from_secs(1),
        );

        let now = Instant::now();
        let outcomes: Vec<ProcessOutcome> = datagrams
            .iter()
            .rev()
            .map(|d| r.process_datagram_at(d, &peer("p1"), now))
            .collect();

        assert!(outcomes[..7].iter().all(|o| *o == ProcessOutcome::Pending));
        assert_eq!(outcomes[7], ProcessOutcome::Completed);
        assert_eq!(decoded.lock().as_slice(), &[original]);
        assert!(r.latest(&peer("p1")).is_some());
        assert_eq!(r.pending_frames(), 0);
    }

    #[test]
    fn test_duplicates_are_noops() {
        let mut r = reassembler(5);
        let datagrams = fragment(1, &[9u8; 30], 16); // 10-byte payloads, 3 chunks
        assert_eq!(datagrams.len(), 3);
        let now = Instant::now();

        assert_eq!(r.process_datagram_at(&datagrams[0], &peer("p1"), now), ProcessOutcome::Pending);
        assert_eq!(r.process_datagram_at(&datagrams[0], &peer("p1"), now), ProcessOutcome::Duplicate);
        assert_eq!(r.process_datagram_at(&datagrams[1], &peer("p1"), now), ProcessOutcome::Pending);
        assert_eq!(r.process_datagram_at(&datagrams[2], &peer("p1"), now), ProcessOutcome::Completed);
        // A late duplicate opens a fresh record rather than completing twice
        assert_eq!(r.process_datagram_at(&datagrams[2], &peer("p1"), now), ProcessOutcome::Pending);
        assert_eq!(r.stats().frames_completed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_malformed_headers_leave_state_unchanged() {
        let mut r = reassembler(5);
        let now = Instant::now();

        let bad = [
            build_datagram(ChunkHeader::new(1, 0, 0), b"abc"),
            build_datagram(ChunkHeader::new(1, 5, 5), b"abc"),
            build_datagram(ChunkHeader::new(1, 0, MAX_CHUNKS + 1), b"abc"),
            build_datagram(ChunkHeader::new(1, u16::MAX, u16::MAX), b"abc"),
        ];
        for d in &bad {
            assert_eq!(
                r.process_datagram_at(d, &peer("p1"), now),
                ProcessOutcome::Rejected(RejectReason::BadHeader)
            );
            assert_eq!(r.pending_frames(), 0);
        }

        assert_eq!(
            r.process_datagram_at(&[0, 1, 0], &peer("p1"), now),
            ProcessOutcome::Rejected(RejectReason::TooShort)
        );
        assert_eq!(
            r.process_datagram_at(&bad[0], &peer("stranger"), now),
            ProcessOutcome::Rejected(RejectReason::UnknownPeer)
        );
        assert_eq!(r.pending_frames(), 0);
        assert_eq!(r.stats().rejected.load(Ordering::Relaxed), 6);
    }

    #[test]
    fn test_inconsistent_total_rejected() {
        let mut r = reassembler(5);
        let now = Instant::now();
        r.process_datagram_at(&build_datagram(ChunkHeader::new(3, 0, 4), b"abc"), &peer("p1"), now);
        assert_eq!(
            r.process_datagram_at(&build_datagram(ChunkHeader::new(3, 5, 8), b"abc"), &peer("p1"), now),
            ProcessOutcome::Rejected(RejectReason::Inconsistent)
        );
        assert_eq!(r.pending_frames(), 1);
    }

    #[test]
    fn test_frame_ids_are_per_peer() {
        let mut r = reassembler(5);
        let now = Instant::now();
        let a = fragment(42, &[1u8; 6], 9); // 3-byte payloads, 2 chunks
        let b = fragment(42, &[2u8; 6], 9);

        assert_eq!(r.process_datagram_at(&a[0], &peer("p1"), now), ProcessOutcome::Pending);
        assert_eq!(r.process_datagram_at(&b[1], &peer("p2"), now), ProcessOutcome::Pending);
        assert_eq!(r.pending_frames(), 2);
        assert_eq!(r.process_datagram_at(&a[1], &peer("p1"), now), ProcessOutcome::Completed);
        assert_eq!(r.process_datagram_at(&b[0], &peer("p2"), now), ProcessOutcome::Completed);

        assert_eq!(r.latest(&peer("p1")).unwrap().data(), &[1u8; 6]);
        assert_eq!(r.latest(&peer("p2")).unwrap().data(), &[2u8; 6]);
    }

    #[test]
    fn test_stale_records_expire() {
        let mut r = reassembler(5);
        let start = Instant::now();
        let partial = fragment(1, &[5u8; 6], 9);
        r.process_datagram_at(&partial[0], &peer("p1"), start);
        assert_eq!(r.pending_frames(), 1);

        // Still alive right at the deadline
        let junk = build_datagram(ChunkHeader::new(0, 0, 0), b"");
        r.process_datagram_at(&junk, &peer("p1"), start + Duration::from_secs(1));
        assert_eq!(r.pending_frames(), 1);

        // Next call after the deadline purges it, even if that call is rejected
        r.process_datagram_at(&junk, &peer("p1"), start + Duration::from_millis(1001));
        assert_eq!(r.pending_frames(), 0);
        assert_eq!(r.stats().frames_expired.load(Ordering::Relaxed), 1);

        // The missing chunk now starts a new record instead of completing
        assert_eq!(
            r.process_datagram_at(&partial[1], &peer("p1"), start + Duration::from_millis(1002)),
            ProcessOutcome::Pending
        );
        assert!(r.latest(&peer("p1")).is_none());
    }

    #[test]
    fn test_bounded_under_partial_loss() {
        let mut r = reassembler(5);
        let start = Instant::now();
        for i in 0..5_000u32 {
            let now = start + Duration::from_millis(i as u64);
            let d = build_datagram(ChunkHeader::new(i as u16, 0, 2), b"abc");
            r.process_datagram_at(&d, &peer("p1"), now);
            // one record per ms, 1 s lifetime
            assert!(r.pending_frames() <= 1001);
        }
    }

    #[test]
    fn test_decode_failure_drops_frame() {
        let mut r = reassembler(5);
        let d = build_datagram(ChunkHeader::new(1, 0, 1), b"ab");
        assert_eq!(r.process_datagram(&d, &peer("p1")), ProcessOutcome::DecodeFailed);
        assert!(r.latest(&peer("p1")).is_none());
        assert_eq!(r.pending_frames(), 0);
    }

    #[test]
    fn test_cache_keeps_last_k() {
        let mut r = reassembler(3);
        for i in 0..10u8 {
            let d = build_datagram(ChunkHeader::new(i as u16, 0, 1), &[i, i, i]);
            assert_eq!(r.process_datagram(&d, &peer("p1")), ProcessOutcome::Completed);
        }
        let cache = r.feeds().get(&peer("p1")).unwrap();
        assert_eq!(cache.len(), 3);
        let shades: Vec<u8> = cache.drain().iter().map(|f| f.data()[0]).collect();
        assert_eq!(shades, vec![7, 8, 9]);
        assert!(r.latest(&peer("nobody")).is_none());
    }

    proptest! {
        #[test]
        fn prop_completes_once_when_all_chunks_seen(
            total in 1u16..12,
            order in proptest::collection::vec(any::<u16>(), 0..60),
        ) {
            let mut r = reassembler(5);
            let now = Instant::now();
            let mut seen = std::collections::HashSet::new();
            let mut completions = 0;

            // Arbitrary order with duplicates, then every chunk once to finish
            let sequence: Vec<u16> = order
                .iter()
                .map(|c| c % total)
                .chain(0..total)
                .collect();

            for chunk_id in sequence {
                let d = build_datagram(ChunkHeader::new(9, chunk_id, total), &[chunk_id as u8; 3]);
                let fresh = seen.insert(chunk_id);
                let outcome = r.process_datagram_at(&d, &peer("p1"), now);
                if seen.len() == total as usize && fresh {
                    prop_assert_eq!(outcome, ProcessOutcome::Completed);
                    completions += 1;
                    break;
                } else if fresh {
                    prop_assert_eq!(outcome, ProcessOutcome::Pending);
                } else {
                    prop_assert_eq!(outcome, ProcessOutcome::Duplicate);
                }
            }
            prop_assert_eq!(completions, 1);
            let frame = r.latest(&peer("p1")).unwrap();
            let expected: Vec<u8> = (0..total).flat_map(|c| [c as u8; 3]).collect();
            prop_assert_eq!(frame.data(), &expected[..]);
        }
    }
}
