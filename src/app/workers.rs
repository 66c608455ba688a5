//! Encode-and-send worker pool
//!
//! The capture loop hands frames to a small fixed set of workers so it never
//! waits on encoding. Each worker encodes and fans the result out through the
//! shared [`FrameSender`].

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::codec::FrameCodec;
use crate::media::Frame;
use crate::network::FrameSender;

/// How often an idle worker checks whether the pool is closing
const IDLE_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
pub struct PoolStats {
    pub frames_submitted: AtomicU64,
    pub frames_encoded: AtomicU64,
    /// Frames dropped because every worker was busy
    pub frames_dropped: AtomicU64,
    pub encode_errors: AtomicU64,
}

/// Cloneable submit side of the pool, held by the capture loop
#[derive(Clone)]
pub struct EncodeQueue {
    tx: Sender<Arc<Frame>>,
    stats: Arc<PoolStats>,
}

impl EncodeQueue {
    /// Queue a frame without blocking; returns `false` if it was dropped
    pub fn submit(&self, frame: Arc<Frame>) -> bool {
        self.stats.frames_submitted.fetch_add(1, Ordering::Relaxed);
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("Encode queue full, dropping frame");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

pub struct EncodePool {
    queue: Option<EncodeQueue>,
    workers: Vec<JoinHandle<()>>,
    closing: Arc<AtomicBool>,
    stats: Arc<PoolStats>,
}

impl EncodePool {
    pub fn new(
        workers: usize,
        queue_depth: usize,
        codec: Arc<dyn FrameCodec>,
        quality: u8,
        sender: Arc<FrameSender>,
    ) -> std::io::Result<Self> {
        let (tx, rx) = bounded::<Arc<Frame>>(queue_depth.max(1));
        let stats = Arc::new(PoolStats::default());
        let closing = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(workers.max(1));
        for i in 0..workers.max(1) {
            let rx = rx.clone();
            let codec = codec.clone();
            let sender = sender.clone();
            let stats = stats.clone();
            let closing = closing.clone();
            let handle = thread::Builder::new()
                .name(format!("encode-{}", i))
                .spawn(move || encode_worker(rx, codec, quality, sender, stats, closing))?;
            handles.push(handle);
        }

        tracing::info!("Encode pool started with {} workers", handles.len());
        Ok(Self {
            queue: Some(EncodeQueue { tx, stats: stats.clone() }),
            workers: handles,
            closing,
            stats,
        })
    }

    /// Submit handle; `None` once the pool has been drained
    pub fn queue(&self) -> Option<EncodeQueue> {
        self.queue.clone()
    }

    pub fn stats(&self) -> Arc<PoolStats> {
        self.stats.clone()
    }

    /// Finish every queued frame, then stop the workers.
    ///
    /// Frames submitted through a surviving [`EncodeQueue`] after this
    /// returns are never sent.
    pub fn drain(&mut self) {
        self.queue = None;
        self.closing.store(true, Ordering::SeqCst);
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Encode worker panicked");
            }
        }
        tracing::debug!(
            "Encode pool drained: {} encoded, {} dropped",
            self.stats.frames_encoded.load(Ordering::Relaxed),
            self.stats.frames_dropped.load(Ordering::Relaxed)
        );
    }
}

impl Drop for EncodePool {
    fn drop(&mut self) {
        self.drain();
    }
}

fn encode_worker(
    rx: Receiver<Arc<Frame>>,
    codec: Arc<dyn FrameCodec>,
    quality: u8,
    sender: Arc<FrameSender>,
    stats: Arc<PoolStats>,
    closing: Arc<AtomicBool>,
) {
    loop {
        let frame = match rx.recv_timeout(IDLE_POLL) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) if closing.load(Ordering::Relaxed) => break,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match codec.encode(&frame, quality) {
            Ok(encoded) => {
                sender.send(&encoded);
                stats.frames_encoded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                stats.encode_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Frame encode failed: {}", e);
            }
        }
    }
}
