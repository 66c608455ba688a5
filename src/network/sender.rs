//! Frame sender: chunking and fan-out
//!
//! One encoded frame becomes `ceil(len / payload)` datagrams sharing a
//! frame id; every datagram goes to every peer. Send failures are counted
//! and otherwise ignored; the stream is loss tolerant.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};

use crate::protocol::{build_datagram, chunk_count, payload_size, ChunkHeader, MAX_CHUNKS};

/// Sends chunked frames to a fixed set of peers.
///
/// Shared by the encode workers; each chunk is a single `send_to`, so
/// concurrent senders never interleave partial datagrams.
pub struct FrameSender {
    socket: UdpSocket,
    targets: Vec<SocketAddr>,
    payload_size: usize,
    next_frame_id: AtomicU16,
    frames_sent: AtomicU64,
    datagrams_sent: AtomicU64,
    bytes_sent: AtomicU64,
    send_errors: AtomicU64,
    oversized_frames: AtomicU64,
}

impl FrameSender {
    pub fn new(socket: UdpSocket, targets: Vec<SocketAddr>, max_datagram: usize) -> Self {
        Self {
            socket,
            targets,
            payload_size: payload_size(max_datagram),
            next_frame_id: AtomicU16::new(0),
            frames_sent: AtomicU64::new(0),
            datagrams_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            send_errors: AtomicU64::new(0),
            oversized_frames: AtomicU64::new(0),
        }
    }

    /// Chunk `frame` and send every chunk to every peer.
    ///
    /// Returns the number of chunks the frame was split into (0 if the frame
    /// was empty or too large for the receiver's chunk ceiling).
    pub fn send(&self, frame: &[u8]) -> usize {
        let total = chunk_count(frame.len(), self.payload_size);
        if total == 0 {
            return 0;
        }
        if total > MAX_CHUNKS as usize {
            self.oversized_frames.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Frame of {} bytes needs {} chunks, not sent", frame.len(), total);
            return 0;
        }

        let frame_id = self.next_frame_id.fetch_add(1, Ordering::Relaxed);
        for (chunk_id, payload) in frame.chunks(self.payload_size).enumerate() {
            let header = ChunkHeader::new(frame_id, chunk_id as u16, total as u16);
            let datagram = build_datagram(header, payload);
            for target in &self.targets {
                match self.socket.send_to(&datagram, target) {
                    Ok(n) => {
                        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
                        self.bytes_sent.fetch_add(n as u64, Ordering::Relaxed);
                    }
                    Err(e) => {
                        self.send_errors.fetch_add(1, Ordering::Relaxed);
                        tracing::trace!("Send to {} failed: {}", target, e);
                    }
                }
            }
        }

        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        total
    }

    pub fn targets(&self) -> &[SocketAddr] {
        &self.targets
    }

    pub fn payload_size(&self) -> usize {
        self.payload_size
    }

    pub fn stats(&self) -> SenderStats {
        SenderStats {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            oversized_frames: self.oversized_frames.load(Ordering::Relaxed),
        }
    }
}

/// Sender statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct SenderStats {
    pub frames_sent: u64,
    pub datagrams_sent: u64,
    pub bytes_sent: u64,
    pub send_errors: u64,
    pub oversized_frames: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::udp::create_send_socket;
    use std::time::Duration;

    fn listener() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    fn recv_header(socket: &UdpSocket) -> (ChunkHeader, usize) {
        let mut buf = [0u8; 2048];
        let (n, _) = socket.recv_from(&mut buf).unwrap();
        let (header, payload) = ChunkHeader::parse(&buf[..n]).unwrap();
        (header, payload.len())
    }

    #[test]
    fn test_fragments_into_expected_chunks() {
        let (rx, addr) = listener();
        let sender = FrameSender::new(create_send_socket().unwrap(), vec![addr], 1300);

        let frame = vec![0xAB; 10_000];
        assert_eq!(sender.send(&frame), 8);

        let mut total_payload = 0;
        for expected_chunk in 0..8u16 {
            let (header, len) = recv_header(&rx);
            assert_eq!(header.frame_id, 0);
            assert_eq!(header.chunk_id, expected_chunk);
            assert_eq!(header.total_chunks, 8);
            assert!(len <= 1294);
            total_payload += len;
        }
        assert_eq!(total_payload, 10_000);
    }

    #[test]
    fn test_fan_out_and_frame_ids() {
        let (rx_a, addr_a) = listener();
        let (rx_b, addr_b) = listener();
        let sender = FrameSender::new(create_send_socket().unwrap(), vec![addr_a, addr_b], 100);

        sender.send(&[1u8; 10]);
        sender.send(&[2u8; 10]);

        for rx in [&rx_a, &rx_b] {
            assert_eq!(recv_header(rx).0, ChunkHeader::new(0, 0, 1));
            assert_eq!(recv_header(rx).0, ChunkHeader::new(1, 0, 1));
        }

        let stats = sender.stats();
        assert_eq!(stats.frames_sent, 2);
        assert_eq!(stats.datagrams_sent, 4);
    }

    #[test]
    fn test_failing_target_does_not_affect_others() {
        let (rx, addr) = listener();
        // Port 0 is never a valid destination, so every send to it errors
        let dead: SocketAddr = ([127, 0, 0, 1], 0).into();
        let sender = FrameSender::new(create_send_socket().unwrap(), vec![dead, addr], 100);

        let frame = vec![7u8; 250];
        assert_eq!(sender.send(&frame), 3);

        let mut payload = 0;
        for expected_chunk in 0..3u16 {
            let (header, len) = recv_header(&rx);
            assert_eq!(header, ChunkHeader::new(0, expected_chunk, 3));
            payload += len;
        }
        assert_eq!(payload, 250);

        let stats = sender.stats();
        assert_eq!(stats.send_errors, 3);
        assert_eq!(stats.datagrams_sent, 3);
        assert_eq!(stats.frames_sent, 1);
    }

    #[test]
    fn test_frame_id_wraps() {
        let sender = FrameSender::new(create_send_socket().unwrap(), Vec::new(), 100);
        sender.next_frame_id.store(u16::MAX, Ordering::Relaxed);
        sender.send(&[0u8; 4]);
        assert_eq!(sender.next_frame_id.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_empty_and_oversized_frames_not_sent() {
        let sender = FrameSender::new(create_send_socket().unwrap(), Vec::new(), 7);
        assert_eq!(sender.send(&[]), 0);
        assert_eq!(sender.send(&vec![0u8; MAX_CHUNKS as usize + 1]), 0);
        assert_eq!(sender.stats().oversized_frames, 1);
        assert_eq!(sender.stats().frames_sent, 0);
    }
}
