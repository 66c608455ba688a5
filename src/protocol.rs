//! Wire format for frame chunks
//!
//! Every datagram starts with a fixed 6-byte header followed by the raw
//! chunk payload:
//!
//! ```text
//! 0        2        4              6
//! ┌────────┬────────┬──────────────┬─────────────────────┐
//! │frame_id│chunk_id│ total_chunks │ payload ...         │
//! └────────┴────────┴──────────────┴─────────────────────┘
//! ```
//!
//! All fields are big-endian `u16`. `frame_id` is a per-sender wrapping
//! counter; two senders may use the same value for unrelated frames.

use bytes::{Buf, BufMut, BytesMut};

/// Size of the chunk header in bytes
pub const HEADER_SIZE: usize = 6;

/// Upper bound on `total_chunks` accepted by the receiver.
///
/// A 640x480 frame at any sane quality fits in far fewer chunks; anything
/// above this is treated as malformed so a single header cannot force a large
/// allocation.
pub const MAX_CHUNKS: u16 = 1024;

/// Header preceding every chunk payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub frame_id: u16,
    pub chunk_id: u16,
    pub total_chunks: u16,
}

impl ChunkHeader {
    pub fn new(frame_id: u16, chunk_id: u16, total_chunks: u16) -> Self {
        Self {
            frame_id,
            chunk_id,
            total_chunks,
        }
    }

    /// Parse a header from the front of a datagram.
    ///
    /// Returns the header and the remaining payload, or `None` if the
    /// datagram is shorter than [`HEADER_SIZE`].
    pub fn parse(datagram: &[u8]) -> Option<(Self, &[u8])> {
        if datagram.len() < HEADER_SIZE {
            return None;
        }
        let mut buf = &datagram[..HEADER_SIZE];
        let header = Self {
            frame_id: buf.get_u16(),
            chunk_id: buf.get_u16(),
            total_chunks: buf.get_u16(),
        };
        Some((header, &datagram[HEADER_SIZE..]))
    }

    /// Append the encoded header to `buf`
    pub fn write(&self, buf: &mut BytesMut) {
        buf.put_u16(self.frame_id);
        buf.put_u16(self.chunk_id);
        buf.put_u16(self.total_chunks);
    }

    /// Whether the header describes a chunk the receiver may store
    pub fn is_valid(&self) -> bool {
        self.total_chunks != 0 && self.total_chunks <= MAX_CHUNKS && self.chunk_id < self.total_chunks
    }
}

/// Payload bytes available per datagram for a given datagram size
pub fn payload_size(max_datagram: usize) -> usize {
    max_datagram.saturating_sub(HEADER_SIZE)
}

/// Number of chunks needed to carry `len` bytes
pub fn chunk_count(len: usize, payload_size: usize) -> usize {
    if payload_size == 0 {
        return 0;
    }
    len.div_ceil(payload_size)
}

/// Build a complete datagram (header + payload)
pub fn build_datagram(header: ChunkHeader, payload: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    header.write(&mut buf);
    buf.put_slice(payload);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout_is_big_endian() {
        let datagram = build_datagram(ChunkHeader::new(0x0102, 0x0304, 0x0506), b"xy");
        assert_eq!(&datagram[..], &[1, 2, 3, 4, 5, 6, b'x', b'y']);

        let (header, payload) = ChunkHeader::parse(&datagram).unwrap();
        assert_eq!(header, ChunkHeader::new(0x0102, 0x0304, 0x0506));
        assert_eq!(payload, b"xy");
    }

    #[test]
    fn test_short_datagram_rejected() {
        assert!(ChunkHeader::parse(&[0, 1, 0, 0, 0]).is_none());
        let (_, payload) = ChunkHeader::parse(&[0, 1, 0, 0, 0, 1]).unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn test_header_validity() {
        assert!(ChunkHeader::new(0, 0, 1).is_valid());
        assert!(!ChunkHeader::new(0, 0, 0).is_valid());
        assert!(!ChunkHeader::new(0, 3, 3).is_valid());
        assert!(!ChunkHeader::new(0, 0, MAX_CHUNKS + 1).is_valid());
        assert!(ChunkHeader::new(0, MAX_CHUNKS - 1, MAX_CHUNKS).is_valid());
    }

    #[test]
    fn test_chunk_count() {
        assert_eq!(payload_size(1300), 1294);
        assert_eq!(chunk_count(10_000, 1294), 8);
        assert_eq!(chunk_count(1294, 1294), 1);
        assert_eq!(chunk_count(1295, 1294), 2);
        assert_eq!(chunk_count(0, 1294), 0);
    }
}
