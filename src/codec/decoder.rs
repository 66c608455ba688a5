//! Frame decoder

use bytes::Buf;

use crate::codec::{ENCODED_HEADER_SIZE, FRAME_MAGIC, MAX_PIXELS};
use crate::media::frame::{Frame, BYTES_PER_PIXEL};

/// Decode an encoded frame; any inconsistency yields `None`
pub fn decode(data: &[u8]) -> Option<Frame> {
    if data.len() < ENCODED_HEADER_SIZE || &data[..4] != FRAME_MAGIC {
        return None;
    }

    let mut buf = &data[4..];
    let width = buf.get_u32();
    let height = buf.get_u32();
    let _quality = buf.get_u8();

    let pixels = (width as usize).checked_mul(height as usize)?;
    if pixels == 0 || pixels > MAX_PIXELS || buf.remaining() % 4 != 0 {
        return None;
    }

    let mut out = Vec::with_capacity(pixels * BYTES_PER_PIXEL);
    while buf.has_remaining() {
        let count = buf.get_u8() as usize;
        let pixel = [buf.get_u8(), buf.get_u8(), buf.get_u8()];
        if count == 0 || out.len() + count * BYTES_PER_PIXEL > pixels * BYTES_PER_PIXEL {
            return None;
        }
        for _ in 0..count {
            out.extend_from_slice(&pixel);
        }
    }

    if out.len() != pixels * BYTES_PER_PIXEL {
        return None;
    }
    Frame::new(width, height, out).ok()
}
