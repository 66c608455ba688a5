//! Frame codec
//!
//! The mesh only needs a codec that turns a frame into bytes and back and
//! reports corrupt input as `None`. The built-in codec quantizes colours by
//! quality and run-length codes the result, which compresses camera scenes
//! and synthetic patterns well enough for a LAN.

pub mod decoder;
pub mod encoder;

use bytes::Bytes;

use crate::error::CodecError;
use crate::media::Frame;

/// Magic bytes opening every encoded frame
pub const FRAME_MAGIC: &[u8; 4] = b"QRLE";

/// Encoded header: magic, width, height, quality
pub const ENCODED_HEADER_SIZE: usize = 4 + 4 + 4 + 1;

/// Largest frame the decoder will allocate for (pixels)
pub const MAX_PIXELS: usize = 4096 * 4096;

/// Encode/decode collaborator shared by the encode pool and the receive loop
pub trait FrameCodec: Send + Sync {
    /// Encode at `quality` (1-100)
    fn encode(&self, frame: &Frame, quality: u8) -> Result<Bytes, CodecError>;

    /// Decode; `None` on any malformed input
    fn decode(&self, data: &[u8]) -> Option<Frame>;
}

/// Quantized run-length codec
#[derive(Debug, Default, Clone, Copy)]
pub struct RleCodec;

impl FrameCodec for RleCodec {
    fn encode(&self, frame: &Frame, quality: u8) -> Result<Bytes, CodecError> {
        encoder::encode(frame, quality)
    }

    fn decode(&self, data: &[u8]) -> Option<Frame> {
        decoder::decode(data)
    }
}
