//! Decoded video frame

use bytes::Bytes;
use std::fmt;

use crate::error::MediaError;

/// Bytes per pixel (packed RGB24)
pub const BYTES_PER_PIXEL: usize = 3;

/// An uncompressed RGB24 image.
///
/// Pixel data is reference counted so frames can be handed between the
/// capture, encode and render paths without copying.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Bytes,
}

impl Frame {
    /// Wrap packed RGB24 pixel data
    pub fn new(width: u32, height: u32, data: impl Into<Bytes>) -> Result<Self, MediaError> {
        let data = data.into();
        if width == 0 || height == 0 || data.len() != Self::byte_len(width, height) {
            return Err(MediaError::InvalidFrame {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    /// Solid black frame
    pub fn black(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: Bytes::from(vec![0u8; Self::byte_len(width, height)]),
        }
    }

    /// Packed size in bytes; saturates rather than overflowing
    pub fn byte_len(width: u32, height: u32) -> usize {
        (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(BYTES_PER_PIXEL)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// One row of packed pixels
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * BYTES_PER_PIXEL;
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    /// Nearest-neighbour scale to `width` x `height`.
    ///
    /// Returns a cheap clone when the size already matches.
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        if (width, height) == self.dimensions() || width == 0 || height == 0 {
            return self.clone();
        }

        let mut out = Vec::with_capacity(Self::byte_len(width, height));
        for y in 0..height {
            let src_y = (y as u64 * self.height as u64 / height as u64) as u32;
            let src_row = self.row(src_y);
            for x in 0..width {
                let src_x = (x as u64 * self.width as u64 / width as u64) as usize;
                let px = src_x * BYTES_PER_PIXEL;
                out.extend_from_slice(&src_row[px..px + BYTES_PER_PIXEL]);
            }
        }

        Frame {
            width,
            height,
            data: Bytes::from(out),
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}
