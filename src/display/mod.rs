//! Display backends
//!
//! The UI loop renders through the [`Display`] trait. Compositing (dual
//! layout, placeholders for missing feeds) happens here so every backend
//! shows the same picture.

pub mod headless;

pub use headless::{HeadlessDisplay, Scene, SceneKind};

use crate::media::frame::BYTES_PER_PIXEL;
use crate::media::Frame;

/// Height both halves of the dual view are scaled to
pub const DUAL_HEIGHT: u32 = 480;

/// Size of a placeholder when no feed is available
pub const PLACEHOLDER_SIZE: (u32, u32) = (640, 480);

/// Render target for the UI loop
pub trait Display {
    /// One feed fills the screen; `None` renders a "Waiting" placeholder
    fn show_single(&mut self, frame: Option<&Frame>, name: &str);

    /// Two feeds side by side
    fn show_dual(&mut self, left: Option<&Frame>, left_name: &str, right: Option<&Frame>, right_name: &str);

    /// A transition clip frame, already at output resolution
    fn show_fullscreen(&mut self, frame: Option<&Frame>);

    /// Key pressed since the last poll, without blocking
    fn poll_key(&mut self) -> Option<u8>;

    fn close(&mut self);
}

/// Dark frame with a diagonal stripe, shown in place of a missing feed
pub fn placeholder(width: u32, height: u32) -> Frame {
    let mut data = Vec::with_capacity(Frame::byte_len(width, height));
    for y in 0..height {
        for x in 0..width {
            let level = if (x + y) % 64 < 2 { 96 } else { 16 };
            data.extend_from_slice(&[level; BYTES_PER_PIXEL]);
        }
    }
    Frame::new(width, height, data).unwrap_or_else(|_| Frame::black(width, height))
}

/// Scale to `height`, keeping the aspect ratio
pub fn fit_height(frame: &Frame, height: u32) -> Frame {
    let (w, h) = frame.dimensions();
    if h == height {
        return frame.clone();
    }
    let width = ((w as u64 * height as u64) / h.max(1) as u64).max(1) as u32;
    frame.resized(width, height)
}

/// Place two frames next to each other at [`DUAL_HEIGHT`]
pub fn compose_dual(left: &Frame, right: &Frame) -> Frame {
    let left = fit_height(left, DUAL_HEIGHT);
    let right = fit_height(right, DUAL_HEIGHT);
    let width = left.width() + right.width();

    let mut data = Vec::with_capacity(Frame::byte_len(width, DUAL_HEIGHT));
    for y in 0..DUAL_HEIGHT {
        data.extend_from_slice(left.row(y));
        data.extend_from_slice(right.row(y));
    }
    Frame::new(width, DUAL_HEIGHT, data).unwrap_or_else(|_| Frame::black(width, DUAL_HEIGHT))
}
