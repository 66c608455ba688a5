//! Transition clips played between view switches

pub mod clip;
pub mod session;

pub use clip::{default_clip_opener, list_clips, ClipOpener, ClipReader, RawClipOpener, RawClipReader};
pub use session::{ClipStep, TransitionSession};
