//! Media subsystem: frames, camera capture and per-feed frame caches

pub mod cache;
pub mod camera;
#[cfg(feature = "opencv")]
pub mod device;
pub mod frame;

pub use cache::{create_shared_cache, FrameCache, SharedFrameCache};
pub use camera::{open_camera, Camera, CameraSource};
pub use frame::Frame;
