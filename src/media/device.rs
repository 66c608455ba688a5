//! OpenCV capture devices and video clips
//!
//! Frames come out of OpenCV as BGR `Mat`s and are converted to packed RGB24
//! before entering the mesh.

use opencv::core::Mat;
use opencv::imgproc::{cvt_color_def, COLOR_BGR2RGB};
use opencv::prelude::*;
use opencv::videoio::{VideoCapture, CAP_ANY, CAP_GSTREAMER, CAP_PROP_FPS, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH};
use std::path::Path;
use std::time::Instant;

use crate::config::CameraConfig;
use crate::error::MediaError;
use crate::media::camera::{Camera, RateLimiter};
use crate::media::Frame;
use crate::transition::clip::{ClipOpener, ClipReader, RawClipReader};

/// Camera backed by an OpenCV capture device
pub struct DeviceCamera {
    capture: VideoCapture,
    limiter: RateLimiter,
    frames_captured: u64,
    released: bool,
}

impl DeviceCamera {
    /// Open device `index` and request the configured resolution and rate
    pub fn open(index: i32, config: &CameraConfig) -> Result<Self, MediaError> {
        let unavailable = |e: opencv::Error| MediaError::CameraUnavailable(format!("device {}: {}", index, e));

        let mut capture = VideoCapture::new(index, CAP_ANY).map_err(unavailable)?;
        if !capture.is_opened().map_err(unavailable)? {
            return Err(MediaError::CameraUnavailable(format!("device {} is not available", index)));
        }

        let _ = capture.set(CAP_PROP_FRAME_WIDTH, f64::from(config.width));
        let _ = capture.set(CAP_PROP_FRAME_HEIGHT, f64::from(config.height));
        if config.fps_limit > 0 {
            let _ = capture.set(CAP_PROP_FPS, f64::from(config.fps_limit));
        }

        let width = capture.get(CAP_PROP_FRAME_WIDTH).unwrap_or(0.0) as u32;
        let height = capture.get(CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0) as u32;
        if (width, height) != (config.width, config.height) {
            tracing::warn!(
                "Camera resolution is {}x{} instead of {}x{}",
                width,
                height,
                config.width,
                config.height
            );
        }
        tracing::info!("Camera: device {} at {}x{}", index, width, height);

        Ok(Self {
            capture,
            limiter: RateLimiter::new(config.fps_limit),
            frames_captured: 0,
            released: false,
        })
    }
}

impl Camera for DeviceCamera {
    fn capture(&mut self) -> Option<Frame> {
        if self.released || !self.limiter.ready(Instant::now()) {
            return None;
        }
        let frame = read_rgb(&mut self.capture)?;
        self.frames_captured += 1;
        Some(frame)
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        tracing::info!("Closing camera after {} frames", self.frames_captured);
        if let Err(e) = self.capture.release() {
            tracing::warn!("Error releasing camera: {}", e);
        }
    }
}

impl Drop for DeviceCamera {
    fn drop(&mut self) {
        self.release();
    }
}

/// Clip decoded by OpenCV
pub struct VideoClipReader {
    capture: VideoCapture,
}

impl ClipReader for VideoClipReader {
    fn read_frame(&mut self) -> Option<Frame> {
        read_rgb(&mut self.capture)
    }
}

/// Opens clips through GStreamer first, then any OpenCV backend.
///
/// Raw `RCLP` clips are still read directly on the generic path.
#[derive(Debug, Default, Clone, Copy)]
pub struct VideoClipOpener;

impl ClipOpener for VideoClipOpener {
    fn open_accelerated(&self, path: &Path) -> Option<Box<dyn ClipReader>> {
        open_video(path, CAP_GSTREAMER)
    }

    fn open(&self, path: &Path) -> Option<Box<dyn ClipReader>> {
        if let Ok(raw) = RawClipReader::open(path) {
            return Some(Box::new(raw));
        }
        open_video(path, CAP_ANY)
    }
}

fn open_video(path: &Path, api: i32) -> Option<Box<dyn ClipReader>> {
    let source = path.to_str()?;
    match VideoCapture::from_file(source, api) {
        Ok(capture) if capture.is_opened().unwrap_or(false) => Some(Box::new(VideoClipReader { capture })),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("OpenCV could not open {}: {}", path.display(), e);
            None
        }
    }
}

fn read_rgb(capture: &mut VideoCapture) -> Option<Frame> {
    let mut bgr = Mat::default();
    match capture.read(&mut bgr) {
        Ok(true) if !bgr.empty() => {}
        Ok(_) => return None,
        Err(e) => {
            tracing::debug!("Capture read failed: {}", e);
            return None;
        }
    }
    match mat_to_frame(&bgr) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::debug!("{}", e);
            None
        }
    }
}

/// Convert a BGR `Mat` into an RGB24 frame
pub fn mat_to_frame(bgr: &Mat) -> Result<Frame, MediaError> {
    let capture_err = |e: opencv::Error| MediaError::Capture(e.to_string());

    let mut rgb = Mat::default();
    cvt_color_def(bgr, &mut rgb, COLOR_BGR2RGB).map_err(capture_err)?;
    let data = rgb.data_bytes().map_err(capture_err)?;
    Frame::new(rgb.cols() as u32, rgb.rows() as u32, data.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::clip::test_support::write_clip;
    use opencv::core::{Scalar, CV_8UC3};

    #[test]
    fn test_invalid_device_is_unavailable() {
        let result = DeviceCamera::open(999, &CameraConfig::default());
        assert!(matches!(result, Err(MediaError::CameraUnavailable(_))));
    }

    #[test]
    fn test_mat_to_frame_swaps_channels() {
        // Pure blue in BGR order
        let bgr = Mat::new_rows_cols_with_default(2, 3, CV_8UC3, Scalar::new(255.0, 0.0, 0.0, 0.0)).unwrap();
        let frame = mat_to_frame(&bgr).unwrap();
        assert_eq!(frame.dimensions(), (3, 2));
        assert_eq!(&frame.data()[..3], &[0, 0, 255]);
    }

    #[test]
    fn test_opener_reads_raw_clips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.rclp");
        write_clip(&path, 2, 2, 2);

        let mut reader = VideoClipOpener.open(&path).unwrap();
        assert_eq!(reader.read_frame().unwrap().data()[0], 0);
        assert!(VideoClipOpener.open(&dir.path().join("missing.mp4")).is_none());
    }
}
