//! Camera sources
//!
//! A camera hands out frames at a capped rate; callers poll it in a loop and
//! get `None` whenever the next frame is not yet due.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::CameraConfig;
use crate::error::MediaError;
use crate::media::Frame;
use crate::transition::clip::{ClipReader, RawClipReader};

/// Frame source polled by the capture loop
pub trait Camera: Send {
    /// Next frame if one is due, `None` otherwise
    fn capture(&mut self) -> Option<Frame>;

    /// Release the underlying device
    fn release(&mut self);
}

/// Where the capture loop gets its frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraSource {
    /// Built-in moving colour bars
    TestPattern,
    /// Raw clip file played in a loop
    Clip(PathBuf),
    /// Capture device by index (`device:N` or `/dev/videoN`)
    Device(i32),
}

impl CameraSource {
    pub fn parse(source: &str) -> Self {
        let device = source
            .strip_prefix("device:")
            .or_else(|| source.strip_prefix("/dev/video"))
            .and_then(|index| index.parse().ok());
        match (source, device) {
            (_, Some(index)) => CameraSource::Device(index),
            ("" | "test-pattern", None) => CameraSource::TestPattern,
            (path, None) => CameraSource::Clip(PathBuf::from(path)),
        }
    }
}

/// Open the configured camera; failure here is fatal to the node
pub fn open_camera(config: &CameraConfig) -> Result<Box<dyn Camera>, MediaError> {
    let limiter = RateLimiter::new(config.fps_limit);
    match CameraSource::parse(&config.source) {
        CameraSource::TestPattern => {
            tracing::info!("Camera: test pattern {}x{}", config.width, config.height);
            Ok(Box::new(TestPatternCamera::new(config.width, config.height, limiter)))
        }
        CameraSource::Clip(path) => {
            let camera = ClipCamera::open(&path, limiter)?;
            let (w, h) = camera.dimensions();
            if (w, h) != (config.width, config.height) {
                tracing::warn!(
                    "Camera resolution is {}x{} instead of {}x{}",
                    w,
                    h,
                    config.width,
                    config.height
                );
            }
            tracing::info!("Camera: looping clip {}", path.display());
            Ok(Box::new(camera))
        }
        #[cfg(feature = "opencv")]
        CameraSource::Device(index) => Ok(Box::new(crate::media::device::DeviceCamera::open(index, config)?)),
        #[cfg(not(feature = "opencv"))]
        CameraSource::Device(index) => Err(MediaError::CameraUnavailable(format!(
            "device {} needs a build with the opencv feature",
            index
        ))),
    }
}

/// Minimum spacing between captured frames
#[derive(Debug, Clone)]
pub struct RateLimiter {
    frame_time: Duration,
    last: Option<Instant>,
}

impl RateLimiter {
    /// `fps` of 0 disables limiting
    pub fn new(fps: u32) -> Self {
        let frame_time = if fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(1.0 / fps as f64)
        };
        Self { frame_time, last: None }
    }

    /// Whether a frame is due at `now`; records the capture if so
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.frame_time => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Synthetic camera producing scrolling colour bars
pub struct TestPatternCamera {
    width: u32,
    height: u32,
    limiter: RateLimiter,
    tick: u32,
    released: bool,
}

const BARS: [[u8; 3]; 8] = [
    [255, 255, 255],
    [255, 255, 0],
    [0, 255, 255],
    [0, 255, 0],
    [255, 0, 255],
    [255, 0, 0],
    [0, 0, 255],
    [0, 0, 0],
];

impl TestPatternCamera {
    pub fn new(width: u32, height: u32, limiter: RateLimiter) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            limiter,
            tick: 0,
            released: false,
        }
    }

    fn render(&self) -> Frame {
        let w = self.width as usize;
        let bar_width = (w / BARS.len()).max(1);
        let mut data = Vec::with_capacity(Frame::byte_len(self.width, self.height));
        for _ in 0..self.height {
            for x in 0..w {
                let bar = ((x + self.tick as usize) / bar_width) % BARS.len();
                data.extend_from_slice(&BARS[bar]);
            }
        }
        Frame::new(self.width, self.height, data).unwrap_or_else(|_| Frame::black(self.width, self.height))
    }
}

impl Camera for TestPatternCamera {
    fn capture(&mut self) -> Option<Frame> {
        if self.released || !self.limiter.ready(Instant::now()) {
            return None;
        }
        let frame = self.render();
        self.tick = self.tick.wrapping_add(4);
        Some(frame)
    }

    fn release(&mut self) {
        self.released = true;
    }
}

/// Camera replaying a raw clip file forever
pub struct ClipCamera {
    path: PathBuf,
    reader: Option<RawClipReader>,
    dimensions: (u32, u32),
    limiter: RateLimiter,
}

impl ClipCamera {
    pub fn open(path: &Path, limiter: RateLimiter) -> Result<Self, MediaError> {
        let reader = RawClipReader::open(path)
            .map_err(|e| MediaError::CameraUnavailable(e.to_string()))?;
        Ok(Self {
            path: path.to_path_buf(),
            dimensions: reader.dimensions(),
            reader: Some(reader),
            limiter,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }
}

impl Camera for ClipCamera {
    fn capture(&mut self) -> Option<Frame> {
        if self.reader.is_none() || !self.limiter.ready(Instant::now()) {
            return None;
        }

        if let Some(frame) = self.reader.as_mut().and_then(|r| r.read_frame()) {
            return Some(frame);
        }

        // End of clip: rewind
        match RawClipReader::open(&self.path) {
            Ok(mut reader) => {
                let frame = reader.read_frame();
                self.reader = Some(reader);
                frame
            }
            Err(e) => {
                tracing::warn!("Camera clip could not be reopened: {}", e);
                self.reader = None;
                None
            }
        }
    }

    fn release(&mut self) {
        self.reader = None;
    }
}
