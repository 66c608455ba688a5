//! Clip readers
//!
//! Clips are stored as raw RGB24 frame sequences:
//!
//! ```text
//! ┌──────┬───────────┬────────────┬──────────────┬──────────────┬───
//! │"RCLP"│ width u32 │ height u32 │ frame 0 RGB  │ frame 1 RGB  │ ...
//! └──────┴───────────┴────────────┴──────────────┴──────────────┴───
//! ```
//!
//! Dimensions are big-endian. A truncated trailing frame ends the clip.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::codec::MAX_PIXELS;
use crate::error::MediaError;
use crate::media::Frame;

/// Magic bytes opening every raw clip file
pub const CLIP_MAGIC: &[u8; 4] = b"RCLP";

/// Sequential frame source
pub trait ClipReader: Send {
    /// Next frame, or `None` at end of stream or on a read failure
    fn read_frame(&mut self) -> Option<Frame>;
}

/// Opens clip files, optionally through an accelerated decode path
pub trait ClipOpener: Send {
    /// Hardware-accelerated open; `None` when unavailable for this clip
    fn open_accelerated(&self, path: &Path) -> Option<Box<dyn ClipReader>>;

    /// Generic open used as the fallback
    fn open(&self, path: &Path) -> Option<Box<dyn ClipReader>>;
}

/// Reader for raw clip files
pub struct RawClipReader {
    reader: BufReader<File>,
    width: u32,
    height: u32,
    frames_read: u64,
}

impl RawClipReader {
    pub fn open(path: &Path) -> Result<Self, MediaError> {
        let clip_err = |e: io::Error| MediaError::ClipOpen(format!("{}: {}", path.display(), e));

        let mut reader = BufReader::new(File::open(path).map_err(clip_err)?);
        let mut header = [0u8; 12];
        reader.read_exact(&mut header).map_err(clip_err)?;

        if &header[..4] != CLIP_MAGIC {
            return Err(MediaError::ClipOpen(format!("{}: not a raw clip", path.display())));
        }
        let width = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        let height = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);
        if width == 0 || height == 0 {
            return Err(MediaError::ClipOpen(format!("{}: zero-sized frames", path.display())));
        }
        match (width as usize).checked_mul(height as usize) {
            Some(pixels) if pixels <= MAX_PIXELS => {}
            _ => {
                return Err(MediaError::ClipOpen(format!(
                    "{}: {}x{} frames exceed {} pixels",
                    path.display(),
                    width,
                    height,
                    MAX_PIXELS
                )));
            }
        }

        Ok(Self {
            reader,
            width,
            height,
            frames_read: 0,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

impl ClipReader for RawClipReader {
    fn read_frame(&mut self) -> Option<Frame> {
        let mut data = vec![0u8; Frame::byte_len(self.width, self.height)];
        match self.reader.read_exact(&mut data) {
            Ok(()) => {
                self.frames_read += 1;
                Frame::new(self.width, self.height, data).ok()
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => None,
            Err(e) => {
                tracing::warn!("Clip read failed: {}", e);
                None
            }
        }
    }
}

/// Opener for raw clip files.
///
/// Raw clips need no decoding, so there is no accelerated path.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawClipOpener;

impl ClipOpener for RawClipOpener {
    fn open_accelerated(&self, _path: &Path) -> Option<Box<dyn ClipReader>> {
        None
    }

    fn open(&self, path: &Path) -> Option<Box<dyn ClipReader>> {
        match RawClipReader::open(path) {
            Ok(reader) => Some(Box::new(reader)),
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        }
    }
}

/// Clip opener for this build: OpenCV when enabled, raw clips otherwise
pub fn default_clip_opener() -> Box<dyn ClipOpener> {
    #[cfg(feature = "opencv")]
    {
        Box::new(crate::media::device::VideoClipOpener)
    }
    #[cfg(not(feature = "opencv"))]
    {
        Box::new(RawClipOpener)
    }
}

/// Regular files in `dir`, sorted; empty if the directory is missing
pub fn list_clips(dir: &Path) -> Vec<PathBuf> {
    let mut clips: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect(),
        Err(_) => Vec::new(),
    };
    clips.sort();
    clips
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::io::Write;

    /// Write `count` solid frames whose shade is the frame index
    pub fn write_clip(path: &Path, width: u32, height: u32, count: u8) {
        let mut file = File::create(path).unwrap();
        file.write_all(CLIP_MAGIC).unwrap();
        file.write_all(&width.to_be_bytes()).unwrap();
        file.write_all(&height.to_be_bytes()).unwrap();
        for shade in 0..count {
            file.write_all(&vec![shade; Frame::byte_len(width, height)]).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::write_clip;
    use super::*;

    #[test]
    fn test_read_raw_clip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.rclp");
        write_clip(&path, 4, 2, 3);

        let mut reader = RawClipReader::open(&path).unwrap();
        assert_eq!(reader.dimensions(), (4, 2));
        for shade in 0..3u8 {
            let frame = reader.read_frame().unwrap();
            assert_eq!(frame.data()[0], shade);
        }
        assert!(reader.read_frame().is_none());
        assert_eq!(reader.frames_read(), 3);
    }

    #[test]
    fn test_rejects_non_clip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello world, not a clip").unwrap();

        assert!(RawClipReader::open(&path).is_err());
        assert!(RawClipOpener.open(&path).is_none());
        assert!(RawClipOpener.open_accelerated(&path).is_none());
    }

    #[test]
    fn test_rejects_oversized_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        for (name, w, h) in [("overflow.rclp", u32::MAX, u32::MAX), ("huge.rclp", 60_000, 60_000)] {
            let path = dir.path().join(name);
            let mut header = CLIP_MAGIC.to_vec();
            header.extend_from_slice(&w.to_be_bytes());
            header.extend_from_slice(&h.to_be_bytes());
            std::fs::write(&path, header).unwrap();

            assert!(matches!(RawClipReader::open(&path), Err(MediaError::ClipOpen(_))));
            assert!(RawClipOpener.open(&path).is_none());
        }
    }

    #[test]
    fn test_list_clips() {
        let dir = tempfile::tempdir().unwrap();
        write_clip(&dir.path().join("b.rclp"), 1, 1, 1);
        write_clip(&dir.path().join("a.rclp"), 1, 1, 1);
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let clips = list_clips(dir.path());
        assert_eq!(clips, vec![dir.path().join("a.rclp"), dir.path().join("b.rclp")]);
        assert!(list_clips(&dir.path().join("missing")).is_empty());
    }
}
