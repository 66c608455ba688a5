//! Transition clip playback
//!
//! A switch may be "armed" with a randomly chosen clip. While the clip plays
//! the UI renders its frames fullscreen; the pending view is activated once
//! the clip runs out or is skipped.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};

use crate::config::TransitionConfig;
use crate::media::Frame;
use crate::transition::clip::{list_clips, ClipOpener, ClipReader};

/// One step of clip playback
#[derive(Debug)]
pub enum ClipStep {
    /// Next frame, already scaled to the output resolution
    Frame(Frame),
    /// Clip finished (or was never armed); the session has been released
    Done,
}

/// Probabilistic transition clip player
pub struct TransitionSession {
    clips: Vec<PathBuf>,
    probability: f64,
    output_size: (u32, u32),
    opener: Box<dyn ClipOpener>,
    rng: StdRng,
    active: Option<Box<dyn ClipReader>>,
}

impl TransitionSession {
    pub fn new(clips: Vec<PathBuf>, probability: f64, output_size: (u32, u32), opener: Box<dyn ClipOpener>) -> Self {
        Self {
            clips,
            probability: probability.clamp(0.0, 1.0),
            output_size,
            opener,
            rng: StdRng::from_entropy(),
            active: None,
        }
    }

    /// Build from config, scanning the clip directory once
    pub fn from_config(config: &TransitionConfig, opener: Box<dyn ClipOpener>) -> Self {
        let clips = list_clips(&config.clip_dir);
        tracing::info!(
            "Transition clips: {} found in {} (chance {:.0}%)",
            clips.len(),
            config.clip_dir.display(),
            config.probability * 100.0
        );
        Self::new(clips, config.probability, (config.width, config.height), opener)
    }

    /// Replace the random source (deterministic tests)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Decide whether this switch plays a clip, and if so open it.
    ///
    /// Returns `false` when there are no clips, the draw fails or the chosen
    /// clip cannot be opened; the caller then switches immediately.
    pub fn arm(&mut self) -> bool {
        self.abort();

        if self.clips.is_empty() || self.rng.gen::<f64>() >= self.probability {
            return false;
        }

        let path = &self.clips[self.rng.gen_range(0..self.clips.len())];
        let Some(mut reader) = self.open(path) else {
            tracing::warn!("Transition clip {} could not be opened, skipping", path.display());
            return false;
        };

        // Prime the decoder; the first frame is not shown
        let _ = reader.read_frame();
        tracing::debug!("Transition armed with {}", path.display());
        self.active = Some(reader);
        true
    }

    fn open(&self, path: &Path) -> Option<Box<dyn ClipReader>> {
        self.opener
            .open_accelerated(path)
            .or_else(|| self.opener.open(path))
    }

    /// Pull the next clip frame
    pub fn next_frame(&mut self) -> ClipStep {
        let Some(reader) = self.active.as_mut() else {
            return ClipStep::Done;
        };

        match reader.read_frame() {
            Some(frame) => {
                let (w, h) = self.output_size;
                ClipStep::Frame(frame.resized(w, h))
            }
            None => {
                self.active = None;
                ClipStep::Done
            }
        }
    }

    /// Release any playing clip immediately
    pub fn abort(&mut self) {
        if self.active.take().is_some() {
            tracing::debug!("Transition clip released");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }
}
