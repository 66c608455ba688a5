//! Post-switch glitch effects
//!
//! After a view switch each newly visible feed is distorted for a short
//! time. Effects run on the CPU over RGB24 frames and fade out as the
//! glitch nears its end.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::media::frame::BYTES_PER_PIXEL;
use crate::media::Frame;
use crate::peers::FeedId;

/// Largest horizontal displacement at full strength, in pixels
const MAX_SHIFT: usize = 24;

/// Fraction of pixels replaced by noise at full strength
const MAX_NOISE: f64 = 0.35;

/// Rows per scan-line band
const BAND_HEIGHT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlitchKind {
    /// Red and blue channels pulled apart horizontally
    ChannelShift,
    /// Horizontal bands displaced by random offsets
    ScanlineOffset,
    /// Random pixels replaced with noise
    Noise,
}

impl GlitchKind {
    const ALL: [GlitchKind; 3] = [GlitchKind::ChannelShift, GlitchKind::ScanlineOffset, GlitchKind::Noise];
}

#[derive(Debug, Clone, Copy)]
struct GlitchState {
    kind: GlitchKind,
    started: Instant,
    until: Instant,
}

impl GlitchState {
    /// 1.0 at start, falling to 0.0 at expiry
    fn strength(&self, now: Instant) -> f64 {
        let total = self.until.saturating_duration_since(self.started).as_secs_f64();
        if total <= 0.0 {
            return 0.0;
        }
        let left = self.until.saturating_duration_since(now).as_secs_f64();
        (left / total).clamp(0.0, 1.0)
    }
}

/// Timed per-feed glitch effects
pub struct GlitchRenderer {
    active: HashMap<FeedId, GlitchState>,
    rng: StdRng,
}

impl Default for GlitchRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl GlitchRenderer {
    pub fn new() -> Self {
        Self {
            active: HashMap::new(),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            active: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Start a glitch of `duration` on each feed, replacing any running one
    pub fn start_glitch(&mut self, feeds: &[FeedId], duration: Duration) {
        self.start_glitch_at(feeds, duration, Instant::now());
    }

    pub fn start_glitch_at(&mut self, feeds: &[FeedId], duration: Duration, now: Instant) {
        for feed in feeds {
            let kind = GlitchKind::ALL[self.rng.gen_range(0..GlitchKind::ALL.len())];
            tracing::debug!("Glitch {:?} on {} for {:?}", kind, feed, duration);
            self.active.insert(
                feed.clone(),
                GlitchState {
                    kind,
                    started: now,
                    until: now + duration,
                },
            );
        }
    }

    /// Distort `frame` if `feed` has a running glitch; passthrough otherwise
    pub fn apply(&mut self, feed: &FeedId, frame: Arc<Frame>) -> Arc<Frame> {
        self.apply_at(feed, frame, Instant::now())
    }

    pub fn apply_at(&mut self, feed: &FeedId, frame: Arc<Frame>, now: Instant) -> Arc<Frame> {
        let Some(state) = self.active.get(feed).copied() else {
            return frame;
        };
        if now >= state.until {
            self.active.remove(feed);
            return frame;
        }

        let strength = state.strength(now);
        let out = match state.kind {
            GlitchKind::ChannelShift => channel_shift(&frame, shift_for(strength)),
            GlitchKind::ScanlineOffset => scanline_offset(&frame, shift_for(strength), &mut self.rng),
            GlitchKind::Noise => noise_overlay(&frame, MAX_NOISE * strength, &mut self.rng),
        };
        Arc::new(out)
    }

    pub fn is_active(&self, feed: &FeedId) -> bool {
        self.active.contains_key(feed)
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }
}

fn shift_for(strength: f64) -> usize {
    ((MAX_SHIFT as f64 * strength).round() as usize).max(1)
}

/// Shift red right and blue left by `offset` pixels
pub fn channel_shift(frame: &Frame, offset: usize) -> Frame {
    let (w, h) = frame.dimensions();
    let width = w as usize;
    let mut data = Vec::with_capacity(frame.data().len());
    for y in 0..h {
        let row = frame.row(y);
        for x in 0..width {
            let red_x = x.saturating_sub(offset);
            let blue_x = (x + offset).min(width - 1);
            data.push(row[red_x * BYTES_PER_PIXEL]);
            data.push(row[x * BYTES_PER_PIXEL + 1]);
            data.push(row[blue_x * BYTES_PER_PIXEL + 2]);
        }
    }
    rebuild(frame, data)
}

/// Rotate each band of rows horizontally by a random amount up to `max_offset`
pub fn scanline_offset<R: Rng>(frame: &Frame, max_offset: usize, rng: &mut R) -> Frame {
    let (w, h) = frame.dimensions();
    let width = w as usize;
    if width == 0 {
        return frame.clone();
    }
    let mut data = Vec::with_capacity(frame.data().len());
    let mut offset = 0usize;
    for y in 0..h as usize {
        if y % BAND_HEIGHT == 0 {
            offset = rng.gen_range(0..=max_offset) % width;
        }
        let row = frame.row(y as u32);
        let split = offset * BYTES_PER_PIXEL;
        data.extend_from_slice(&row[row.len() - split..]);
        data.extend_from_slice(&row[..row.len() - split]);
    }
    rebuild(frame, data)
}

/// Replace roughly `fraction` of the pixels with random grey levels
pub fn noise_overlay<R: Rng>(frame: &Frame, fraction: f64, rng: &mut R) -> Frame {
    let fraction = fraction.clamp(0.0, 1.0);
    let mut data = frame.data().to_vec();
    for pixel in data.chunks_exact_mut(BYTES_PER_PIXEL) {
        if rng.gen_bool(fraction) {
            let level: u8 = rng.gen();
            pixel.fill(level);
        }
    }
    rebuild(frame, data)
}

fn rebuild(original: &Frame, data: Vec<u8>) -> Frame {
    let (w, h) = original.dimensions();
    Frame::new(w, h, data).unwrap_or_else(|_| original.clone())
}
