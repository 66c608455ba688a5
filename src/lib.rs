//! # LAN Video Mesh
//!
//! Low-latency live camera distribution between a small fixed set of nodes
//! over raw UDP, with switchable single/dual views, randomized transition
//! clips and post-switch glitch effects.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                                  NODE                                     │
//! │                                                                           │
//! │  ┌──────────────┐   ┌──────────────────────┐   ┌──────────────────────┐  │
//! │  │ Capture loop │──▶│ Encode pool (2 thr.) │──▶│ FrameSender          │  │
//! │  │ (rate-limit) │   │ FrameCodec::encode   │   │ chunk + fan-out UDP  │──┼──▶ peers
//! │  └──────┬───────┘   └──────────────────────┘   └──────────────────────┘  │
//! │         │ local frame                                                     │
//! │         ▼                                                                 │
//! │  ┌──────────────┐   ┌──────────────────────┐   ┌──────────────────────┐  │
//! │  │ Local cache  │   │ Per-peer FrameCache  │◀──│ Receive loop         │◀─┼─── peers
//! │  └──────┬───────┘   └──────────┬───────────┘   │ Reassembler          │  │
//! │         │                      │               └──────────────────────┘  │
//! │         ▼                      ▼                                          │
//! │  ┌─────────────────────────────────────────────────────────────────────┐ │
//! │  │ UI loop: input → ViewState → TransitionSession → effects → Display  │ │
//! │  └─────────────────────────────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Datagrams carry `[frame_id u16 | chunk_id u16 | total_chunks u16 | payload]`,
//! all big-endian. Loss and reordering are expected and tolerated.

pub mod app;
pub mod codec;
pub mod config;
pub mod display;
pub mod effects;
pub mod error;
pub mod input;
pub mod media;
pub mod network;
pub mod peers;
pub mod protocol;
pub mod stream;
pub mod transition;
pub mod view;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    use std::time::Duration;

    /// Default UDP port for video streaming
    pub const DEFAULT_UDP_PORT: u16 = 5005;

    /// Default maximum datagram size (header + payload)
    pub const DEFAULT_MAX_DATAGRAM: usize = 1300;

    /// Largest UDP payload an IPv4 socket will accept
    pub const MAX_UDP_PAYLOAD: usize = 65_507;

    /// Default capture resolution
    pub const DEFAULT_FRAME_WIDTH: u32 = 640;
    pub const DEFAULT_FRAME_HEIGHT: u32 = 480;

    /// Default capture rate cap
    pub const DEFAULT_FPS_LIMIT: u32 = 30;

    /// Default codec quality (1-100)
    pub const DEFAULT_QUALITY: u8 = 50;

    /// Per-peer decoded frame history depth
    pub const DEFAULT_CACHE_DEPTH: usize = 5;

    /// Socket receive timeout; bounds how long shutdown waits on the receive loop
    pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(500);

    /// Lifetime of an incomplete reassembly record
    pub const DEFAULT_REASSEMBLY_TIMEOUT: Duration = Duration::from_secs(1);

    /// Default glitch effect duration after a view switch
    pub const DEFAULT_GLITCH_DURATION: Duration = Duration::from_millis(600);

    /// Default chance of playing a transition clip on a switch
    pub const DEFAULT_TRANSITION_PROBABILITY: f64 = 0.5;

    /// Encode/send worker pool size
    pub const ENCODE_WORKERS: usize = 2;

    /// Outstanding encode jobs before capture starts dropping frames
    pub const ENCODE_QUEUE_DEPTH: usize = 4;

    /// UI loop tick interval
    pub const UI_TICK: Duration = Duration::from_millis(10);

    /// Interval between periodic stats log lines
    pub const STATS_INTERVAL: Duration = Duration::from_secs(5);

    /// Capture loop pause when no frame is due
    pub const CAPTURE_IDLE: Duration = Duration::from_millis(1);

    /// How long shutdown waits for each background loop
    pub const LOOP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);
}
