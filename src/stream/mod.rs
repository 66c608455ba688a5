//! Frame reassembly and per-peer feeds
//!
//! The receive loop owns the [`Reassembler`]; the UI loop only ever touches
//! the [`FeedCaches`] handle it shares with it.

pub mod feeds;
pub mod reassembler;

pub use feeds::FeedCaches;
pub use reassembler::{ProcessOutcome, Reassembler, ReassemblyStats, RejectReason};
