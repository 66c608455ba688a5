//! Running node: loop lifecycle, encode workers and the orchestrator

pub mod lifecycle;
pub mod orchestrator;
pub mod workers;

pub use lifecycle::{LoopHandle, SessionLifecycle};
pub use orchestrator::Orchestrator;
pub use workers::{EncodePool, EncodeQueue, PoolStats};
