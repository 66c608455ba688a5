//! View orchestration state

pub mod state;

pub use state::{Action, PendingView, ViewMode, ViewState};
