//! Session lifecycle: one cancellation signal shared by every loop

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Cancellation signal plus the means to start loops that observe it
#[derive(Debug, Clone, Default)]
pub struct SessionLifecycle {
    cancelled: Arc<AtomicBool>,
}

impl SessionLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every loop to stop; idempotent
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            tracing::info!("Shutdown requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Run `body` on a named thread.
    ///
    /// The loop signals completion when `body` returns or unwinds.
    pub fn spawn_loop<F>(&self, name: &str, body: F) -> std::io::Result<LoopHandle>
    where
        F: FnOnce(SessionLifecycle) + Send + 'static,
    {
        let (done_tx, done_rx) = bounded(1);
        let lifecycle = self.clone();
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            let _done = Completion(done_tx);
            body(lifecycle);
        })?;

        tracing::debug!("Started {} loop", name);
        Ok(LoopHandle {
            name: name.to_string(),
            handle: Some(handle),
            done: done_rx,
        })
    }
}

/// Sends the completion signal on drop, including during a panic
struct Completion(Sender<()>);

impl Drop for Completion {
    fn drop(&mut self) {
        let _ = self.0.try_send(());
    }
}

/// Join side of a running loop
pub struct LoopHandle {
    name: String,
    handle: Option<JoinHandle<()>>,
    done: Receiver<()>,
}

impl LoopHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map(|h| h.is_finished()).unwrap_or(true)
    }

    /// Wait up to `timeout` for the loop to finish, then join it.
    ///
    /// Returns `false` if the loop did not finish in time; its thread is then
    /// left detached.
    pub fn join(mut self, timeout: Duration) -> bool {
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        tracing::error!("{} loop panicked", self.name);
                    }
                }
                tracing::debug!("{} loop stopped", self.name);
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!("{} loop did not stop within {:?}", self.name, timeout);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_cancel_stops_loop() {
        let lifecycle = SessionLifecycle::new();
        let iterations = Arc::new(AtomicUsize::new(0));
        let counter = iterations.clone();

        let handle = lifecycle
            .spawn_loop("test", move |lc| {
                while !lc.is_cancelled() {
                    counter.fetch_add(1, Ordering::Relaxed);
                    thread::sleep(Duration::from_millis(1));
                }
            })
            .unwrap();

        thread::sleep(Duration::from_millis(20));
        assert!(!handle.is_finished());
        lifecycle.cancel();
        lifecycle.cancel();
        assert!(handle.join(Duration::from_secs(2)));
        assert!(iterations.load(Ordering::Relaxed) > 0);
    }

    #[test]
    fn test_join_times_out_on_stuck_loop() {
        let lifecycle = SessionLifecycle::new();
        let handle = lifecycle
            .spawn_loop("stuck", |_| thread::sleep(Duration::from_millis(300)))
            .unwrap();
        assert!(!handle.join(Duration::from_millis(10)));
    }

    #[test]
    fn test_panicking_loop_still_completes() {
        let lifecycle = SessionLifecycle::new();
        let handle = lifecycle.spawn_loop("panics", |_| panic!("boom")).unwrap();
        assert!(handle.join(Duration::from_secs(2)));
    }
}
