//! Operator input: key bindings and hardware buttons
//!
//! Keys polled from the display and keys injected by the button listener
//! land in the same place and are handled identically by the UI loop.

pub mod buttons;
pub mod keys;

pub use buttons::ButtonListener;
pub use keys::{KeyAction, KeyBindings};

use crossbeam::queue::ArrayQueue;
use std::sync::Arc;

/// Keys waiting for the UI loop before new ones are dropped
pub const KEY_QUEUE_CAPACITY: usize = 64;

/// Producer side of the asynchronous key queue
#[derive(Clone)]
pub struct KeyInjector {
    queue: Arc<ArrayQueue<u8>>,
}

impl KeyInjector {
    /// Queue a key code; dropped if the queue is full
    pub fn inject(&self, code: u8) {
        if self.queue.push(code).is_err() {
            tracing::warn!("Key queue full, dropping key {:?}", code as char);
        }
    }
}

/// Consumer side, owned by the UI loop
pub struct KeyQueue {
    queue: Arc<ArrayQueue<u8>>,
}

impl KeyQueue {
    /// Next queued key code, if any, without blocking
    pub fn try_next(&self) -> Option<u8> {
        self.queue.pop()
    }
}

/// Create a connected injector/queue pair
pub fn key_queue() -> (KeyInjector, KeyQueue) {
    let queue = Arc::new(ArrayQueue::new(KEY_QUEUE_CAPACITY));
    (KeyInjector { queue: queue.clone() }, KeyQueue { queue })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_queue_fifo() {
        let (injector, queue) = key_queue();
        assert_eq!(queue.try_next(), None);

        injector.inject(b'1');
        injector.clone().inject(b'q');
        assert_eq!(queue.try_next(), Some(b'1'));
        assert_eq!(queue.try_next(), Some(b'q'));
        assert_eq!(queue.try_next(), None);
    }

    #[test]
    fn test_key_queue_drops_when_full() {
        let (injector, queue) = key_queue();
        for _ in 0..KEY_QUEUE_CAPACITY + 10 {
            injector.inject(b'm');
        }
        let drained = std::iter::from_fn(|| queue.try_next()).count();
        assert_eq!(drained, KEY_QUEUE_CAPACITY);
    }
}
