//! Display without a window
//!
//! Composes every scene exactly as a windowed backend would and reports it
//! through tracing. Keys come from any byte stream (stdin in the node
//! binary), read on a background thread.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::io::Read;
use std::thread;

use crate::display::{compose_dual, placeholder, Display, PLACEHOLDER_SIZE};
use crate::error::MediaError;
use crate::media::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneKind {
    Single,
    Dual,
    Fullscreen,
}

/// Last composed picture
#[derive(Debug, Clone)]
pub struct Scene {
    pub kind: SceneKind,
    pub caption: String,
    pub frame: Frame,
}

pub struct HeadlessDisplay {
    title: String,
    keys: Option<Receiver<u8>>,
    last: Option<Scene>,
    frames_rendered: u64,
    closed: bool,
}

impl HeadlessDisplay {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            keys: None,
            last: None,
            frames_rendered: 0,
            closed: false,
        }
    }

    /// Read key bytes from `source` on a background thread.
    ///
    /// Line endings are dropped. The thread ends at EOF or once the display
    /// is gone.
    pub fn with_key_source<R>(mut self, source: R) -> Result<Self, MediaError>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = unbounded();
        thread::Builder::new()
            .name("display-keys".to_string())
            .spawn(move || read_keys(source, tx))
            .map_err(|e| MediaError::Spawn(e.to_string()))?;
        self.keys = Some(rx);
        Ok(self)
    }

    pub fn last_scene(&self) -> Option<&Scene> {
        self.last.as_ref()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    fn present(&mut self, kind: SceneKind, caption: String, frame: Frame) {
        if self.closed {
            return;
        }
        let changed = self
            .last
            .as_ref()
            .map(|s| s.kind != kind || s.caption != caption)
            .unwrap_or(true);
        if changed {
            tracing::info!("{} - {} ({}x{})", self.title, caption, frame.width(), frame.height());
        }
        tracing::trace!("Rendered {:?} frame {}", kind, self.frames_rendered);

        self.frames_rendered += 1;
        self.last = Some(Scene { kind, caption, frame });
    }
}

impl Display for HeadlessDisplay {
    fn show_single(&mut self, frame: Option<&Frame>, name: &str) {
        match frame {
            Some(frame) => self.present(SceneKind::Single, name.to_string(), frame.clone()),
            None => {
                let (w, h) = PLACEHOLDER_SIZE;
                self.present(SceneKind::Single, format!("Waiting {}", name), placeholder(w, h));
            }
        }
    }

    fn show_dual(&mut self, left: Option<&Frame>, left_name: &str, right: Option<&Frame>, right_name: &str) {
        let (w, h) = PLACEHOLDER_SIZE;
        let left_label = if left.is_some() { left_name.to_string() } else { format!("No {}", left_name) };
        let right_label = if right.is_some() { right_name.to_string() } else { format!("No {}", right_name) };
        let left = left.cloned().unwrap_or_else(|| placeholder(w, h));
        let right = right.cloned().unwrap_or_else(|| placeholder(w, h));

        self.present(
            SceneKind::Dual,
            format!("{} | {}", left_label, right_label),
            compose_dual(&left, &right),
        );
    }

    fn show_fullscreen(&mut self, frame: Option<&Frame>) {
        let (w, h) = PLACEHOLDER_SIZE;
        let frame = frame.cloned().unwrap_or_else(|| Frame::black(w, h));
        self.present(SceneKind::Fullscreen, "transition".to_string(), frame);
    }

    fn poll_key(&mut self) -> Option<u8> {
        self.keys.as_ref().and_then(|rx| rx.try_recv().ok())
    }

    fn close(&mut self) {
        if !self.closed {
            tracing::info!("{} closed after {} frames", self.title, self.frames_rendered);
            self.closed = true;
            self.keys = None;
        }
    }
}

fn read_keys<R: Read>(source: R, tx: Sender<u8>) {
    for byte in source.bytes() {
        match byte {
            Ok(b'\n') | Ok(b'\r') => continue,
            Ok(code) => {
                if tx.send(code).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!("Key input error: {}", e);
                break;
            }
        }
    }
}
