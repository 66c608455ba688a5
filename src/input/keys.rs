//! Key code to action bindings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Abstract action a key can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    Quit,
    RotateView,
    /// Cut a playing transition clip short
    Skip,
}

/// Mapping from key codes to actions
#[derive(Debug, Clone, Default)]
pub struct KeyBindings {
    map: HashMap<u8, KeyAction>,
}

impl KeyBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, code: u8, action: KeyAction) {
        self.map.insert(code, action);
    }

    pub fn with(mut self, code: u8, action: KeyAction) -> Self {
        self.bind(code, action);
        self
    }

    pub fn action(&self, code: u8) -> Option<KeyAction> {
        self.map.get(&code).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bindings_lookup() {
        let bindings = KeyBindings::new()
            .with(b'q', KeyAction::Quit)
            .with(b'm', KeyAction::RotateView);

        assert_eq!(bindings.action(b'q'), Some(KeyAction::Quit));
        assert_eq!(bindings.action(b'm'), Some(KeyAction::RotateView));
        assert_eq!(bindings.action(b'z'), None);
    }
}
