//! View state machine
//!
//! ```text
//!            rotate                rotate
//!  SINGLE(p1) ─────▶ SINGLE(p2) ─────▶ DUAL ──┐
//!      ▲                                      │ rotate
//!      └──────────────────────────────────────┘
//!
//!  one remote peer:  SINGLE(p1) ◀──rotate──▶ SINGLE(local)
//!
//!  any switch with a clip armed:  ──▶ TRANSITION ──clip done/skip──▶ pending view
//! ```
//!
//! Owned and mutated only by the UI loop.

use std::net::IpAddr;

use crate::input::keys::{KeyAction, KeyBindings};
use crate::peers::{FeedId, PeerDirectory, PeerId, PeerInfo};

/// Which feed(s) are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Single,
    Dual,
    /// A transition clip is playing; a pending view waits for it
    Transition,
}

/// What the UI loop should do in response to a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    Switch { mode: ViewMode, target: Option<FeedId> },
    /// Cut the playing transition clip short
    Skip,
    None,
}

/// View requested while a transition clip plays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingView {
    pub mode: ViewMode,
    pub target: Option<FeedId>,
}

/// Current view plus the rules for moving between views
#[derive(Debug, Clone)]
pub struct ViewState {
    self_id: PeerId,
    directory: PeerDirectory,
    bindings: KeyBindings,
    other_ids: Vec<PeerId>,
    toggle_with_local: bool,
    mode: ViewMode,
    single_target: Option<FeedId>,
    pending: Option<PendingView>,
}

impl ViewState {
    pub fn new(self_id: PeerId, directory: PeerDirectory, bindings: KeyBindings) -> Self {
        let other_ids = directory.others(&self_id);
        let toggle_with_local = other_ids.len() == 1;

        let single_target = match other_ids.first() {
            Some(first) => Some(FeedId::Remote(first.clone())),
            None if toggle_with_local => Some(FeedId::LocalCamera),
            None => None,
        };

        Self {
            self_id,
            directory,
            bindings,
            other_ids,
            toggle_with_local,
            mode: ViewMode::Single,
            single_target,
            pending: None,
        }
    }

    /// Translate a key code into an action
    pub fn handle_key(&self, code: u8) -> Action {
        match self.bindings.action(code) {
            Some(KeyAction::Quit) => Action::Quit,
            Some(KeyAction::RotateView) => match self.compute_next_view() {
                Some((mode, target)) => Action::Switch { mode, target },
                None => Action::None,
            },
            Some(KeyAction::Skip) if self.mode == ViewMode::Transition => Action::Skip,
            _ => Action::None,
        }
    }

    /// The view a rotation would move to, without changing anything.
    ///
    /// `None` means rotation is a no-op: no peers, or a clip is playing.
    pub fn compute_next_view(&self) -> Option<(ViewMode, Option<FeedId>)> {
        let num_peers = self.other_ids.len();
        if num_peers == 0 {
            return None;
        }

        match self.mode {
            ViewMode::Single => {
                let idx = self.single_index().unwrap_or(0);
                if num_peers >= 2 && idx == 0 {
                    Some((ViewMode::Single, Some(FeedId::Remote(self.other_ids[1].clone()))))
                } else if num_peers >= 2 {
                    Some((ViewMode::Dual, None))
                } else if self.toggle_with_local {
                    let first = FeedId::Remote(self.other_ids[0].clone());
                    let next = if self.single_target.as_ref() == Some(&first) {
                        FeedId::LocalCamera
                    } else {
                        first
                    };
                    Some((ViewMode::Single, Some(next)))
                } else {
                    None
                }
            }
            ViewMode::Dual => Some((ViewMode::Single, Some(FeedId::Remote(self.other_ids[0].clone())))),
            ViewMode::Transition => None,
        }
    }

    /// Index of the current single target among the remote peers
    fn single_index(&self) -> Option<usize> {
        match &self.single_target {
            Some(FeedId::Remote(id)) => self.other_ids.iter().position(|p| p == id),
            _ => None,
        }
    }

    /// Remember `mode`/`target` and enter TRANSITION until the clip ends
    pub fn queue_pending_view(&mut self, mode: ViewMode, target: Option<FeedId>) {
        self.pending = Some(PendingView { mode, target });
        self.mode = ViewMode::Transition;
    }

    /// Switch immediately
    pub fn activate_view(&mut self, mode: ViewMode, target: Option<FeedId>) {
        self.mode = mode;
        if mode == ViewMode::Single {
            if self.is_valid_target(target.as_ref()) {
                self.single_target = target;
            } else {
                tracing::warn!("Ignoring invalid single-view target {:?}", target);
            }
        }
    }

    /// Activate the queued view, if any; a no-op otherwise
    pub fn activate_pending_view(&mut self) {
        if let Some(PendingView { mode, target }) = self.pending.take() {
            self.activate_view(mode, target);
        }
    }

    fn is_valid_target(&self, target: Option<&FeedId>) -> bool {
        match target {
            None => true,
            Some(FeedId::LocalCamera) => self.toggle_with_local,
            Some(FeedId::Remote(id)) => self.other_ids.contains(id),
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn single_target(&self) -> Option<&FeedId> {
        self.single_target.as_ref()
    }

    pub fn pending(&self) -> Option<&PendingView> {
        self.pending.as_ref()
    }

    pub fn other_ids(&self) -> &[PeerId] {
        &self.other_ids
    }

    pub fn toggle_with_local(&self) -> bool {
        self.toggle_with_local
    }

    pub fn self_info(&self) -> Option<&PeerInfo> {
        self.directory.get(&self.self_id)
    }

    /// Address of the single-view feed; the local camera is this node
    pub fn current_single_address(&self) -> Option<IpAddr> {
        match &self.single_target {
            Some(FeedId::Remote(id)) => self.directory.get(id).map(|p| p.address),
            Some(FeedId::LocalCamera) => self.self_info().map(|p| p.address),
            None => None,
        }
    }

    /// Display name of the single-view feed
    pub fn current_single_name(&self) -> String {
        let id = match &self.single_target {
            Some(FeedId::Remote(id)) => id,
            Some(FeedId::LocalCamera) => &self.self_id,
            None => return "N/A".to_string(),
        };
        self.directory
            .name_of(id)
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string())
    }

    /// The first two remote peers, shown side by side in DUAL
    pub fn dual_targets(&self) -> Vec<&PeerInfo> {
        self.other_ids
            .iter()
            .take(2)
            .filter_map(|id| self.directory.get(id))
            .collect()
    }

    /// Feeds currently on screen
    pub fn on_screen_feeds(&self) -> Vec<FeedId> {
        match self.mode {
            ViewMode::Single => self.single_target.iter().cloned().collect(),
            ViewMode::Dual => self
                .dual_targets()
                .into_iter()
                .map(|p| FeedId::Remote(p.id.clone()))
                .collect(),
            ViewMode::Transition => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROTATE: u8 = b'm';
    const QUIT: u8 = b'q';
    const SKIP: u8 = b's';

    fn peer(id: &str, octet: u8) -> PeerInfo {
        PeerInfo {
            id: PeerId::new(id),
            address: [10, 0, 0, octet].into(),
            name: format!("Name_{}", id),
        }
    }

    fn state(ids: &[&str]) -> ViewState {
        let peers = ids.iter().enumerate().map(|(i, id)| peer(id, i as u8 + 1)).collect();
        let bindings = KeyBindings::new()
            .with(ROTATE, KeyAction::RotateView)
            .with(QUIT, KeyAction::Quit)
            .with(SKIP, KeyAction::Skip);
        ViewState::new(PeerId::new("me"), PeerDirectory::new(peers), bindings)
    }

    fn remote(id: &str) -> Option<FeedId> {
        Some(FeedId::Remote(PeerId::new(id)))
    }

    /// Rotate and apply the result directly
    fn rotate(s: &mut ViewState) -> (ViewMode, Option<FeedId>) {
        match s.handle_key(ROTATE) {
            Action::Switch { mode, target } => {
                s.activate_view(mode, target.clone());
                (mode, target)
            }
            other => panic!("expected switch, got {:?}", other),
        }
    }

    #[test]
    fn test_initial_state() {
        let s = state(&["me", "p1", "p2"]);
        assert_eq!(s.mode(), ViewMode::Single);
        assert_eq!(s.single_target().cloned(), remote("p1"));
        assert!(!s.toggle_with_local());
        assert_eq!(s.other_ids(), &[PeerId::new("p1"), PeerId::new("p2")]);

        let alone = state(&["me"]);
        assert_eq!(alone.single_target(), None);
        assert!(!alone.toggle_with_local());
    }

    #[test]
    fn test_two_peer_cycle() {
        let mut s = state(&["me", "p1", "p2"]);
        assert_eq!(rotate(&mut s), (ViewMode::Single, remote("p2")));
        assert_eq!(rotate(&mut s), (ViewMode::Dual, None));
        assert_eq!(s.single_target().cloned(), remote("p2"));
        assert_eq!(rotate(&mut s), (ViewMode::Single, remote("p1")));
        assert_eq!(rotate(&mut s), (ViewMode::Single, remote("p2")));
    }

    #[test]
    fn test_single_peer_toggles_with_local() {
        let mut s = state(&["p1", "me"]);
        assert!(s.toggle_with_local());
        assert_eq!(s.single_target().cloned(), remote("p1"));

        assert_eq!(rotate(&mut s), (ViewMode::Single, Some(FeedId::LocalCamera)));
        assert_eq!(s.current_single_name(), "Name_me");
        assert_eq!(rotate(&mut s), (ViewMode::Single, remote("p1")));
        assert_eq!(rotate(&mut s), (ViewMode::Single, Some(FeedId::LocalCamera)));
    }

    #[test]
    fn test_rotate_without_peers_is_noop() {
        let s = state(&["me"]);
        assert_eq!(s.compute_next_view(), None);
        assert_eq!(s.handle_key(ROTATE), Action::None);
    }

    #[test]
    fn test_rotation_locked_during_transition() {
        let mut s = state(&["me", "p1", "p2"]);
        s.queue_pending_view(ViewMode::Dual, None);
        assert_eq!(s.compute_next_view(), None);
        assert_eq!(s.handle_key(ROTATE), Action::None);
    }

    #[test]
    fn test_compute_next_view_is_pure() {
        let s = state(&["me", "p1", "p2"]);
        let before = (s.mode(), s.single_target().cloned());
        let first = s.compute_next_view();
        let second = s.compute_next_view();
        assert_eq!(first, second);
        assert_eq!((s.mode(), s.single_target().cloned()), before);
    }

    #[test]
    fn test_unknown_target_treated_as_first() {
        let mut s = state(&["me", "p1", "p2"]);
        s.single_target = remote("ghost");
        assert_eq!(s.compute_next_view(), Some((ViewMode::Single, remote("p2"))));
    }

    #[test]
    fn test_pending_view_lifecycle() {
        let mut s = state(&["me", "p1", "p2"]);
        s.queue_pending_view(ViewMode::Dual, None);
        assert_eq!(s.mode(), ViewMode::Transition);
        assert!(s.pending().is_some());
        assert!(s.on_screen_feeds().is_empty());

        s.activate_pending_view();
        assert_eq!(s.mode(), ViewMode::Dual);
        assert!(s.pending().is_none());

        s.activate_pending_view();
        assert_eq!(s.mode(), ViewMode::Dual);
    }

    #[test]
    fn test_handle_key_actions() {
        let mut s = state(&["me", "p1", "p2"]);
        assert_eq!(s.handle_key(QUIT), Action::Quit);
        assert_eq!(s.handle_key(b'?'), Action::None);
        assert_eq!(s.handle_key(SKIP), Action::None);

        s.queue_pending_view(ViewMode::Single, remote("p2"));
        assert_eq!(s.handle_key(SKIP), Action::Skip);
        assert_eq!(s.handle_key(QUIT), Action::Quit);
    }

    #[test]
    fn test_invalid_targets_rejected() {
        let mut s = state(&["me", "p1", "p2"]);
        s.activate_view(ViewMode::Single, Some(FeedId::LocalCamera));
        assert_eq!(s.single_target().cloned(), remote("p1"));
        s.activate_view(ViewMode::Single, remote("ghost"));
        assert_eq!(s.single_target().cloned(), remote("p1"));
    }

    #[test]
    fn test_on_screen_feeds() {
        let mut s = state(&["me", "p1", "p2", "p3"]);
        assert_eq!(s.on_screen_feeds(), vec![FeedId::Remote(PeerId::new("p1"))]);

        s.activate_view(ViewMode::Dual, None);
        assert_eq!(
            s.on_screen_feeds(),
            vec![FeedId::Remote(PeerId::new("p1")), FeedId::Remote(PeerId::new("p2"))]
        );

        s.activate_view(ViewMode::Single, None);
        assert!(s.on_screen_feeds().is_empty());
        assert_eq!(s.current_single_name(), "N/A");
        assert_eq!(s.current_single_address(), None);
    }

    #[test]
    fn test_single_accessors() {
        let s = state(&["me", "p1"]);
        assert_eq!(s.current_single_name(), "Name_p1");
        assert_eq!(s.current_single_address(), Some([10, 0, 0, 2].into()));
        assert_eq!(s.dual_targets().len(), 1);
    }
}
