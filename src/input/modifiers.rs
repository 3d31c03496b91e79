//! Modifier press/release tracking
//!
//! The engine interrogates this tracker before layout lookup (to compute the
//! shift state) and before toggle evaluation (to match chords). Autorepeat is
//! treated as press; setting an already-latched flag again is a no-op.

use std::collections::HashMap;

use crate::constants::{
    KEY_LEFTALT, KEY_LEFTCTRL, KEY_LEFTMETA, KEY_LEFTSHIFT, KEY_RIGHTALT, KEY_RIGHTCTRL,
    KEY_RIGHTMETA, KEY_RIGHTSHIFT,
};

/// Both shift keys
pub const SHIFT_KEYS: [u16; 2] = [KEY_LEFTSHIFT, KEY_RIGHTSHIFT];

/// Both control keys
pub const CTRL_KEYS: [u16; 2] = [KEY_LEFTCTRL, KEY_RIGHTCTRL];

/// Both alt keys
pub const ALT_KEYS: [u16; 2] = [KEY_LEFTALT, KEY_RIGHTALT];

/// Both meta keys
pub const META_KEYS: [u16; 2] = [KEY_LEFTMETA, KEY_RIGHTMETA];

/// Every standard modifier the tracker seeds by default
pub const MODIFIER_KEYS: [u16; 8] = [
    KEY_LEFTSHIFT,
    KEY_RIGHTSHIFT,
    KEY_LEFTCTRL,
    KEY_RIGHTCTRL,
    KEY_LEFTALT,
    KEY_RIGHTALT,
    KEY_LEFTMETA,
    KEY_RIGHTMETA,
];

/// Modifiers that are always forwarded to the host even while composing,
/// so shortcuts like Ctrl+C keep working
pub const ALWAYS_FORWARD: [u16; 6] = [
    KEY_LEFTCTRL,
    KEY_RIGHTCTRL,
    KEY_LEFTALT,
    KEY_RIGHTALT,
    KEY_LEFTMETA,
    KEY_RIGHTMETA,
];

/// Boolean press state per tracked keycode
#[derive(Debug, Default)]
pub struct ModifierTracker {
    state: HashMap<u16, bool>,
}

impl ModifierTracker {
    /// New tracker seeded with the standard modifier keys.
    pub fn new() -> Self {
        let mut tracker = Self {
            state: HashMap::new(),
        };
        for code in MODIFIER_KEYS {
            tracker.state.insert(code, false);
        }
        tracker
    }

    /// Register an additional keycode (chord modifiers beyond the standard
    /// set) so it is routed through modifier handling.
    pub fn track(&mut self, code: u16) {
        self.state.entry(code).or_insert(false);
    }

    /// Whether this keycode participates in modifier handling.
    pub fn is_tracked(&self, code: u16) -> bool {
        self.state.contains_key(&code)
    }

    /// Record a press or release.
    pub fn set(&mut self, code: u16, pressed: bool) {
        if let Some(flag) = self.state.get_mut(&code) {
            *flag = pressed;
        }
    }

    pub fn is_down(&self, code: u16) -> bool {
        self.state.get(&code).copied().unwrap_or(false)
    }

    /// True when at least one key of the set is held.
    pub fn is_any_down(&self, codes: &[u16]) -> bool {
        codes.iter().any(|code| self.is_down(*code))
    }

    /// True when every group has at least one of its members held.
    /// An empty group list is trivially satisfied.
    pub fn groups_all_satisfied(&self, groups: &[Vec<u16>]) -> bool {
        groups.iter().all(|group| self.is_any_down(group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::KEY_CAPSLOCK;

    #[test]
    fn press_and_release_flip_state() {
        let mut tracker = ModifierTracker::new();
        assert!(!tracker.is_down(KEY_LEFTSHIFT));
        tracker.set(KEY_LEFTSHIFT, true);
        assert!(tracker.is_down(KEY_LEFTSHIFT));
        tracker.set(KEY_LEFTSHIFT, true); // autorepeat does not re-flip
        assert!(tracker.is_down(KEY_LEFTSHIFT));
        tracker.set(KEY_LEFTSHIFT, false);
        assert!(!tracker.is_down(KEY_LEFTSHIFT));
    }

    #[test]
    fn untracked_keys_are_ignored() {
        let mut tracker = ModifierTracker::new();
        tracker.set(KEY_CAPSLOCK, true);
        assert!(!tracker.is_down(KEY_CAPSLOCK));
        tracker.track(KEY_CAPSLOCK);
        tracker.set(KEY_CAPSLOCK, true);
        assert!(tracker.is_down(KEY_CAPSLOCK));
    }

    #[test]
    fn chord_groups_need_one_member_each() {
        let mut tracker = ModifierTracker::new();
        let groups = vec![SHIFT_KEYS.to_vec(), CTRL_KEYS.to_vec()];
        assert!(!tracker.groups_all_satisfied(&groups));
        tracker.set(KEY_RIGHTSHIFT, true);
        assert!(!tracker.groups_all_satisfied(&groups));
        tracker.set(KEY_LEFTCTRL, true);
        assert!(tracker.groups_all_satisfied(&groups));
        assert!(tracker.groups_all_satisfied(&[]));
    }
}
