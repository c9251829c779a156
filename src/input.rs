use std::collections::HashSet;

use glam::Vec2;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Identifier for a physical keyboard key used by the runtime bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
    Digit(u8),
}

/// The keys the runtime binds: digits toggle layers, letters drive the clip
/// plane, arrows nudge its offset, Tab advances the quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Tab,
    Escape,
    Left,
    Right,
    Up,
    Down,
}

/// Identifier for a mouse button (left button is zero). The index is u16 so
/// every extra button the window system reports stays distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MouseButton(u16);

impl MouseButton {
    pub const LEFT: Self = Self(0);

    pub fn new(index: u16) -> Self {
        Self(index)
    }

    pub fn index(self) -> u16 {
        self.0
    }
}

/// Thread-safe input snapshot read by the frame loop.
///
/// Event handlers write into it as winit delivers events; the redraw path
/// reads the latest pointer position for hover picking and held keys for
/// continuous clip-offset nudging.
#[derive(Debug, Default)]
pub struct InputState {
    keys: RwLock<HashSet<KeyCode>>,
    mouse_buttons: RwLock<HashSet<MouseButton>>,
    pointer: RwLock<Vec2>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key_down(&self, key: KeyCode) {
        self.keys.write().insert(key);
    }

    pub fn set_key_up(&self, key: KeyCode) {
        self.keys.write().remove(&key);
    }

    pub fn set_mouse_button_down(&self, button: MouseButton) {
        self.mouse_buttons.write().insert(button);
    }

    pub fn set_mouse_button_up(&self, button: MouseButton) {
        self.mouse_buttons.write().remove(&button);
    }

    pub fn set_pointer(&self, position: Vec2) {
        *self.pointer.write() = position;
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.read().contains(&key)
    }

    pub fn is_mouse_button_down(&self, button: MouseButton) -> bool {
        self.mouse_buttons.read().contains(&button)
    }

    pub fn pointer(&self) -> Vec2 {
        *self.pointer.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_state_tracks_keys() {
        let state = InputState::new();
        state.set_key_down(KeyCode::Named(NamedKey::Left));
        assert!(state.is_key_down(KeyCode::Named(NamedKey::Left)));
        state.set_key_up(KeyCode::Named(NamedKey::Left));
        assert!(!state.is_key_down(KeyCode::Named(NamedKey::Left)));
    }

    #[test]
    fn pointer_snapshot_updates() {
        let state = InputState::new();
        assert_eq!(state.pointer(), Vec2::ZERO);
        state.set_pointer(Vec2::new(640.0, 360.0));
        assert_eq!(state.pointer(), Vec2::new(640.0, 360.0));
    }

    #[test]
    fn mouse_buttons_track_press_state() {
        let state = InputState::new();
        state.set_mouse_button_down(MouseButton::LEFT);
        assert!(state.is_mouse_button_down(MouseButton::LEFT));
        assert!(!state.is_mouse_button_down(MouseButton::new(1)));
        state.set_mouse_button_up(MouseButton::LEFT);
        assert!(!state.is_mouse_button_down(MouseButton::LEFT));
        assert_eq!(MouseButton::new(2).index(), 2);
    }

    #[test]
    fn high_button_indices_do_not_alias() {
        // 300 and 44 collide modulo 256; they must stay distinct buttons.
        let state = InputState::new();
        state.set_mouse_button_down(MouseButton::new(300));
        assert!(!state.is_mouse_button_down(MouseButton::new(44)));
        assert_ne!(MouseButton::new(300), MouseButton::new(44));
    }
}
