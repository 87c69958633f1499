use std::collections::HashSet;

use winit::keyboard::KeyCode;

/// Keyboard state for the current frame.
#[derive(Debug, Default)]
pub struct Input {
    pressed: HashSet<KeyCode>,
    just_pressed: HashSet<KeyCode>,
}

impl Input {
    pub fn press(&mut self, key: KeyCode) {
        // key repeat reports Pressed again while held
        if self.pressed.insert(key) {
            self.just_pressed.insert(key);
        }
    }

    pub fn release(&mut self, key: KeyCode) {
        self.pressed.remove(&key);
    }

    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.pressed.contains(&key)
    }

    /// True only on the first frame the key is down.
    pub fn just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed.contains(&key)
    }

    pub fn end_frame(&mut self) {
        self.just_pressed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_key_fires_once() {
        let mut input = Input::default();
        input.press(KeyCode::KeyW);
        assert!(input.just_pressed(KeyCode::KeyW));
        input.end_frame();

        input.press(KeyCode::KeyW);
        assert!(input.is_pressed(KeyCode::KeyW));
        assert!(!input.just_pressed(KeyCode::KeyW));

        input.release(KeyCode::KeyW);
        assert!(!input.is_pressed(KeyCode::KeyW));
        input.press(KeyCode::KeyW);
        assert!(input.just_pressed(KeyCode::KeyW));
    }
}
