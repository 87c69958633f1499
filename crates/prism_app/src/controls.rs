use glam::Vec3;
use prism_core::Transform;
use prism_window::Input;
use winit::keyboard::KeyCode;

/// Radians per second for the arrow key look.
const LOOK_SPEED: f32 = 1.5;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    MoreLights,
    FewerLights,
    ToggleMode,
}

pub fn commands(input: &Input) -> Vec<Command> {
    let mut out = Vec::new();
    if input.just_pressed(KeyCode::Equal) || input.just_pressed(KeyCode::NumpadAdd) {
        out.push(Command::MoreLights);
    }
    if input.just_pressed(KeyCode::Minus) || input.just_pressed(KeyCode::NumpadSubtract) {
        out.push(Command::FewerLights);
    }
    if input.just_pressed(KeyCode::KeyT) {
        out.push(Command::ToggleMode);
    }
    out
}

/// Next requested light count; the renderer clamps the upper end.
pub fn step_light_count(current: u32, step: u32, command: Command) -> u32 {
    match command {
        Command::MoreLights => current.saturating_add(step),
        Command::FewerLights => current.saturating_sub(step),
        Command::ToggleMode => current,
    }
}

/// WASD moves, Q/E sink and rise, arrow keys turn.
pub fn fly_camera(transform: &mut Transform, input: &Input, speed: f32, dt: f32) {
    let forward = transform.forward();
    let right = transform.right();

    let mut direction = Vec3::ZERO;
    if input.is_pressed(KeyCode::KeyW) {
        direction += forward;
    }
    if input.is_pressed(KeyCode::KeyS) {
        direction -= forward;
    }
    if input.is_pressed(KeyCode::KeyD) {
        direction += right;
    }
    if input.is_pressed(KeyCode::KeyA) {
        direction -= right;
    }
    if input.is_pressed(KeyCode::KeyE) {
        direction += Vec3::Y;
    }
    if input.is_pressed(KeyCode::KeyQ) {
        direction -= Vec3::Y;
    }
    transform.translation += direction.normalize_or_zero() * speed * dt;

    let turn = LOOK_SPEED * dt;
    if input.is_pressed(KeyCode::ArrowLeft) {
        transform.rotate_y(turn);
    }
    if input.is_pressed(KeyCode::ArrowRight) {
        transform.rotate_y(-turn);
    }
    if input.is_pressed(KeyCode::ArrowUp) {
        transform.rotate_local_x(turn);
    }
    if input.is_pressed(KeyCode::ArrowDown) {
        transform.rotate_local_x(-turn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn light_count_never_wraps() {
        assert_eq!(step_light_count(50, 100, Command::FewerLights), 0);
        assert_eq!(step_light_count(u32::MAX - 1, 100, Command::MoreLights), u32::MAX);
        assert_eq!(step_light_count(100, 100, Command::MoreLights), 200);
    }

    #[test]
    fn forward_key_moves_along_view_direction() {
        let mut transform = Transform::default();
        let mut input = Input::default();
        input.press(KeyCode::KeyW);
        fly_camera(&mut transform, &input, 5.0, 0.5);
        assert_relative_eq!(transform.translation.z, -2.5, epsilon = 1e-5);
        assert_relative_eq!(transform.translation.x, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn diagonal_is_not_faster() {
        let mut transform = Transform::default();
        let mut input = Input::default();
        input.press(KeyCode::KeyW);
        input.press(KeyCode::KeyD);
        fly_camera(&mut transform, &input, 1.0, 1.0);
        assert_relative_eq!(transform.translation.length(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn toggle_fires_on_press_only() {
        let mut input = Input::default();
        input.press(KeyCode::KeyT);
        assert_eq!(commands(&input), vec![Command::ToggleMode]);
        input.end_frame();
        assert!(commands(&input).is_empty());
    }
}
