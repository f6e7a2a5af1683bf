//! Held keys and mouse drags folded into one `CameraInput` per frame.

use std::collections::HashSet;

use glam::{Vec2, Vec3};
use winit::event::{ElementState, MouseButton};
use winit::keyboard::KeyCode;

use glsandbox_engine::camera::CameraInput;

#[derive(Debug, Default)]
pub struct InputState {
    held: HashSet<KeyCode>,
    dragging: bool,
    cursor: Option<Vec2>,
    drag: Vec2,
}

fn axis(neg: bool, pos: bool) -> f32 {
    (pos as i32 - neg as i32) as f32
}

impl InputState {
    pub fn key(&mut self, code: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                self.held.insert(code);
            }
            ElementState::Released => {
                self.held.remove(&code);
            }
        }
    }

    pub fn mouse_button(&mut self, button: MouseButton, state: ElementState) {
        if button == MouseButton::Left {
            self.dragging = state == ElementState::Pressed;
        }
    }

    pub fn cursor_moved(&mut self, x: f64, y: f64) {
        let pos = Vec2::new(x as f32, y as f32);
        if let (true, Some(prev)) = (self.dragging, self.cursor) {
            self.drag += pos - prev;
        }
        self.cursor = Some(pos);
    }

    /// Focus lost: nothing stays held.
    pub fn release_all(&mut self) {
        self.held.clear();
        self.dragging = false;
    }

    fn down(&self, code: KeyCode) -> bool {
        self.held.contains(&code)
    }

    /// Input for this frame; the accumulated drag is consumed.
    pub fn take(&mut self) -> CameraInput {
        let movement = Vec3::new(
            axis(self.down(KeyCode::KeyA), self.down(KeyCode::KeyD)),
            axis(self.down(KeyCode::KeyQ), self.down(KeyCode::KeyE)),
            axis(self.down(KeyCode::KeyS), self.down(KeyCode::KeyW)),
        );
        let look = Vec2::new(
            axis(self.down(KeyCode::ArrowLeft), self.down(KeyCode::ArrowRight)),
            axis(self.down(KeyCode::ArrowDown), self.down(KeyCode::ArrowUp)),
        );
        CameraInput {
            movement,
            look,
            drag: std::mem::take(&mut self.drag),
        }
    }
}
