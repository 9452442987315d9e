//! Mouse-driven camera manipulation.

use crate::camera::Camera;

/// Mouse button that started a drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    /// Rotates around the focal point.
    Left,
    /// Translates the camera and focal point.
    Middle,
    /// Dollies toward or away from the focal point.
    Right,
}

/// A user input event forwarded to the interactor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionEvent {
    /// Pointer moved by (`dx`, `dy`) pixels with `button` held.
    Drag {
        /// Button held during the drag.
        button: MouseButton,
        /// Horizontal motion in pixels, positive to the right.
        dx: f32,
        /// Vertical motion in pixels, positive downward.
        dy: f32,
    },
    /// Scroll wheel moved by `delta` lines, positive away from the user.
    Scroll {
        /// Wheel motion in lines.
        delta: f32,
    },
}

/// Trackball-style camera interactor bound to one view.
#[derive(Debug, Clone)]
pub struct CameraInteractor {
    width: u32,
    height: u32,
    /// Radians of rotation for a drag across the full view height.
    pub rotate_speed: f32,
    /// Zoom factor applied per scroll line.
    pub zoom_speed: f32,
}

impl CameraInteractor {
    /// Creates an interactor for a view of the given size.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            rotate_speed: std::f32::consts::PI,
            zoom_speed: 1.1,
        }
    }

    /// Returns the viewport size this interactor maps pixels against.
    #[must_use]
    pub fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Updates the viewport size after a resize.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    /// Applies `event` to `camera`. Returns whether the camera moved.
    #[allow(clippy::cast_precision_loss)]
    pub fn handle(&self, camera: &mut Camera, event: &InteractionEvent) -> bool {
        let height = self.height as f32;
        match *event {
            InteractionEvent::Drag { dx, dy, .. } if dx == 0.0 && dy == 0.0 => false,
            InteractionEvent::Drag {
                button: MouseButton::Left,
                dx,
                dy,
            } => {
                let scale = self.rotate_speed / height;
                camera.orbit(dx * scale, dy * scale);
                true
            }
            InteractionEvent::Drag {
                button: MouseButton::Middle,
                dx,
                dy,
            } => {
                // One pixel moves the focal plane by one pixel worth of world units.
                let world_per_pixel = match camera.projection_mode {
                    crate::camera::ProjectionMode::Perspective => {
                        2.0 * camera.distance() * (camera.fov * 0.5).tan() / height
                    }
                    crate::camera::ProjectionMode::Orthographic => {
                        2.0 * camera.ortho_scale / height
                    }
                };
                camera.pan(-dx * world_per_pixel, dy * world_per_pixel);
                true
            }
            InteractionEvent::Drag {
                button: MouseButton::Right,
                dy,
                ..
            } => {
                camera.zoom(self.zoom_speed.powf(-dy / 10.0));
                true
            }
            InteractionEvent::Scroll { delta } if delta == 0.0 => false,
            InteractionEvent::Scroll { delta } => {
                camera.zoom(self.zoom_speed.powf(delta));
                true
            }
        }
    }
}
