//! Camera and view management.

use glam::{Mat4, Vec3};

/// Camera projection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionMode {
    /// Perspective projection.
    #[default]
    Perspective,
    /// Orthographic projection.
    Orthographic,
}

/// A 3D camera for viewing the scene.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera position in world space.
    pub position: Vec3,
    /// Focal point the camera orbits around.
    pub target: Vec3,
    /// Up vector.
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov: f32,
    /// Aspect ratio (width / height).
    pub aspect_ratio: f32,
    /// Near clipping plane.
    pub near: f32,
    /// Far clipping plane.
    pub far: f32,
    /// Projection mode.
    pub projection_mode: ProjectionMode,
    /// Half height of the view volume when orthographic.
    pub ortho_scale: f32,
}

impl Camera {
    /// Creates a new camera with default settings.
    #[must_use]
    pub fn new(aspect_ratio: f32) -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 1.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: 30.0_f32.to_radians(),
            aspect_ratio,
            near: 0.01,
            far: 1000.0,
            projection_mode: ProjectionMode::Perspective,
            ortho_scale: 1.0,
        }
    }

    /// Sets the aspect ratio.
    ///
    /// Degenerate sizes (zero width or height) leave the ratio untouched.
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        if aspect_ratio.is_finite() && aspect_ratio > 0.0 {
            self.aspect_ratio = aspect_ratio;
        }
    }

    /// Sets the aspect ratio from a viewport size in pixels.
    #[allow(clippy::cast_precision_loss)]
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.set_aspect_ratio(width as f32 / height as f32);
        }
    }

    /// Returns the view matrix.
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Returns the projection matrix.
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection_mode {
            ProjectionMode::Perspective => {
                Mat4::perspective_rh(self.fov, self.aspect_ratio, self.near, self.far)
            }
            ProjectionMode::Orthographic => {
                let half_height = self.ortho_scale;
                let half_width = half_height * self.aspect_ratio;
                Mat4::orthographic_rh(
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    self.near,
                    self.far,
                )
            }
        }
    }

    /// Returns the combined view-projection matrix.
    #[must_use]
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Distance between the camera and its focal point.
    #[must_use]
    pub fn distance(&self) -> f32 {
        self.position.distance(self.target)
    }

    /// Returns the camera's forward direction.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Z)
    }

    /// Returns the camera's right direction.
    #[must_use]
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize_or(Vec3::X)
    }

    /// Orbits the camera around the focal point.
    ///
    /// `delta_x` rotates about the up vector, `delta_y` about the right
    /// vector. Both are in radians.
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        let offset = self.position - self.target;
        let yaw = glam::Quat::from_axis_angle(self.up.normalize_or(Vec3::Y), -delta_x);
        let offset = yaw * offset;

        let right = (-offset).cross(self.up).normalize_or(Vec3::X);
        let pitch = glam::Quat::from_axis_angle(right, -delta_y);
        let pitched = pitch * offset;

        // Stop just short of the poles so the up vector stays usable.
        let up = self.up.normalize_or(Vec3::Y);
        if pitched.normalize_or_zero().dot(up).abs() < 0.999 {
            self.position = self.target + pitched;
        } else {
            self.position = self.target + offset;
        }
    }

    /// Pans the camera and its focal point together.
    pub fn pan(&mut self, delta_x: f32, delta_y: f32) {
        let right = self.right();
        let up = right.cross(self.forward()).normalize_or(self.up);
        let offset = right * delta_x + up * delta_y;
        self.position += offset;
        self.target += offset;
    }

    /// Zooms by `factor`; values above 1 move closer.
    ///
    /// Perspective cameras dolly toward the focal point, orthographic cameras
    /// shrink `ortho_scale`.
    pub fn zoom(&mut self, factor: f32) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        match self.projection_mode {
            ProjectionMode::Perspective => {
                let direction = self.forward();
                let distance = (self.distance() / factor).max(self.near * 1.01);
                self.position = self.target - direction * distance;
            }
            ProjectionMode::Orthographic => {
                self.ortho_scale = (self.ortho_scale / factor).clamp(1e-4, 1e6);
            }
        }
    }

    /// Places the camera so that the axis-aligned box `min..max` fills the view.
    ///
    /// The current viewing direction is preserved. The focal point moves to
    /// the box center and the camera backs off until the bounding sphere fits
    /// inside the field of view. Clipping planes are fitted around the sphere.
    pub fn reset_to_bounds(&mut self, min: Vec3, max: Vec3) {
        let center = (min + max) * 0.5;
        let mut radius = (max - min).length() * 0.5;
        if !radius.is_finite() || radius <= f32::EPSILON {
            radius = 0.5;
        }

        // Narrow viewports are limited by the horizontal field of view.
        let half_fov = (self.fov * 0.5).clamp(0.01, 1.5);
        let aspect = self.aspect_ratio.min(1.0);
        let half_angle = (half_fov.tan() * aspect).atan();
        let distance = radius / half_angle.sin();
        let direction = self.forward();

        self.target = center;
        self.position = center - direction * distance;
        self.near = (distance - radius * 1.01).max(distance * 1e-3);
        self.far = distance + radius * 1.01;
        self.ortho_scale = radius / aspect;
    }

    /// Sets the projection mode.
    pub fn set_projection_mode(&mut self, mode: ProjectionMode) {
        self.projection_mode = mode;
    }

    /// Sets the field of view in radians.
    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov.clamp(0.1, std::f32::consts::PI - 0.1);
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(1.0)
    }
}
