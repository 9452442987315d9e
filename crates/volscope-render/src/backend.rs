//! Backend abstraction over the four render-side resources.
//!
//! A backend creates a window (device context), a renderer (scene state and
//! camera), a view (render target) and an interactor, in that order. Each
//! resource releases its GPU objects in `Drop`, so whoever owns them controls
//! teardown order purely through drop order.

use std::sync::Arc;

use volscope_core::{Actor, PipelineId, Vec3};

use crate::camera::Camera;
use crate::error::RenderResult;
use crate::interactor::CameraInteractor;

/// Where a view presents its frames.
#[derive(Debug, Clone)]
pub enum SurfaceHandle {
    /// Render into an offscreen texture that can be captured.
    Offscreen,
    /// Present into an on-screen window.
    Window(Arc<winit::window::Window>),
}

impl SurfaceHandle {
    /// Returns whether frames are kept offscreen.
    #[must_use]
    pub fn is_offscreen(&self) -> bool {
        matches!(self, SurfaceHandle::Offscreen)
    }
}

/// A captured RGBA8 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Tightly packed RGBA rows, top row first.
    pub pixels: Vec<u8>,
}

impl Frame {
    /// Returns the RGBA value at (`x`, `y`).
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y * self.width + x) * 4) as usize;
        let px = self.pixels.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Factory and driver for render resources.
pub trait RenderBackend {
    /// Device context shared by the other resources.
    type Window;
    /// Scene state: actors, camera and background.
    type Renderer;
    /// Render target bound to a surface.
    type View;
    /// Input handler driving the renderer's camera.
    type Interactor: AsRef<CameraInteractor> + AsMut<CameraInteractor>;

    /// Creates the device context.
    fn create_window(&mut self) -> RenderResult<Self::Window>;

    /// Creates an empty scene with the given background color.
    fn create_renderer(
        &mut self,
        window: &Self::Window,
        background: Vec3,
    ) -> RenderResult<Self::Renderer>;

    /// Creates a render target of `width` x `height` pixels on `surface`.
    fn create_view(
        &mut self,
        window: &Self::Window,
        surface: SurfaceHandle,
        width: u32,
        height: u32,
    ) -> RenderResult<Self::View>;

    /// Creates an interactor bound to `view`.
    fn create_interactor(&mut self, view: &Self::View) -> RenderResult<Self::Interactor>;

    /// Returns the renderer's camera.
    fn camera(renderer: &Self::Renderer) -> &Camera;

    /// Returns the renderer's camera for modification.
    fn camera_mut(renderer: &mut Self::Renderer) -> &mut Camera;

    /// Adds `actor` to the scene, replacing any actor with the same id.
    fn upload_actor(
        &mut self,
        window: &Self::Window,
        renderer: &mut Self::Renderer,
        actor: &Actor,
    ) -> RenderResult<()>;

    /// Removes the actor with `id`. Returns whether it was present.
    fn remove_actor(&mut self, renderer: &mut Self::Renderer, id: PipelineId) -> bool;

    /// Resizes the render target.
    fn resize_view(
        &mut self,
        window: &Self::Window,
        view: &mut Self::View,
        width: u32,
        height: u32,
    ) -> RenderResult<()>;

    /// Renders one frame of the scene into the view.
    fn render(
        &mut self,
        window: &Self::Window,
        renderer: &mut Self::Renderer,
        view: &mut Self::View,
    ) -> RenderResult<()>;

    /// Reads back the most recently rendered frame.
    fn capture(&mut self, window: &Self::Window, view: &Self::View) -> RenderResult<Frame>;
}
