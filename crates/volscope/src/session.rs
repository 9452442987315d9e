//! Render session: owns the render resources and the actors drawn into them.

use std::sync::Arc;

use volscope_core::{
    transform_dataset, Actor, LoadGeneration, LoadTicket, Options, PipelineId, Result,
    TransferPipeline, Vec3, VolumeError,
};
use volscope_render::{
    Camera, Frame, InteractionEvent, RenderBackend, RenderError, SurfaceHandle,
};

use crate::lifecycle::{SessionLifecycle, SessionState};
use crate::loader::LoadedGrid;

fn render_error(error: RenderError) -> VolumeError {
    VolumeError::Render(error.to_string())
}

/// Outcome of applying a finished load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The dataset was transformed and bound, and added to the view if attached.
    Applied,
    /// A newer load, attach or release superseded the load; nothing changed.
    Discarded,
}

// Fields drop in declaration order, which is the reverse of creation order.
struct SessionResources<B: RenderBackend> {
    interactor: B::Interactor,
    view: B::View,
    renderer: B::Renderer,
    window: B::Window,
}

/// Owning handle for a window, renderer, view and interactor.
///
/// The session is either fully attached or fully detached. Releasing it, or
/// dropping it, tears the resources down as interactor, view, renderer,
/// window.
pub struct RenderSession<B: RenderBackend> {
    backend: B,
    lifecycle: SessionLifecycle,
    resources: Option<SessionResources<B>>,
    actors: Vec<Actor>,
    generation: LoadGeneration,
    options: Options,
    size: (u32, u32),
}

impl<B: RenderBackend> RenderSession<B> {
    /// Creates a detached session.
    pub fn new(backend: B, options: Options) -> Self {
        Self {
            backend,
            lifecycle: SessionLifecycle::new(options.strict_lifecycle),
            resources: None,
            actors: Vec::new(),
            generation: LoadGeneration::new(),
            options,
            size: (0, 0),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    /// Returns whether render resources are live.
    pub fn is_attached(&self) -> bool {
        self.state() == SessionState::Attached
    }

    /// Options the session was created with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Viewport size in pixels, `(0, 0)` while detached.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Current load generation.
    pub fn generation(&self) -> u64 {
        self.generation.current()
    }

    /// Pipelines with an actor in the view, in draw order.
    pub fn pipeline_ids(&self) -> Vec<PipelineId> {
        self.actors.iter().map(|a| a.id).collect()
    }

    /// The backend driving this session.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The camera, while attached.
    pub fn camera(&self) -> Option<&Camera> {
        self.resources.as_ref().map(|r| B::camera(&r.renderer))
    }

    /// Union of the drawn extents of every actor in the view.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        self.actors.iter().map(Actor::render_bounds).reduce(|(amin, amax), (bmin, bmax)| {
            (amin.min(bmin), amax.max(bmax))
        })
    }

    /// Creates window, renderer, view and interactor, in that order.
    ///
    /// Zero sizes are clamped to one pixel. If any step fails, everything
    /// created so far is dropped in reverse order and the session stays
    /// detached.
    pub fn attach_view(&mut self, surface: SurfaceHandle, width: u32, height: u32) -> Result<()> {
        self.lifecycle.require_detached("attach_view")?;
        let (width, height) = (width.max(1), height.max(1));

        let window = self.backend.create_window().map_err(render_error)?;
        let mut renderer = self
            .backend
            .create_renderer(&window, self.options.background_color)
            .map_err(render_error)?;
        let view = self
            .backend
            .create_view(&window, surface, width, height)
            .map_err(render_error)?;
        let interactor = self.backend.create_interactor(&view).map_err(render_error)?;

        B::camera_mut(&mut renderer).set_viewport(width, height);
        self.resources = Some(SessionResources {
            interactor,
            view,
            renderer,
            window,
        });
        self.size = (width, height);
        self.lifecycle.attach();
        self.generation.advance();
        log::info!("attached {width}x{height} view");
        Ok(())
    }

    /// Uploads `pipeline`'s actor, refits the camera and renders.
    ///
    /// Adding a pipeline that is already in the view replaces its actor in
    /// place, keeping its draw order.
    pub fn add_pipeline(&mut self, pipeline: &TransferPipeline) -> Result<()> {
        self.lifecycle.require_attached("add_pipeline")?;
        let actor = pipeline.actor().ok_or(VolumeError::PipelineNotReady)?;
        let resources = self.resources.as_mut().ok_or(VolumeError::SessionNotAttached)?;

        self.backend
            .upload_actor(&resources.window, &mut resources.renderer, &actor)
            .map_err(render_error)?;

        log::debug!(
            "added {} pipeline {} (revision {})",
            pipeline.mode().name(),
            actor.id.get(),
            actor.revision
        );
        match self.actors.iter().position(|a| a.id == actor.id) {
            Some(index) => self.actors[index] = actor,
            None => self.actors.push(actor),
        }

        self.reset_camera();
        self.render()
    }

    /// Removes a pipeline's actor. Returns whether it was in the view.
    pub fn remove_pipeline(&mut self, id: PipelineId) -> Result<bool> {
        self.lifecycle.require_attached("remove_pipeline")?;
        let resources = self.resources.as_mut().ok_or(VolumeError::SessionNotAttached)?;

        let removed = self.backend.remove_actor(&mut resources.renderer, id);
        self.actors.retain(|a| a.id != id);
        if !removed {
            return Ok(false);
        }
        self.reset_camera();
        self.render()?;
        Ok(true)
    }

    /// Fits the camera to the union of all actor bounds.
    pub fn reset_camera(&mut self) {
        let Some((min, max)) = self.bounds() else {
            return;
        };
        if let Some(resources) = self.resources.as_mut() {
            B::camera_mut(&mut resources.renderer).reset_to_bounds(min, max);
        }
    }

    /// Resizes the view and renders. Unchanged sizes are a no-op.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.lifecycle.require_attached("resize")?;
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == self.size {
            return Ok(());
        }
        let resources = self.resources.as_mut().ok_or(VolumeError::SessionNotAttached)?;

        self.backend
            .resize_view(&resources.window, &mut resources.view, width, height)
            .map_err(render_error)?;
        resources.interactor.as_mut().set_viewport(width, height);
        B::camera_mut(&mut resources.renderer).set_viewport(width, height);
        self.size = (width, height);
        log::debug!("resized view to {width}x{height}");
        self.render()
    }

    /// Renders one frame.
    pub fn render(&mut self) -> Result<()> {
        self.lifecycle.require_attached("render")?;
        let resources = self.resources.as_mut().ok_or(VolumeError::SessionNotAttached)?;
        self.backend
            .render(
                &resources.window,
                &mut resources.renderer,
                &mut resources.view,
            )
            .map_err(render_error)
    }

    /// Forwards an input event to the interactor and renders if the camera moved.
    pub fn interact(&mut self, event: &InteractionEvent) -> Result<bool> {
        self.lifecycle.require_attached("interact")?;
        let resources = self.resources.as_mut().ok_or(VolumeError::SessionNotAttached)?;
        let moved = resources
            .interactor
            .as_ref()
            .handle(B::camera_mut(&mut resources.renderer), event);
        if moved {
            self.render()?;
        }
        Ok(moved)
    }

    /// Reads back the last rendered frame.
    pub fn capture(&mut self) -> Result<Frame> {
        self.lifecycle.require_attached("capture")?;
        let resources = self.resources.as_ref().ok_or(VolumeError::SessionNotAttached)?;
        self.backend
            .capture(&resources.window, &resources.view)
            .map_err(render_error)
    }

    /// Tears down interactor, view, renderer and window, in that order.
    ///
    /// Idempotent: releasing a detached session only invalidates outstanding
    /// loads.
    pub fn release(&mut self) {
        self.generation.advance();
        self.actors.clear();
        self.size = (0, 0);
        if let Some(resources) = self.resources.take() {
            let SessionResources {
                interactor,
                view,
                renderer,
                window,
            } = resources;
            drop(interactor);
            drop(view);
            drop(renderer);
            drop(window);
            log::info!("released view");
        }
        self.lifecycle.detach();
    }

    /// Starts a load, superseding every load still in flight.
    pub fn begin_load(&mut self) -> LoadTicket {
        let ticket = self.generation.issue();
        log::debug!("issued load generation {}", ticket.generation());
        ticket
    }

    /// Applies a finished load to `pipeline` and, when attached, to the view.
    ///
    /// Results from a superseded generation are dropped without touching the
    /// pipeline or the session. Loader errors are returned and nothing is
    /// bound.
    pub fn apply_load(
        &mut self,
        loaded: LoadedGrid,
        pipeline: &mut TransferPipeline,
    ) -> Result<LoadOutcome> {
        if !self.generation.is_current(&loaded.ticket) {
            log::warn!(
                "discarding load from generation {} (current {})",
                loaded.ticket.generation(),
                self.generation.current()
            );
            return Ok(LoadOutcome::Discarded);
        }

        let dataset = transform_dataset(Arc::new(loaded.result?))?;
        pipeline.bind(dataset)?;
        if self.is_attached() {
            self.add_pipeline(pipeline)?;
        }
        Ok(LoadOutcome::Applied)
    }
}

impl<B: RenderBackend> Drop for RenderSession<B> {
    fn drop(&mut self) {
        self.release();
    }
}
