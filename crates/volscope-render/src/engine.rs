//! wgpu implementation of [`RenderBackend`].

use std::sync::Arc;

use volscope_core::{Actor, PipelineId, Vec3};
use wgpu::util::DeviceExt;

use crate::backend::{Frame, RenderBackend, SurfaceHandle};
use crate::camera::Camera;
use crate::error::{RenderError, RenderResult};
use crate::interactor::CameraInteractor;
use crate::volume_render::{create_bind_group_layout, VolumePass, VolumeRenderData};

/// Format of offscreen render targets.
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// GPU representation of camera uniforms.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct CameraUniforms {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 3],
    pub _padding: f32,
}

impl CameraUniforms {
    /// Computes the uniforms for `camera`.
    #[must_use]
    pub fn from_camera(camera: &Camera) -> Self {
        let view = camera.view_matrix();
        let proj = camera.projection_matrix();
        let view_proj = proj * view;
        Self {
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
            view_proj: view_proj.to_cols_array_2d(),
            inv_view_proj: view_proj.inverse().to_cols_array_2d(),
            camera_pos: camera.position.to_array(),
            _padding: 0.0,
        }
    }
}

impl Default for CameraUniforms {
    fn default() -> Self {
        Self::from_camera(&Camera::default())
    }
}

/// Device context: instance, adapter, device and queue.
pub struct GpuWindow {
    /// The wgpu instance.
    pub instance: wgpu::Instance,
    /// The wgpu adapter.
    pub adapter: wgpu::Adapter,
    /// The wgpu device.
    pub device: wgpu::Device,
    /// The command queue.
    pub queue: wgpu::Queue,
}

impl GpuWindow {
    /// Requests an adapter and device.
    pub async fn new(power_preference: wgpu::PowerPreference) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("volscope device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await?;

        log::info!("using adapter {}", adapter.get_info().name);

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }
}

impl Drop for GpuWindow {
    fn drop(&mut self) {
        // Let in-flight work finish before the device goes away.
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
        log::debug!("released GPU device");
    }
}

/// Scene state: camera, background and per-actor GPU data.
pub struct VolumeRenderer {
    camera: Camera,
    background: Vec3,
    camera_buffer: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
    pass: Option<VolumePass>,
    actors: Vec<VolumeRenderData>,
}

impl VolumeRenderer {
    fn new(window: &GpuWindow, background: Vec3) -> Self {
        let camera_buffer = window
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("camera uniforms"),
                contents: bytemuck::cast_slice(&[CameraUniforms::default()]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        Self {
            camera: Camera::default(),
            background,
            camera_buffer,
            bind_group_layout: create_bind_group_layout(&window.device),
            pass: None,
            actors: Vec::new(),
        }
    }

    /// Returns the camera.
    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Number of actors in the scene.
    #[must_use]
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    fn clear_color(&self) -> wgpu::Color {
        wgpu::Color {
            r: f64::from(self.background.x),
            g: f64::from(self.background.y),
            b: f64::from(self.background.z),
            a: 1.0,
        }
    }
}

impl Drop for VolumeRenderer {
    fn drop(&mut self) {
        log::debug!("released renderer with {} actors", self.actors.len());
    }
}

enum ViewTarget {
    Offscreen {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
        _window: Arc<winit::window::Window>,
    },
}

/// Render target: an offscreen texture or a window surface.
pub struct RenderView {
    target: ViewTarget,
    width: u32,
    height: u32,
}

impl RenderView {
    /// Current size in pixels.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn format(&self) -> wgpu::TextureFormat {
        match &self.target {
            ViewTarget::Offscreen { .. } => OFFSCREEN_FORMAT,
            ViewTarget::Surface { config, .. } => config.format,
        }
    }

    fn create_offscreen(
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen view"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }
}

impl Drop for RenderView {
    fn drop(&mut self) {
        log::debug!("released {}x{} view", self.width, self.height);
    }
}

/// Interactor for the wgpu backend.
pub struct WgpuInteractor {
    inner: CameraInteractor,
}

impl AsRef<CameraInteractor> for WgpuInteractor {
    fn as_ref(&self) -> &CameraInteractor {
        &self.inner
    }
}

impl AsMut<CameraInteractor> for WgpuInteractor {
    fn as_mut(&mut self) -> &mut CameraInteractor {
        &mut self.inner
    }
}

impl Drop for WgpuInteractor {
    fn drop(&mut self) {
        log::debug!("released interactor");
    }
}

/// wgpu-backed [`RenderBackend`].
#[derive(Debug, Clone, Copy)]
pub struct WgpuBackend {
    /// Adapter power preference.
    pub power_preference: wgpu::PowerPreference,
}

impl Default for WgpuBackend {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
        }
    }
}

/// Calculates bytes per row with proper alignment for wgpu buffer copies.
fn aligned_bytes_per_row(width: u32) -> u32 {
    let unaligned = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unaligned.div_ceil(align) * align
}

impl RenderBackend for WgpuBackend {
    type Window = GpuWindow;
    type Renderer = VolumeRenderer;
    type View = RenderView;
    type Interactor = WgpuInteractor;

    fn create_window(&mut self) -> RenderResult<GpuWindow> {
        pollster::block_on(GpuWindow::new(self.power_preference))
    }

    fn create_renderer(
        &mut self,
        window: &GpuWindow,
        background: Vec3,
    ) -> RenderResult<VolumeRenderer> {
        Ok(VolumeRenderer::new(window, background))
    }

    fn create_view(
        &mut self,
        window: &GpuWindow,
        surface: SurfaceHandle,
        width: u32,
        height: u32,
    ) -> RenderResult<RenderView> {
        let width = width.max(1);
        let height = height.max(1);
        let target = match surface {
            SurfaceHandle::Offscreen => {
                let (texture, view) = RenderView::create_offscreen(&window.device, width, height);
                ViewTarget::Offscreen { texture, view }
            }
            SurfaceHandle::Window(handle) => {
                let surface = window.instance.create_surface(Arc::clone(&handle))?;
                let caps = surface.get_capabilities(&window.adapter);
                let format = caps
                    .formats
                    .iter()
                    .copied()
                    .find(wgpu::TextureFormat::is_srgb)
                    .or_else(|| caps.formats.first().copied())
                    .ok_or_else(|| {
                        RenderError::SurfaceConfigurationFailed(
                            "surface reports no supported formats".to_string(),
                        )
                    })?;
                let config = wgpu::SurfaceConfiguration {
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    format,
                    width,
                    height,
                    present_mode: wgpu::PresentMode::Fifo,
                    alpha_mode: caps
                        .alpha_modes
                        .first()
                        .copied()
                        .unwrap_or(wgpu::CompositeAlphaMode::Auto),
                    view_formats: vec![],
                    desired_maximum_frame_latency: 2,
                };
                surface.configure(&window.device, &config);
                ViewTarget::Surface {
                    surface,
                    config,
                    _window: handle,
                }
            }
        };
        Ok(RenderView {
            target,
            width,
            height,
        })
    }

    fn create_interactor(&mut self, view: &RenderView) -> RenderResult<WgpuInteractor> {
        Ok(WgpuInteractor {
            inner: CameraInteractor::new(view.width, view.height),
        })
    }

    fn camera(renderer: &VolumeRenderer) -> &Camera {
        &renderer.camera
    }

    fn camera_mut(renderer: &mut VolumeRenderer) -> &mut Camera {
        &mut renderer.camera
    }

    fn upload_actor(
        &mut self,
        window: &GpuWindow,
        renderer: &mut VolumeRenderer,
        actor: &Actor,
    ) -> RenderResult<()> {
        if let Some(existing) = renderer.actors.iter_mut().find(|a| a.id() == actor.id) {
            if existing.can_update_in_place(actor) {
                existing.update_uniforms(&window.queue, actor);
                return Ok(());
            }
        }

        let data = VolumeRenderData::new(
            &window.device,
            &window.queue,
            &renderer.bind_group_layout,
            &renderer.camera_buffer,
            actor,
        )?;
        match renderer.actors.iter().position(|a| a.id() == actor.id) {
            Some(index) => renderer.actors[index] = data,
            None => renderer.actors.push(data),
        }
        Ok(())
    }

    fn remove_actor(&mut self, renderer: &mut VolumeRenderer, id: PipelineId) -> bool {
        let before = renderer.actors.len();
        renderer.actors.retain(|a| a.id() != id);
        renderer.actors.len() != before
    }

    fn resize_view(
        &mut self,
        window: &GpuWindow,
        view: &mut RenderView,
        width: u32,
        height: u32,
    ) -> RenderResult<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        view.width = width;
        view.height = height;
        match &mut view.target {
            ViewTarget::Offscreen {
                texture,
                view: texture_view,
            } => {
                let (new_texture, new_view) =
                    RenderView::create_offscreen(&window.device, width, height);
                *texture = new_texture;
                *texture_view = new_view;
            }
            ViewTarget::Surface {
                surface, config, ..
            } => {
                config.width = width;
                config.height = height;
                surface.configure(&window.device, config);
            }
        }
        Ok(())
    }

    fn render(
        &mut self,
        window: &GpuWindow,
        renderer: &mut VolumeRenderer,
        view: &mut RenderView,
    ) -> RenderResult<()> {
        let format = view.format();
        if renderer.pass.as_ref().map(VolumePass::format) != Some(format) {
            renderer.pass = Some(VolumePass::new(
                &window.device,
                &renderer.bind_group_layout,
                format,
            ));
        }

        renderer.camera.set_viewport(view.width, view.height);
        let uniforms = CameraUniforms::from_camera(&renderer.camera);
        window
            .queue
            .write_buffer(&renderer.camera_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let surface_texture = match &view.target {
            ViewTarget::Offscreen { .. } => None,
            ViewTarget::Surface { surface, .. } => match surface.get_current_texture() {
                Ok(frame) => Some(frame),
                Err(wgpu::SurfaceError::Lost) => return Err(RenderError::SurfaceLost),
                Err(wgpu::SurfaceError::Outdated) => return Err(RenderError::SurfaceOutdated),
                Err(wgpu::SurfaceError::OutOfMemory) => return Err(RenderError::OutOfMemory),
                Err(wgpu::SurfaceError::Timeout) => return Err(RenderError::Timeout),
                Err(e) => return Err(RenderError::SurfaceConfigurationFailed(e.to_string())),
            },
        };
        let surface_view = surface_texture
            .as_ref()
            .map(|frame| frame.texture.create_view(&wgpu::TextureViewDescriptor::default()));
        let target_view = match (&view.target, &surface_view) {
            (ViewTarget::Offscreen { view: offscreen, .. }, _) => offscreen,
            (ViewTarget::Surface { .. }, Some(current)) => current,
            (ViewTarget::Surface { .. }, None) => return Err(RenderError::SurfaceLost),
        };

        let mut encoder = window
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("volume render encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("volume render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(renderer.clear_color()),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                ..Default::default()
            });
            if let Some(pass) = &renderer.pass {
                pass.draw(&mut render_pass, &renderer.actors);
            }
        }
        window.queue.submit(std::iter::once(encoder.finish()));

        if let Some(frame) = surface_texture {
            frame.present();
        }
        Ok(())
    }

    fn capture(&mut self, window: &GpuWindow, view: &RenderView) -> RenderResult<Frame> {
        let ViewTarget::Offscreen { texture, .. } = &view.target else {
            return Err(RenderError::ReadbackFailed(
                "only offscreen views can be captured".to_string(),
            ));
        };
        let (width, height) = (view.width, view.height);
        let bytes_per_row = aligned_bytes_per_row(width);

        let buffer = window.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("capture buffer"),
            size: u64::from(bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = window
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("capture copy encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        window.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = window.device.poll(wgpu::PollType::wait_indefinitely());
        rx.recv()
            .map_err(|e| RenderError::ReadbackFailed(e.to_string()))?
            .map_err(|e| RenderError::ReadbackFailed(e.to_string()))?;

        // Copy data, removing row padding
        let data = buffer_slice.get_mapped_range();
        let row_bytes = (width * 4) as usize;
        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height {
            let start = (row * bytes_per_row) as usize;
            pixels.extend_from_slice(&data[start..start + row_bytes]);
        }
        drop(data);
        buffer.unmap();

        Ok(Frame {
            width,
            height,
            pixels,
        })
    }
}
