//! Interactive volume viewer.
//!
//! Usage: `cargo run --example volume_demo [header.json] [--slice]`
//!
//! Without a header a synthetic RGB sphere is generated. Drag with the left
//! button to orbit, the middle button to pan, and scroll to zoom.

use std::sync::Arc;

use volscope::*;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowId};

/// Generates an RGB sphere whose color varies with position.
fn synthetic_sphere(n: u32) -> GridDataset {
    let mut scalars = Vec::with_capacity((n * n * n * 3) as usize);
    let center = (n as f32 - 1.0) * 0.5;
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                let p = Vec3::new(i as f32, j as f32, k as f32) - Vec3::splat(center);
                let falloff = (1.0 - p.length() / center).clamp(0.0, 1.0);
                let scale = |v: u32| (v as f32 / n as f32 * 255.0 * falloff) as u8;
                scalars.extend_from_slice(&[scale(i), scale(j), scale(n - 1 - k)]);
            }
        }
    }
    GridDataset::with_unit_spacing(UVec3::splat(n), 3, scalars).expect("valid synthetic grid")
}

struct DemoApp {
    options: Options,
    mode: PipelineMode,
    header: Option<String>,
    session: RenderSession<WgpuBackend>,
    window: Option<Arc<Window>>,
    button: Option<MouseButton>,
    cursor: Option<(f64, f64)>,
}

impl DemoApp {
    fn load(&mut self) -> Result<()> {
        let mut pipeline = TransferPipeline::from_options(&self.options, self.mode)?;
        let ticket = self.session.begin_load();
        let loaded = match &self.header {
            Some(path) => pollster::block_on(fetch_tagged(&RawVolumeLoader::new(), path, ticket)),
            None => LoadedGrid {
                ticket,
                result: Ok(synthetic_sphere(64)),
            },
        };
        self.session.apply_load(loaded, &mut pipeline)?;
        Ok(())
    }
}

impl ApplicationHandler for DemoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attributes = Window::default_attributes()
            .with_title("volscope")
            .with_inner_size(LogicalSize::new(1024, 768));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .expect("failed to create window"),
        );
        let size = window.inner_size();
        self.session
            .attach_view(
                SurfaceHandle::Window(Arc::clone(&window)),
                size.width,
                size.height,
            )
            .expect("failed to attach view");
        self.window = Some(window);

        if let Err(e) = self.load() {
            log::error!("failed to load volume: {e}");
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        // Events can still arrive after the session was released on close.
        if !self.session.is_attached() && !matches!(event, WindowEvent::CloseRequested) {
            return;
        }
        let result = match event {
            WindowEvent::CloseRequested => {
                self.session.release();
                event_loop.exit();
                Ok(())
            }
            WindowEvent::Resized(size) => self.session.resize(size.width, size.height),
            WindowEvent::RedrawRequested => self.session.render(),
            WindowEvent::MouseInput { state, button, .. } => {
                self.button = match (state, button) {
                    (ElementState::Pressed, winit::event::MouseButton::Left) => {
                        Some(MouseButton::Left)
                    }
                    (ElementState::Pressed, winit::event::MouseButton::Middle) => {
                        Some(MouseButton::Middle)
                    }
                    (ElementState::Pressed, winit::event::MouseButton::Right) => {
                        Some(MouseButton::Right)
                    }
                    _ => None,
                };
                Ok(())
            }
            WindowEvent::CursorMoved { position, .. } => {
                let previous = self.cursor.replace((position.x, position.y));
                match (self.button, previous) {
                    (Some(button), Some((x, y))) => self
                        .session
                        .interact(&InteractionEvent::Drag {
                            button,
                            dx: (position.x - x) as f32,
                            dy: (position.y - y) as f32,
                        })
                        .map(|_| ()),
                    _ => Ok(()),
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => (p.y / 40.0) as f32,
                };
                self.session
                    .interact(&InteractionEvent::Scroll { delta: lines })
                    .map(|_| ())
            }
            _ => Ok(()),
        };

        match result {
            Ok(()) => {}
            Err(VolumeError::Render(message)) => {
                // Lost or outdated surfaces recover on the next resize.
                log::warn!("frame skipped: {message}");
            }
            Err(e) => log::error!("{e}"),
        }
    }
}

fn main() {
    init_logging();

    let mut header = None;
    let mut mode = PipelineMode::Volume;
    for arg in std::env::args().skip(1) {
        if arg == "--slice" {
            mode = PipelineMode::Slice;
        } else {
            header = Some(arg);
        }
    }

    let options = Options::default();
    let mut app = DemoApp {
        session: RenderSession::new(WgpuBackend::default(), options.clone()),
        options,
        mode,
        header,
        window: None,
        button: None,
        cursor: None,
    };

    let event_loop = EventLoop::new().expect("failed to create event loop");
    event_loop.run_app(&mut app).expect("event loop error");
}
