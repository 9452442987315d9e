//! Rendering backend for volscope.
//!
//! This crate provides:
//! - The [`RenderBackend`] abstraction over window, renderer, view and interactor
//! - A wgpu implementation that raymarches RGBA 3D textures and draws slices
//! - Camera fitting and mouse-driven camera interaction
//! - Frame capture and image export

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// Pixel and texel math converts between u32/usize/f32 throughout
#![allow(clippy::cast_possible_truncation)]

pub mod backend;
pub mod camera;
pub mod engine;
pub mod error;
pub mod interactor;
pub mod screenshot;
pub mod volume_render;

pub use backend::{Frame, RenderBackend, SurfaceHandle};
pub use camera::{Camera, ProjectionMode};
pub use engine::{CameraUniforms, GpuWindow, RenderView, VolumeRenderer, WgpuBackend, WgpuInteractor};
pub use error::{RenderError, RenderResult};
pub use interactor::{CameraInteractor, InteractionEvent, MouseButton};
pub use screenshot::{encode_png, save_frame, ScreenshotError};
pub use volume_render::{VolumePass, VolumeRenderData, VolumeUniforms};
