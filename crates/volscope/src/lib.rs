//! volscope: luminance-alpha volume rendering of structured 3D grids.
//!
//! Scalar grids without an alpha channel get one synthesized from per-voxel
//! luminance, then render as semi-transparent volumes or as axis-aligned
//! slices.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use volscope::*;
//!
//! fn main() -> Result<()> {
//!     let rgb = GridDataset::with_unit_spacing(UVec3::new(2, 1, 1), 3, vec![10, 20, 30, 200, 150, 100])?;
//!     let mut pipeline = TransferPipeline::volume();
//!     pipeline.bind(transform_dataset(Arc::new(rgb))?)?;
//!
//!     let mut session = RenderSession::new(WgpuBackend::default(), Options::default());
//!     session.attach_view(SurfaceHandle::Offscreen, 512, 512)?;
//!     session.add_pipeline(&pipeline)?;
//!     let frame = session.capture()?;
//!     session.release();
//!     Ok(())
//! }
//! ```
//!
//! # Loading
//!
//! Loads are tagged with a generation so a result arriving after the view
//! was released or re-attached is dropped:
//!
//! ```no_run
//! use volscope::*;
//!
//! # fn main() -> Result<()> {
//! let mut session = RenderSession::new(WgpuBackend::default(), Options::default());
//! session.attach_view(SurfaceHandle::Offscreen, 256, 256)?;
//! let mut pipeline = TransferPipeline::volume();
//!
//! let ticket = session.begin_load();
//! let loaded = pollster::block_on(fetch_tagged(&RawVolumeLoader::new(), "head.json", ticket));
//! session.apply_load(loaded, &mut pipeline)?;
//! # Ok(())
//! # }
//! ```

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod headless;
pub mod lifecycle;
pub mod loader;
pub mod session;

pub use volscope_core::{
    luminance, transform, transform_dataset, Actor, ActorKind, BlendMode, ComponentKind,
    GridDataset, Interpolation, LoadGeneration, LoadTicket, Mat4, Options, PipelineId,
    PipelineMode, Result, SliceProperties, SlicingAxis, TransferPipeline, UVec3, Vec3,
    VolumeError, VolumeProperties, RGBA_COMPONENTS,
};
pub use volscope_render::{
    encode_png, save_frame, Camera, CameraInteractor, Frame, InteractionEvent, MouseButton,
    ProjectionMode, RenderBackend, RenderError, SurfaceHandle, WgpuBackend,
};

pub use headless::{offscreen_session, render_to_file, render_to_frame};
pub use lifecycle::{SessionLifecycle, SessionState};
pub use loader::{fetch_tagged, GridLoader, LoadedGrid, RawVolumeHeader, RawVolumeLoader};
pub use session::{LoadOutcome, RenderSession};

/// Initializes logging from `RUST_LOG`. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::try_init();
}
