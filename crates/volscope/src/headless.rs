//! Headless rendering helpers.
//!
//! Renders a dataset into an offscreen view without opening a window. Useful
//! for integration tests, batch conversion and thumbnails.

use std::path::Path;
use std::sync::Arc;

use volscope_core::{
    transform_dataset, GridDataset, Options, PipelineMode, Result, TransferPipeline, VolumeError,
};
use volscope_render::{save_frame, Frame, SurfaceHandle, WgpuBackend};

use crate::session::RenderSession;

/// Creates a wgpu session attached to an offscreen view.
pub fn offscreen_session(
    options: Options,
    width: u32,
    height: u32,
) -> Result<RenderSession<WgpuBackend>> {
    let mut session = RenderSession::new(WgpuBackend::default(), options);
    session.attach_view(SurfaceHandle::Offscreen, width, height)?;
    Ok(session)
}

/// Renders `dataset` with a pipeline in `mode` and returns the frame.
///
/// RGB and grayscale datasets get a luminance alpha channel first.
///
/// # Example
/// ```no_run
/// use volscope::*;
///
/// let grid = GridDataset::with_unit_spacing(UVec3::new(2, 2, 2), 1, vec![255; 8]).unwrap();
/// let frame = render_to_frame(grid, PipelineMode::Volume, &Options::default(), 64, 64).unwrap();
/// assert_eq!(frame.pixels.len(), 64 * 64 * 4);
/// ```
pub fn render_to_frame(
    dataset: GridDataset,
    mode: PipelineMode,
    options: &Options,
    width: u32,
    height: u32,
) -> Result<Frame> {
    let mut pipeline = TransferPipeline::from_options(options, mode)?;
    pipeline.bind(transform_dataset(Arc::new(dataset))?)?;

    let mut session = offscreen_session(options.clone(), width, height)?;
    session.add_pipeline(&pipeline)?;
    let frame = session.capture()?;
    session.release();
    Ok(frame)
}

/// Renders `dataset` and writes the frame to `path` (png or jpeg).
pub fn render_to_file(
    path: impl AsRef<Path>,
    dataset: GridDataset,
    mode: PipelineMode,
    options: &Options,
    width: u32,
    height: u32,
) -> Result<()> {
    let frame = render_to_frame(dataset, mode, options, width, height)?;
    save_frame(path, &frame).map_err(|e| VolumeError::Render(format!("failed to save image: {e}")))
}
