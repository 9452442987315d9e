//! Luminance-based alpha synthesis.
//!
//! Converts RGB or grayscale sample buffers into RGBA buffers whose alpha
//! channel is the perceptual luminance of each voxel, so brighter voxels
//! render more opaque.

use std::sync::Arc;

use rayon::prelude::*;

use crate::dataset::{ComponentKind, GridDataset};
use crate::error::{Result, VolumeError};

/// Components per sample of every transformed buffer.
pub const RGBA_COMPONENTS: usize = 4;

/// Voxels handed to a single rayon task.
const VOXELS_PER_TASK: usize = 64 * 1024;

/// Red luminance weight.
pub const LUMA_R: f64 = 0.3;
/// Green luminance weight.
pub const LUMA_G: f64 = 0.59;
/// Blue luminance weight.
pub const LUMA_B: f64 = 0.11;

/// Computes `round(0.3 r + 0.59 g + 0.11 b)` clamped to `[0, 255]`.
///
/// Ties round to even, so `16.5` becomes 16 and `159.5` becomes 160.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to u8 range
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let l = LUMA_R * f64::from(r) + LUMA_G * f64::from(g) + LUMA_B * f64::from(b);
    l.round_ties_even().clamp(0.0, 255.0) as u8
}

/// Converts a 1- or 3-component buffer into a 4-component RGBA buffer.
///
/// - 3 components: `(r, g, b)` becomes `(r, g, b, luminance(r, g, b))`
/// - 1 component: `v` becomes `(v, v, v, v)`
///
/// An empty buffer yields an empty result.
///
/// # Errors
/// Returns [`VolumeError::InvalidSampleLayout`] if `components` is not 1 or 3,
/// or if the buffer length is not a multiple of `components`.
pub fn transform(buffer: &[u8], components: usize) -> Result<Vec<u8>> {
    if components != 1 && components != 3 {
        return Err(VolumeError::InvalidSampleLayout(format!(
            "cannot synthesize alpha from {components} components per sample"
        )));
    }
    if buffer.len() % components != 0 {
        return Err(VolumeError::InvalidSampleLayout(format!(
            "buffer of {} samples is not a multiple of {components} components",
            buffer.len()
        )));
    }

    let voxels = buffer.len() / components;
    let mut rgba = vec![0u8; voxels * RGBA_COMPONENTS];

    // Each task owns a disjoint output range; the result does not depend on
    // how rayon schedules them.
    rgba.par_chunks_mut(VOXELS_PER_TASK * RGBA_COMPONENTS)
        .zip(buffer.par_chunks(VOXELS_PER_TASK * components))
        .for_each(|(dst, src)| {
            if components == 3 {
                rgb_to_rgba(src, dst);
            } else {
                gray_to_rgba(src, dst);
            }
        });

    Ok(rgba)
}

fn rgb_to_rgba(src: &[u8], dst: &mut [u8]) {
    for (rgb, out) in src.chunks_exact(3).zip(dst.chunks_exact_mut(RGBA_COMPONENTS)) {
        out[..3].copy_from_slice(rgb);
        out[3] = luminance(rgb[0], rgb[1], rgb[2]);
    }
}

fn gray_to_rgba(src: &[u8], dst: &mut [u8]) {
    for (&v, out) in src.iter().zip(dst.chunks_exact_mut(RGBA_COMPONENTS)) {
        out.fill(v);
    }
}

/// Produces the RGBA form of a dataset.
///
/// RGB and grayscale grids yield a new, independently owned grid with the
/// same geometry. RGBA grids already carry opacity and are returned as-is.
pub fn transform_dataset(dataset: Arc<GridDataset>) -> Result<Arc<GridDataset>> {
    match dataset.component_kind() {
        ComponentKind::Rgba => Ok(dataset),
        ComponentKind::Rgb | ComponentKind::Grayscale => {
            let rgba = transform(dataset.scalars(), dataset.components_per_sample())?;
            log::debug!(
                "synthesized luminance alpha for {} {} voxels",
                dataset.num_voxels(),
                dataset.component_kind().name()
            );
            let transformed = GridDataset::new(
                dataset.dimensions(),
                dataset.spacing(),
                dataset.origin(),
                RGBA_COMPONENTS,
                rgba,
            )?;
            Ok(Arc::new(transformed))
        }
    }
}
