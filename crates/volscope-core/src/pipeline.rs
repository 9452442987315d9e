//! Transfer pipelines: the binding between a dataset and its renderable actor.
//!
//! A [`TransferPipeline`] owns the mapper configuration of exactly one actor,
//! either a 3D volume or a 2D slice, and at most one bound RGBA dataset.
//! Rebinding swaps the dataset but keeps the pipeline identity and
//! configuration, so a render session can replace the uploaded actor in place.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::dataset::GridDataset;
use crate::error::{Result, VolumeError};
use crate::luminance::RGBA_COMPONENTS;
use crate::options::Options;

static NEXT_PIPELINE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a transfer pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineId(u64);

impl PipelineId {
    fn next() -> Self {
        Self(NEXT_PIPELINE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Which kind of actor a pipeline drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineMode {
    /// Full 3D volumetric rendering.
    Volume,
    /// 2D display of a single plane of the grid.
    Slice,
}

impl PipelineMode {
    /// Returns display name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            PipelineMode::Volume => "volume",
            PipelineMode::Slice => "slice",
        }
    }
}

/// Compositing rule used along each view ray.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BlendMode {
    /// Front-to-back "over" compositing.
    #[default]
    Composite,
    /// Maximum intensity projection.
    MaximumIntensity,
    /// Minimum intensity projection.
    MinimumIntensity,
    /// Opacity-weighted sum of all samples.
    Additive,
}

impl BlendMode {
    /// Index used by the GPU shader.
    #[must_use]
    pub fn to_index(self) -> u32 {
        match self {
            BlendMode::Composite => 0,
            BlendMode::MaximumIntensity => 1,
            BlendMode::MinimumIntensity => 2,
            BlendMode::Additive => 3,
        }
    }
}

/// Sample interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Interpolation {
    /// Nearest voxel.
    Nearest,
    /// Trilinear.
    #[default]
    Linear,
}

/// Axis perpendicular to the displayed slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SlicingAxis {
    X,
    Y,
    #[default]
    Z,
}

impl SlicingAxis {
    /// Index of the axis (0 = X, 1 = Y, 2 = Z).
    #[must_use]
    pub fn to_index(self) -> usize {
        match self {
            SlicingAxis::X => 0,
            SlicingAxis::Y => 1,
            SlicingAxis::Z => 2,
        }
    }
}

/// Mapper configuration of a volume actor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeProperties {
    /// Ray sampling distance in world units.
    pub sample_distance: f32,
    /// Compositing rule.
    pub blend_mode: BlendMode,
    /// Sample interpolation.
    pub interpolation: Interpolation,
}

impl Default for VolumeProperties {
    fn default() -> Self {
        Self {
            sample_distance: 1.5,
            blend_mode: BlendMode::Composite,
            interpolation: Interpolation::Linear,
        }
    }
}

/// Mapper configuration of a slice actor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceProperties {
    /// Axis perpendicular to the slice.
    pub axis: SlicingAxis,
    /// Width of the displayed sample range.
    pub color_window: f32,
    /// Center of the displayed sample range.
    pub color_level: f32,
    /// Slice index along `axis`; `None` slices through the grid center.
    pub slice_index: Option<u32>,
}

impl Default for SliceProperties {
    fn default() -> Self {
        Self {
            axis: SlicingAxis::Z,
            color_window: 255.0,
            color_level: 127.0,
            slice_index: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mapper {
    Volume(VolumeProperties),
    Slice(SliceProperties),
}

/// Actor-specific properties captured in an [`Actor`] snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActorKind {
    /// A 3D volume.
    Volume(VolumeProperties),
    /// A 2D slice; `slice_index` is always resolved against the dataset.
    Slice(SliceProperties),
}

/// Snapshot of a ready pipeline, consumed by a render session.
#[derive(Debug, Clone)]
pub struct Actor {
    /// Pipeline the actor belongs to.
    pub id: PipelineId,
    /// Bind revision the snapshot was taken at.
    pub revision: u64,
    /// Bound RGBA dataset.
    pub dataset: Arc<GridDataset>,
    /// Mapper configuration.
    pub kind: ActorKind,
}

impl Actor {
    /// World-space bounds of the actor.
    #[must_use]
    pub fn bounds(&self) -> (Vec3, Vec3) {
        self.dataset.bounds()
    }

    /// World-space box the actor covers when drawn.
    ///
    /// Each voxel fills a whole cell, so this extends [`bounds`](Self::bounds)
    /// by half a spacing on every side.
    #[must_use]
    pub fn render_bounds(&self) -> (Vec3, Vec3) {
        let (min, max) = self.dataset.bounds();
        let half = self.dataset.spacing() * 0.5;
        (min - half, max + half)
    }
}

/// Binds a dataset to a renderable volume or slice actor.
#[derive(Debug)]
pub struct TransferPipeline {
    id: PipelineId,
    mapper: Mapper,
    dataset: Option<Arc<GridDataset>>,
    revision: u64,
}

impl TransferPipeline {
    fn with_mapper(mapper: Mapper) -> Self {
        Self {
            id: PipelineId::next(),
            mapper,
            dataset: None,
            revision: 0,
        }
    }

    /// Creates a 3D volume pipeline with default configuration.
    #[must_use]
    pub fn volume() -> Self {
        Self::with_mapper(Mapper::Volume(VolumeProperties::default()))
    }

    /// Creates a 2D slice pipeline with default configuration.
    #[must_use]
    pub fn slice() -> Self {
        Self::with_mapper(Mapper::Slice(SliceProperties::default()))
    }

    /// Creates a pipeline whose initial configuration comes from `options`.
    ///
    /// # Errors
    /// Returns the same errors as [`configure_volume`](Self::configure_volume)
    /// or [`configure_slice`](Self::configure_slice) for out-of-range values.
    pub fn from_options(options: &Options, mode: PipelineMode) -> Result<Self> {
        let mut pipeline = match mode {
            PipelineMode::Volume => Self::volume(),
            PipelineMode::Slice => Self::slice(),
        };
        match mode {
            PipelineMode::Volume => pipeline.configure_volume(
                options.sample_distance,
                options.blend_mode,
                options.interpolation,
            )?,
            PipelineMode::Slice => pipeline.configure_slice(
                options.slicing_axis,
                options.color_window,
                options.color_level,
            )?,
        }
        Ok(pipeline)
    }

    /// Returns the pipeline identity.
    #[must_use]
    pub fn id(&self) -> PipelineId {
        self.id
    }

    /// Returns which actor kind this pipeline drives.
    #[must_use]
    pub fn mode(&self) -> PipelineMode {
        match self.mapper {
            Mapper::Volume(_) => PipelineMode::Volume,
            Mapper::Slice(_) => PipelineMode::Slice,
        }
    }

    /// Returns the number of successful binds so far.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Binds an RGBA dataset, replacing any previous binding.
    ///
    /// # Errors
    /// Returns [`VolumeError::UnsupportedComponentLayout`] if the dataset does
    /// not have 4 components per sample. The previous binding is kept.
    pub fn bind(&mut self, dataset: Arc<GridDataset>) -> Result<()> {
        let components = dataset.components_per_sample();
        if components != RGBA_COMPONENTS {
            return Err(VolumeError::UnsupportedComponentLayout(components));
        }

        let dims = dataset.dimensions();
        log::info!(
            "{} pipeline {} bound to {}x{}x{} grid",
            self.mode().name(),
            self.id.get(),
            dims.x,
            dims.y,
            dims.z
        );
        self.dataset = Some(dataset);
        self.revision += 1;
        Ok(())
    }

    /// Drops the bound dataset. The pipeline is no longer ready afterwards.
    pub fn release(&mut self) {
        self.dataset = None;
    }

    /// Returns whether a dataset is bound.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.dataset.is_some()
    }

    /// Returns the bound dataset.
    #[must_use]
    pub fn dataset(&self) -> Option<&Arc<GridDataset>> {
        self.dataset.as_ref()
    }

    /// Returns the world-space bounds of the bound dataset.
    #[must_use]
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        self.dataset.as_ref().map(|d| d.bounds())
    }

    /// Returns the volume configuration, or `None` for slice pipelines.
    #[must_use]
    pub fn volume_properties(&self) -> Option<&VolumeProperties> {
        match &self.mapper {
            Mapper::Volume(props) => Some(props),
            Mapper::Slice(_) => None,
        }
    }

    /// Returns the slice configuration, or `None` for volume pipelines.
    #[must_use]
    pub fn slice_properties(&self) -> Option<&SliceProperties> {
        match &self.mapper {
            Mapper::Slice(props) => Some(props),
            Mapper::Volume(_) => None,
        }
    }

    fn mode_mismatch(expected: PipelineMode, actual: PipelineMode) -> VolumeError {
        VolumeError::PipelineModeMismatch {
            expected: expected.name(),
            actual: actual.name(),
        }
    }

    /// Sets the single-slice display parameters.
    ///
    /// Changing the axis moves the slice back to the grid center.
    ///
    /// # Errors
    /// - [`VolumeError::PipelineModeMismatch`] on a volume pipeline
    /// - [`VolumeError::InvalidDisplayParameter`] if `window` is not a positive
    ///   finite number or `level` is not finite
    ///
    /// Nothing changes when an error is returned.
    pub fn configure_slice(&mut self, axis: SlicingAxis, window: f32, level: f32) -> Result<()> {
        let actual = self.mode();
        let Mapper::Slice(props) = &mut self.mapper else {
            return Err(Self::mode_mismatch(PipelineMode::Slice, actual));
        };
        if !window.is_finite() || window <= 0.0 {
            return Err(VolumeError::InvalidDisplayParameter {
                name: "color window",
                value: f64::from(window),
            });
        }
        if !level.is_finite() {
            return Err(VolumeError::InvalidDisplayParameter {
                name: "color level",
                value: f64::from(level),
            });
        }

        if props.axis != axis {
            props.slice_index = None;
        }
        props.axis = axis;
        props.color_window = window;
        props.color_level = level;
        Ok(())
    }

    /// Moves the slice to `index` along the slicing axis.
    ///
    /// # Errors
    /// - [`VolumeError::PipelineModeMismatch`] on a volume pipeline
    /// - [`VolumeError::PipelineNotReady`] if no dataset is bound
    /// - [`VolumeError::InvalidDisplayParameter`] if `index` is outside the grid
    pub fn set_slice_index(&mut self, index: u32) -> Result<()> {
        let actual = self.mode();
        let Mapper::Slice(props) = &mut self.mapper else {
            return Err(Self::mode_mismatch(PipelineMode::Slice, actual));
        };
        let dataset = self.dataset.as_ref().ok_or(VolumeError::PipelineNotReady)?;
        let extent = dataset.dimensions().to_array()[props.axis.to_index()];
        if index >= extent {
            return Err(VolumeError::InvalidDisplayParameter {
                name: "slice index",
                value: f64::from(index),
            });
        }
        props.slice_index = Some(index);
        Ok(())
    }

    /// Sets the volume rendering parameters.
    ///
    /// Smaller sample distances give better images at higher render cost.
    ///
    /// # Errors
    /// - [`VolumeError::PipelineModeMismatch`] on a slice pipeline
    /// - [`VolumeError::InvalidSampleDistance`] if `sample_distance` is not a
    ///   positive finite number
    ///
    /// Nothing changes when an error is returned.
    pub fn configure_volume(
        &mut self,
        sample_distance: f32,
        blend_mode: BlendMode,
        interpolation: Interpolation,
    ) -> Result<()> {
        let actual = self.mode();
        let Mapper::Volume(props) = &mut self.mapper else {
            return Err(Self::mode_mismatch(PipelineMode::Volume, actual));
        };
        if !sample_distance.is_finite() || sample_distance <= 0.0 {
            return Err(VolumeError::InvalidSampleDistance(sample_distance));
        }
        *props = VolumeProperties {
            sample_distance,
            blend_mode,
            interpolation,
        };
        Ok(())
    }

    /// Takes a snapshot of the actor for rendering.
    ///
    /// Returns `None` until a dataset has been bound.
    #[must_use]
    pub fn actor(&self) -> Option<Actor> {
        let dataset = Arc::clone(self.dataset.as_ref()?);
        let kind = match self.mapper {
            Mapper::Volume(props) => ActorKind::Volume(props),
            Mapper::Slice(props) => {
                let extent = dataset.dimensions().to_array()[props.axis.to_index()];
                let index = props.slice_index.map_or(extent / 2, |i| i.min(extent - 1));
                ActorKind::Slice(SliceProperties {
                    slice_index: Some(index),
                    ..props
                })
            }
        };
        Some(Actor {
            id: self.id,
            revision: self.revision,
            dataset,
            kind,
        })
    }
}
