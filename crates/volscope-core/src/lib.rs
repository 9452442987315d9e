//! Core abstractions for volscope.
//!
//! This crate provides the data model and transfer-function logic shared by
//! the renderer and the session layer:
//! - [`GridDataset`] for structured 3D scalar grids
//! - [`luminance`] for synthesizing an RGBA alpha channel from RGB or grayscale samples
//! - [`TransferPipeline`] binding RGBA datasets to volume or slice actors
//! - [`LoadGeneration`] tagging for discarding superseded loads
//! - Configuration options and error types

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]

pub mod dataset;
pub mod error;
pub mod generation;
pub mod luminance;
pub mod options;
pub mod pipeline;

pub use dataset::{ComponentKind, GridDataset};
pub use error::{Result, VolumeError};
pub use generation::{LoadGeneration, LoadTicket};
pub use luminance::{luminance, transform, transform_dataset, RGBA_COMPONENTS};
pub use options::Options;
pub use pipeline::{
    Actor, ActorKind, BlendMode, Interpolation, PipelineId, PipelineMode, SliceProperties,
    SlicingAxis, TransferPipeline, VolumeProperties,
};

// Re-export glam types for convenience
pub use glam::{Mat4, UVec3, Vec3};
