//! Configuration options for volscope.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pipeline::{BlendMode, Interpolation, SlicingAxis};

/// Global configuration options.
///
/// Every field has a default, so a JSON file only needs to name the values it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Background color of the view.
    pub background_color: Vec3,

    /// Initial ray sampling distance for volume pipelines (world units).
    pub sample_distance: f32,

    /// Initial blend mode for volume pipelines.
    pub blend_mode: BlendMode,

    /// Initial interpolation for volume pipelines.
    pub interpolation: Interpolation,

    /// Initial slicing axis for slice pipelines.
    pub slicing_axis: SlicingAxis,

    /// Initial color window for slice pipelines.
    pub color_window: f32,

    /// Initial color level for slice pipelines.
    pub color_level: f32,

    /// Panic on lifecycle-ordering violations instead of logging them.
    /// Defaults to on in debug builds.
    pub strict_lifecycle: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            background_color: Vec3::ZERO,
            sample_distance: 1.5,
            blend_mode: BlendMode::Composite,
            interpolation: Interpolation::Linear,
            slicing_axis: SlicingAxis::Z,
            color_window: 255.0,
            color_level: 127.0,
            strict_lifecycle: cfg!(debug_assertions),
        }
    }
}

impl Options {
    /// Parses options from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads options from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serializes options to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
