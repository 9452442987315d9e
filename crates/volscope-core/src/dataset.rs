//! Structured 3D scalar grids.
//!
//! A [`GridDataset`] is an immutable regular grid of 8-bit samples:
//! - Grid dimensions (number of voxels in X, Y, Z)
//! - Spacing and origin placing the grid in world space
//! - A flat sample buffer, X varying fastest, then Y, then Z
//!
//! Spacing and origin only matter for world-space bounds; the sample
//! transform never looks at them.

use glam::{UVec3, Vec3};

use crate::error::{Result, VolumeError};

/// How the components of each sample are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// One channel, used for both color and opacity.
    Grayscale,
    /// Three color channels, no opacity.
    Rgb,
    /// Three color channels plus opacity.
    Rgba,
}

impl ComponentKind {
    /// Returns the kind matching a per-sample component count.
    ///
    /// Returns `None` for counts other than 1, 3 or 4.
    #[must_use]
    pub fn from_components(components: usize) -> Option<Self> {
        match components {
            1 => Some(Self::Grayscale),
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }

    /// Number of components per sample.
    #[must_use]
    pub fn components(self) -> usize {
        match self {
            Self::Grayscale => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    /// Returns display name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Grayscale => "grayscale",
            Self::Rgb => "RGB",
            Self::Rgba => "RGBA",
        }
    }
}

/// An immutable structured 3D scalar grid plus its raw sample buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct GridDataset {
    dimensions: UVec3,
    spacing: Vec3,
    origin: Vec3,
    kind: ComponentKind,
    scalars: Vec<u8>,
}

impl GridDataset {
    /// Creates a new grid.
    ///
    /// # Arguments
    /// * `dimensions` - Number of voxels along each axis (all > 0)
    /// * `spacing` - World-space size of a voxel (all > 0)
    /// * `origin` - World-space position of voxel (0, 0, 0)
    /// * `components` - Components per sample (1, 3 or 4)
    /// * `scalars` - Flat sample buffer of `voxels * components` bytes
    pub fn new(
        dimensions: UVec3,
        spacing: Vec3,
        origin: Vec3,
        components: usize,
        scalars: Vec<u8>,
    ) -> Result<Self> {
        if dimensions.min_element() == 0 {
            return Err(VolumeError::InvalidGeometry(format!(
                "dimensions must be positive, got {}x{}x{}",
                dimensions.x, dimensions.y, dimensions.z
            )));
        }
        if !spacing.is_finite() || spacing.min_element() <= 0.0 {
            return Err(VolumeError::InvalidGeometry(format!(
                "spacing must be positive, got {spacing}"
            )));
        }
        if !origin.is_finite() {
            return Err(VolumeError::InvalidGeometry(format!(
                "origin must be finite, got {origin}"
            )));
        }

        let kind = ComponentKind::from_components(components).ok_or_else(|| {
            VolumeError::InvalidSampleLayout(format!(
                "{components} components per sample is not supported"
            ))
        })?;

        let expected = Self::checked_voxel_count(dimensions)
            .and_then(|voxels| voxels.checked_mul(components as u64))
            .ok_or_else(|| VolumeError::InvalidGeometry("grid too large".to_string()))?;
        if scalars.len() as u64 != expected {
            return Err(VolumeError::InvalidSampleLayout(format!(
                "expected {expected} samples for {}x{}x{} voxels with {components} components, got {}",
                dimensions.x,
                dimensions.y,
                dimensions.z,
                scalars.len()
            )));
        }

        Ok(Self {
            dimensions,
            spacing,
            origin,
            kind,
            scalars,
        })
    }

    /// Creates a grid with unit spacing at the world origin.
    pub fn with_unit_spacing(dimensions: UVec3, components: usize, scalars: Vec<u8>) -> Result<Self> {
        Self::new(dimensions, Vec3::ONE, Vec3::ZERO, components, scalars)
    }

    fn checked_voxel_count(dimensions: UVec3) -> Option<u64> {
        u64::from(dimensions.x)
            .checked_mul(u64::from(dimensions.y))?
            .checked_mul(u64::from(dimensions.z))
    }

    /// Returns the number of voxels in each dimension.
    #[must_use]
    pub fn dimensions(&self) -> UVec3 {
        self.dimensions
    }

    /// Returns the world-space voxel size.
    #[must_use]
    pub fn spacing(&self) -> Vec3 {
        self.spacing
    }

    /// Returns the world-space position of the first voxel.
    #[must_use]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Returns how samples are interpreted.
    #[must_use]
    pub fn component_kind(&self) -> ComponentKind {
        self.kind
    }

    /// Returns the number of components per sample.
    #[must_use]
    pub fn components_per_sample(&self) -> usize {
        self.kind.components()
    }

    /// Returns the raw sample buffer.
    #[must_use]
    pub fn scalars(&self) -> &[u8] {
        &self.scalars
    }

    /// Consumes the grid and returns its sample buffer.
    #[must_use]
    pub fn into_scalars(self) -> Vec<u8> {
        self.scalars
    }

    /// Returns the total number of voxels.
    #[must_use]
    pub fn num_voxels(&self) -> u64 {
        // The buffer length already bounds this product.
        self.scalars.len() as u64 / self.components_per_sample() as u64
    }

    /// Returns the world-space bounding box `(min, max)` through voxel centers.
    #[must_use]
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let extent = (self.dimensions - UVec3::ONE).as_vec3() * self.spacing;
        (self.origin, self.origin + extent)
    }

    /// Returns a characteristic length scale (bounding box diagonal).
    #[must_use]
    pub fn length_scale(&self) -> f32 {
        let (min, max) = self.bounds();
        (max - min).length()
    }

    /// Flattens a 3D voxel index to a linear index.
    #[must_use]
    pub fn flatten_index(&self, i: u32, j: u32, k: u32) -> u64 {
        u64::from(i)
            + (u64::from(j) * u64::from(self.dimensions.x))
            + (u64::from(k) * u64::from(self.dimensions.x) * u64::from(self.dimensions.y))
    }

    /// Unflattens a linear voxel index to a 3D index.
    #[must_use]
    pub fn unflatten_index(&self, idx: u64) -> UVec3 {
        let x = idx % u64::from(self.dimensions.x);
        let y = (idx / u64::from(self.dimensions.x)) % u64::from(self.dimensions.y);
        let z = idx / (u64::from(self.dimensions.x) * u64::from(self.dimensions.y));
        UVec3::new(x as u32, y as u32, z as u32)
    }

    /// Returns the components of the voxel at `(i, j, k)`, or `None` when out of range.
    #[must_use]
    pub fn voxel(&self, i: u32, j: u32, k: u32) -> Option<&[u8]> {
        if i >= self.dimensions.x || j >= self.dimensions.y || k >= self.dimensions.z {
            return None;
        }
        let components = self.components_per_sample();
        let start = usize::try_from(self.flatten_index(i, j, k)).ok()? * components;
        self.scalars.get(start..start + components)
    }

    /// Returns the world position of the voxel at the given 3D index.
    #[must_use]
    pub fn position_of_voxel(&self, i: u32, j: u32, k: u32) -> Vec3 {
        self.origin + UVec3::new(i, j, k).as_vec3() * self.spacing
    }

    /// Returns the `(min, max)` value of one component over all voxels.
    ///
    /// Returns `None` when `component` is out of range.
    #[must_use]
    pub fn scalar_range(&self, component: usize) -> Option<(u8, u8)> {
        let components = self.components_per_sample();
        if component >= components {
            return None;
        }
        let mut values = self.scalars.iter().skip(component).step_by(components);
        let first = *values.next()?;
        Some(values.fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))))
    }
}
