//! Dataset loaders.
//!
//! A [`GridLoader`] turns a locator string into a [`GridDataset`]. Transport
//! failures are reported as [`VolumeError::Network`], malformed content as
//! [`VolumeError::Parse`].

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use volscope_core::{GridDataset, LoadTicket, Result, UVec3, Vec3, VolumeError};

/// Source of structured grids.
pub trait GridLoader {
    /// Fetches and parses the grid at `url`.
    fn fetch_grid(&self, url: &str) -> impl Future<Output = Result<GridDataset>>;
}

/// A fetch result tagged with the generation it was started under.
#[derive(Debug)]
pub struct LoadedGrid {
    /// Ticket issued when the load started.
    pub ticket: LoadTicket,
    /// Loader outcome.
    pub result: Result<GridDataset>,
}

/// Runs `loader` for `url` and tags the outcome with `ticket`.
pub async fn fetch_tagged<L: GridLoader>(loader: &L, url: &str, ticket: LoadTicket) -> LoadedGrid {
    let result = loader.fetch_grid(url).await;
    if let Err(e) = &result {
        log::warn!("loading {url} failed: {e}");
    }
    LoadedGrid { ticket, result }
}

fn default_spacing() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

/// JSON header describing a raw voxel file.
///
/// ```json
/// { "dimensions": [64, 64, 32], "spacing": [1.0, 1.0, 2.0],
///   "origin": [0.0, 0.0, 0.0], "components": 3, "data": "head.raw" }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawVolumeHeader {
    /// Voxel counts along x, y, z.
    pub dimensions: [u32; 3],
    /// World-space distance between voxel centers.
    #[serde(default = "default_spacing")]
    pub spacing: [f32; 3],
    /// World-space position of voxel (0, 0, 0).
    #[serde(default)]
    pub origin: [f32; 3],
    /// Components per sample (1, 3 or 4).
    pub components: usize,
    /// Path of the raw `u8` sample file, relative to the header.
    pub data: PathBuf,
}

impl RawVolumeHeader {
    /// Parses a header from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| VolumeError::Parse(format!("invalid header: {e}")))
    }

    /// Number of bytes the data file must contain, or `None` if it overflows `u64`.
    #[must_use]
    pub fn expected_len(&self) -> Option<u64> {
        self.dimensions
            .iter()
            .try_fold(self.components as u64, |len, &d| len.checked_mul(u64::from(d)))
    }
}

/// Loads grids from a JSON header plus raw sample file on the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct RawVolumeLoader {
    root: Option<PathBuf>,
}

impl RawVolumeLoader {
    /// Creates a loader resolving relative locators against the working directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a loader resolving relative locators against `root`.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Reads the header at `url` and the data file it names.
    pub fn load(&self, url: &str) -> Result<GridDataset> {
        let header_path = self.resolve(url);
        let text = std::fs::read_to_string(&header_path).map_err(|e| {
            VolumeError::Network(format!("cannot read {}: {e}", header_path.display()))
        })?;
        let header = RawVolumeHeader::from_json_str(&text)?;
        let expected = header.expected_len().ok_or_else(|| {
            VolumeError::Parse(format!(
                "header describes an oversized grid {:?} x {}",
                header.dimensions, header.components
            ))
        })?;

        let data_path = if header.data.is_relative() {
            header_path
                .parent()
                .map_or_else(|| header.data.clone(), |dir| dir.join(&header.data))
        } else {
            header.data.clone()
        };
        let scalars = std::fs::read(&data_path).map_err(|e| {
            VolumeError::Network(format!("cannot read {}: {e}", data_path.display()))
        })?;

        if scalars.len() as u64 != expected {
            return Err(VolumeError::Parse(format!(
                "{} holds {} bytes, header describes {expected}",
                data_path.display(),
                scalars.len()
            )));
        }

        let dataset = GridDataset::new(
            UVec3::from_array(header.dimensions),
            Vec3::from_array(header.spacing),
            Vec3::from_array(header.origin),
            header.components,
            scalars,
        )
        .map_err(|e| VolumeError::Parse(e.to_string()))?;

        log::info!(
            "loaded {} grid {:?} from {}",
            dataset.component_kind().name(),
            header.dimensions,
            header_path.display()
        );
        Ok(dataset)
    }
}

impl GridLoader for RawVolumeLoader {
    async fn fetch_grid(&self, url: &str) -> Result<GridDataset> {
        self.load(url)
    }
}
