//! Error types for volscope.

use thiserror::Error;

/// The main error type for volscope operations.
#[derive(Error, Debug)]
pub enum VolumeError {
    /// A sample buffer does not match its declared component layout.
    #[error("invalid sample layout: {0}")]
    InvalidSampleLayout(String),

    /// Grid dimensions or spacing are unusable.
    #[error("invalid grid geometry: {0}")]
    InvalidGeometry(String),

    /// A pipeline was asked to bind data that is not RGBA.
    #[error("unsupported component layout: expected 4 components per sample, got {0}")]
    UnsupportedComponentLayout(usize),

    /// A slice display parameter is out of range.
    #[error("invalid display parameter '{name}': {value}")]
    InvalidDisplayParameter { name: &'static str, value: f64 },

    /// The volume sampling distance is not strictly positive.
    #[error("invalid sample distance: {0} (must be > 0)")]
    InvalidSampleDistance(f32),

    /// A slice operation was issued on a volume pipeline, or vice versa.
    #[error("operation requires a {expected} pipeline, but this pipeline renders a {actual}")]
    PipelineModeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// The pipeline has no dataset bound yet.
    #[error("pipeline has no bound dataset")]
    PipelineNotReady,

    /// `attach_view` was called on a session that is already attached.
    #[error("view already attached - call release() first")]
    ViewAlreadyAttached,

    /// The session has no attached view.
    #[error("session not attached - call attach_view() first")]
    SessionNotAttached,

    /// The loader could not retrieve the dataset.
    #[error("network error: {0}")]
    Network(String),

    /// The loader retrieved data that could not be parsed into a grid.
    #[error("parse error: {0}")]
    Parse(String),

    /// Rendering error.
    #[error("render error: {0}")]
    Render(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VolumeError {
    /// Returns true for errors that originate from the loader collaborator.
    #[must_use]
    pub fn is_load_error(&self) -> bool {
        matches!(self, VolumeError::Network(_) | VolumeError::Parse(_))
    }
}

/// A specialized Result type for volscope operations.
pub type Result<T> = std::result::Result<T, VolumeError>;
