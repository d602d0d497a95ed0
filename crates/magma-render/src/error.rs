//! Render error types.

use magma_gpu::GpuError;
use thiserror::Error;

/// Render-related errors.
#[derive(Error, Debug)]
pub enum RenderError {
    /// I/O error while loading an asset.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed model data.
    #[error("Parse error: {0}")]
    Parse(String),

    /// GPU error.
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, RenderError>;
