//! GPU error types.

use ash::vk;
use thiserror::Error;

/// GPU-related errors.
///
/// Every variant here is a fatal configuration or resource error: callers are
/// expected to report it and terminate. Presentation staleness is *not* an
/// error; it is surfaced as [`crate::frame::FrameOutcome::SurfaceStale`].
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// No physical device passed all capability checks.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// No memory type matches both the type bits and the property flags.
    #[error("No compatible memory type (type bits {type_bits:#b}, flags {flags:?})")]
    NoCompatibleMemoryType {
        type_bits: u32,
        flags: vk::MemoryPropertyFlags,
    },

    /// Graphics and present queue families differ; image sharing is unsupported.
    #[error("Graphics queue family {graphics} and present queue family {present} differ")]
    QueueFamilyMismatch { graphics: u32, present: u32 },

    /// The surface offers no acceptable format.
    #[error("No acceptable surface format")]
    NoSurfaceFormat,

    /// The surface offers no present mode.
    #[error("No present mode available")]
    NoPresentMode,

    /// No candidate depth format is supported for depth-stencil attachment.
    #[error("No supported depth buffer format")]
    NoDepthFormat,

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// Shader module creation failed.
    #[error("Shader compilation failed: {0}")]
    ShaderCompilation(String),

    /// Pipeline creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
