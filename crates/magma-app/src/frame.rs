//! Per-frame context for rendering.

use ash::vk;

/// Context for the frame currently being recorded.
pub struct FrameContext {
    /// Command buffer in the recording state.
    pub command_buffer: vk::CommandBuffer,
    /// Index of the acquired swapchain image.
    pub image_index: u32,
    /// Current swapchain extent.
    pub extent: vk::Extent2D,
    /// Delta time since last frame in seconds.
    pub dt: f32,
    /// Total frames rendered so far.
    pub frame_number: u64,
    /// Slot index into the sync ring.
    pub frame_index: usize,
}
