//! Vulkan resource-lifecycle and frame-synchronization layer for Magma.
//!
//! This crate provides:
//! - Vulkan instance creation and physical device selection
//! - Explicit memory-type selection and buffer/image allocation
//! - The swapchain resource group (images, depth, MSAA, render pass, framebuffers)
//! - The per-frame wait/acquire/record/submit/present protocol
//! - Command pool, descriptor, and pipeline plumbing

pub mod command;
pub mod context;
pub mod descriptors;
pub mod device;
pub mod error;
pub mod frame;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use command::{execute_single_time_commands, record_draw, CommandPool, DrawRecording};
pub use context::{GpuContext, GpuContextBuilder};
pub use descriptors::{write_uniform_buffer, DescriptorPool, DescriptorSetLayoutBuilder};
pub use device::DeviceSelection;
pub use error::{GpuError, Result};
pub use frame::{draw_frame, FrameHooks, FrameOutcome};
pub use memory::{find_memory_type_index, GpuAllocator, GpuBuffer, GpuImage};
pub use pipeline::{GraphicsPipeline, GraphicsPipelineConfig};
pub use surface::{SurfaceCapabilities, SurfaceContext};
pub use swapchain::SwapchainUnit;
pub use sync::{create_fence, create_semaphore, FrameSync, FrameSyncManager};
