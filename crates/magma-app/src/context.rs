//! Application context.

use std::sync::Arc;
use std::time::Instant;

use ash::vk;
use magma_gpu::{
    CommandPool, FrameSyncManager, GpuContext, GpuContextBuilder, SurfaceContext, SwapchainUnit,
};
use winit::window::Window;

/// Application context shared across all app methods.
///
/// Owns the window, GPU context, surface, swapchain resource group, and the
/// per-frame command buffers and synchronization ring.
pub struct AppContext {
    /// The window handle.
    pub window: Arc<Window>,
    /// GPU context with device and queues.
    pub gpu: GpuContext,
    /// Surface context for windowed rendering.
    pub surface: SurfaceContext,
    /// The swapchain and everything tied to its lifetime.
    pub unit: SwapchainUnit,
    /// Command pool for per-frame command buffers.
    pub command_pool: CommandPool,
    /// One command buffer per sync ring slot.
    pub(crate) command_buffers: Vec<vk::CommandBuffer>,
    /// Per-frame synchronization ring.
    pub(crate) sync: FrameSyncManager,
    /// Total frames rendered.
    pub frame_count: u64,
    /// Time of last frame (for delta time calculation).
    pub(crate) last_frame_time: Instant,
}

impl AppContext {
    /// Create a new application context.
    ///
    /// # Safety
    /// The window must have valid handles and outlive the context.
    pub(crate) unsafe fn new(
        window: Arc<Window>,
        app_name: &str,
        validation: bool,
        frames_in_flight: usize,
    ) -> anyhow::Result<Self> {
        let (gpu, surface) = GpuContextBuilder::new()
            .app_name(app_name)
            .validation(validation)
            .build_windowed(window.as_ref())?;

        tracing::info!("GPU: {}", gpu.device_name());

        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);

        // SAFETY: GPU context and surface are valid
        let unit = unsafe { SwapchainUnit::create(&gpu, &surface, width, height)? };

        tracing::info!(
            "Swapchain created: {}x{} ({} images)",
            unit.extent.width,
            unit.extent.height,
            unit.images.len()
        );

        // SAFETY: Device is valid
        let command_pool = unsafe { CommandPool::new(gpu.device(), gpu.graphics_queue_family())? };
        // SAFETY: Pool was just created
        let command_buffers =
            unsafe { command_pool.allocate_command_buffers(gpu.device(), frames_in_flight as u32)? };
        // SAFETY: Device is valid
        let sync = unsafe { FrameSyncManager::new(gpu.device(), frames_in_flight)? };

        Ok(Self {
            window,
            gpu,
            surface,
            unit,
            command_pool,
            command_buffers,
            sync,
            frame_count: 0,
            last_frame_time: Instant::now(),
        })
    }

    /// Get the current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.unit.extent
    }

    /// Get the swapchain width.
    pub fn width(&self) -> u32 {
        self.unit.extent.width
    }

    /// Get the swapchain height.
    pub fn height(&self) -> u32 {
        self.unit.extent.height
    }

    /// Get the aspect ratio (width / height).
    pub fn aspect_ratio(&self) -> f32 {
        self.unit.extent.width as f32 / self.unit.extent.height as f32
    }

    /// Get the number of frames in flight.
    pub fn frames_in_flight(&self) -> usize {
        self.sync.frames_in_flight()
    }

    /// Rebuild the swapchain resource group at the given size.
    ///
    /// Waits for the device to go idle before tearing down the old group.
    pub(crate) unsafe fn recreate_swapchain(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        // SAFETY: Caller guarantees the context is valid; recreate waits idle
        unsafe {
            self.unit
                .recreate(&self.gpu, &self.surface, width, height)?;
        }

        tracing::info!(
            "Swapchain recreated: {}x{}",
            self.unit.extent.width,
            self.unit.extent.height
        );

        Ok(())
    }

    /// Cleanup all resources.
    ///
    /// # Safety
    /// The GPU must be idle and all resources must not be in use.
    pub(crate) unsafe fn cleanup(&mut self) {
        // SAFETY: Caller guarantees GPU is idle and resources are not in use
        unsafe {
            self.unit.destroy(&self.gpu, &self.surface);
            self.sync.destroy(self.gpu.device());
            self.command_pool.destroy(self.gpu.device());
            self.surface.destroy();
        }
        // Device and instance go down with the GpuContext drop.
    }
}
