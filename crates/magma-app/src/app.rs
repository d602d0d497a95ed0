//! `MagmaApp` trait definition.

use crate::context::AppContext;
use crate::frame::FrameContext;
use winit::event::{DeviceEvent, DeviceId, WindowEvent};

/// Trait for Magma applications.
///
/// Implement this to get a window, a GPU context, a swapchain, and a running
/// frame loop; the framework calls back into the trait at the right points
/// of the per-frame protocol.
pub trait MagmaApp: Sized {
    /// Initialize the application.
    ///
    /// Called once, after the window, GPU context, and swapchain exist.
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self>;

    /// Update application state.
    ///
    /// Runs after the frame's fence wait has proven the GPU is done with the
    /// previous submission, so writing the uniform block here is safe.
    ///
    /// # Arguments
    /// * `ctx` - Application context with GPU and window access
    /// * `dt` - Delta time in seconds since last frame
    fn update(&mut self, ctx: &AppContext, dt: f32);

    /// Record the frame's draw commands.
    ///
    /// The command buffer in `frame` is already in the recording state; the
    /// framework ends, submits, and presents it.
    fn render(&mut self, ctx: &AppContext, frame: &mut FrameContext) -> anyhow::Result<()>;

    /// Handle a swapchain rebuild.
    ///
    /// The framework has already recreated the swapchain resource group;
    /// rebuild anything that depends on its render pass or size here.
    ///
    /// Default implementation does nothing.
    #[allow(unused_variables)]
    fn on_resize(&mut self, ctx: &mut AppContext, width: u32, height: u32) -> anyhow::Result<()> {
        Ok(())
    }

    /// Handle window events.
    ///
    /// Return `true` if the event was consumed and should not be processed
    /// further. Default implementation returns `false`.
    #[allow(unused_variables)]
    fn on_event(&mut self, event: &WindowEvent) -> bool {
        false
    }

    /// Handle device events (raw input, e.g. mouse deltas).
    ///
    /// Default implementation does nothing.
    #[allow(unused_variables)]
    fn on_device_event(&mut self, device_id: DeviceId, event: &DeviceEvent) {}

    /// Cleanup resources before shutdown.
    ///
    /// The device is idle when this runs, so destroying GPU resources is
    /// safe. Default implementation does nothing.
    #[allow(unused_variables)]
    fn cleanup(&mut self, ctx: &mut AppContext) {}
}
