//! The per-frame wait/acquire/record/submit/present protocol.
//!
//! [`draw_frame`] runs one iteration of the protocol in a strict order and
//! reports either a rendered frame or a stale surface; everything else is a
//! fatal error the caller terminates on.

use crate::error::{GpuError, Result};
use crate::surface::SurfaceContext;
use crate::swapchain::SwapchainUnit;
use crate::sync::FrameSync;
use ash::vk;

/// What one frame iteration produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was submitted and queued for presentation.
    Rendered,
    /// The surface no longer matches the swapchain; the caller must rebuild
    /// the swapchain resource group before the next frame.
    SurfaceStale,
}

/// Classification of the image-acquire result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireAction {
    /// An image was acquired; continue the frame. Covers `SUBOPTIMAL_KHR`,
    /// which still delivers a usable image.
    Proceed,
    /// No image was acquired; the swapchain must be rebuilt.
    Stale,
    /// Unrecoverable.
    Fatal(vk::Result),
}

/// Classification of the present result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentAction {
    /// Presented.
    Rendered,
    /// Presented or not, the swapchain must be rebuilt. Unlike acquire,
    /// `SUBOPTIMAL_KHR` counts as stale here: the frame already completed,
    /// so rebuilding now costs nothing.
    Stale,
    /// Unrecoverable.
    Fatal(vk::Result),
}

/// Classify the raw result of `vkAcquireNextImageKHR`.
pub fn classify_acquire(result: vk::Result) -> AcquireAction {
    match result {
        vk::Result::SUCCESS | vk::Result::SUBOPTIMAL_KHR => AcquireAction::Proceed,
        vk::Result::ERROR_OUT_OF_DATE_KHR => AcquireAction::Stale,
        other => AcquireAction::Fatal(other),
    }
}

/// Classify the raw result of `vkQueuePresentKHR`.
pub fn classify_present(result: vk::Result) -> PresentAction {
    match result {
        vk::Result::SUCCESS => PresentAction::Rendered,
        vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::SUBOPTIMAL_KHR => PresentAction::Stale,
        other => PresentAction::Fatal(other),
    }
}

/// The application-side work a frame needs, split at the protocol's two
/// call-out points.
pub trait FrameHooks {
    /// Scene recompute and uniform write. Runs after the in-flight fence has
    /// proven the GPU is no longer reading the uniform block.
    fn update(&mut self);

    /// Record the frame's commands into `cmd` targeting the framebuffer for
    /// `image_index`. The buffer is already in the recording state.
    fn record(&mut self, cmd: vk::CommandBuffer, image_index: u32) -> Result<()>;
}

/// Run one frame iteration.
///
/// Order: fence wait, acquire, fence reset, update, record, submit, present.
/// On a stale acquire the function returns before resetting the fence — the
/// fence stays signaled because no submission follows to re-signal it, and
/// the next iteration's wait must not block forever.
///
/// A failure while recording (or ending) the command buffer is logged at
/// error level and the frame still submits; the buffer contents up to the
/// failure are what the GPU executes.
///
/// # Safety
/// All handles must be valid; `cmd` must come from a pool with
/// `RESET_COMMAND_BUFFER` and not be pending execution.
#[allow(clippy::too_many_arguments)]
pub unsafe fn draw_frame<H: FrameHooks>(
    device: &ash::Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    unit: &SwapchainUnit,
    surface: &SurfaceContext,
    sync: &FrameSync,
    cmd: vk::CommandBuffer,
    hooks: &mut H,
) -> Result<FrameOutcome> {
    sync.wait(device)?;

    let acquire_result = unit.acquire_next_image(surface, sync.image_available);
    let (raw, acquired) = match acquire_result {
        Ok((index, false)) => (vk::Result::SUCCESS, Some(index)),
        Ok((index, true)) => (vk::Result::SUBOPTIMAL_KHR, Some(index)),
        Err(e) => (e, None),
    };
    let image_index = match classify_acquire(raw) {
        AcquireAction::Proceed => {
            acquired.ok_or_else(|| GpuError::InvalidState("Acquire returned no image".into()))?
        }
        AcquireAction::Stale => {
            tracing::debug!("Acquire reported out-of-date swapchain");
            return Ok(FrameOutcome::SurfaceStale);
        }
        AcquireAction::Fatal(e) => return Err(e.into()),
    };

    sync.reset(device)?;

    hooks.update();

    device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
    let begin_info = vk::CommandBufferBeginInfo::default();
    device.begin_command_buffer(cmd, &begin_info)?;
    if let Err(e) = hooks.record(cmd, image_index) {
        tracing::error!("Failed to record frame commands: {e}");
    }
    if let Err(e) = device.end_command_buffer(cmd) {
        tracing::error!("Failed to end command buffer recording: {e}");
    }

    let wait_semaphores = [sync.image_available];
    let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
    let command_buffers = [cmd];
    let signal_semaphores = [sync.render_finished];

    let submit_info = vk::SubmitInfo::default()
        .wait_semaphores(&wait_semaphores)
        .wait_dst_stage_mask(&wait_stages)
        .command_buffers(&command_buffers)
        .signal_semaphores(&signal_semaphores);

    device.queue_submit(graphics_queue, &[submit_info], sync.in_flight)?;

    let present_result = unit.present(surface, present_queue, image_index, &signal_semaphores);
    let raw = match present_result {
        Ok(false) => vk::Result::SUCCESS,
        Ok(true) => vk::Result::SUBOPTIMAL_KHR,
        Err(e) => e,
    };
    match classify_present(raw) {
        PresentAction::Rendered => Ok(FrameOutcome::Rendered),
        PresentAction::Stale => {
            tracing::debug!("Present reported stale swapchain ({raw:?})");
            Ok(FrameOutcome::SurfaceStale)
        }
        PresentAction::Fatal(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_classification() {
        assert_eq!(classify_acquire(vk::Result::SUCCESS), AcquireAction::Proceed);
        assert_eq!(
            classify_acquire(vk::Result::SUBOPTIMAL_KHR),
            AcquireAction::Proceed
        );
        assert_eq!(
            classify_acquire(vk::Result::ERROR_OUT_OF_DATE_KHR),
            AcquireAction::Stale
        );
        assert_eq!(
            classify_acquire(vk::Result::ERROR_DEVICE_LOST),
            AcquireAction::Fatal(vk::Result::ERROR_DEVICE_LOST)
        );
        assert_eq!(
            classify_acquire(vk::Result::ERROR_SURFACE_LOST_KHR),
            AcquireAction::Fatal(vk::Result::ERROR_SURFACE_LOST_KHR)
        );
    }

    #[test]
    fn present_classification() {
        assert_eq!(classify_present(vk::Result::SUCCESS), PresentAction::Rendered);
        assert_eq!(
            classify_present(vk::Result::SUBOPTIMAL_KHR),
            PresentAction::Stale
        );
        assert_eq!(
            classify_present(vk::Result::ERROR_OUT_OF_DATE_KHR),
            PresentAction::Stale
        );
        assert_eq!(
            classify_present(vk::Result::ERROR_DEVICE_LOST),
            PresentAction::Fatal(vk::Result::ERROR_DEVICE_LOST)
        );
    }
}
