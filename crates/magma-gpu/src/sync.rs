//! Per-frame synchronization primitives.
//!
//! One [`FrameSync`] set pairs the GPU-side ordering semaphores with the
//! CPU-side in-flight fence. The [`FrameSyncManager`] keeps a fixed ring of
//! sets; the default depth is one frame in flight.

use crate::error::Result;
use ash::vk;

/// Create a binary semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    let semaphore = device.create_semaphore(&create_info, None)?;
    Ok(semaphore)
}

/// Create a fence, optionally pre-signaled.
///
/// The in-flight fence starts signaled so the very first frame's wait
/// returns immediately.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    let fence = device.create_fence(&create_info, None)?;
    Ok(fence)
}

/// Wait for a fence to be signaled.
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn wait_for_fence(
    device: &ash::Device,
    fence: vk::Fence,
    timeout_ns: u64,
) -> Result<()> {
    device.wait_for_fences(&[fence], true, timeout_ns)?;
    Ok(())
}

/// Reset a fence to the unsignaled state.
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn reset_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    device.reset_fences(&[fence])?;
    Ok(())
}

/// One frame's synchronization set.
pub struct FrameSync {
    /// Signaled by acquire when the presentable image is ready to render to.
    pub image_available: vk::Semaphore,
    /// Signaled by the graphics submit; present waits on it.
    pub render_finished: vk::Semaphore,
    /// Signaled when the frame's submission has fully executed.
    pub in_flight: vk::Fence,
}

impl FrameSync {
    /// Create one synchronization set. The fence starts signaled.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device) -> Result<Self> {
        Ok(Self {
            image_available: create_semaphore(device)?,
            render_finished: create_semaphore(device)?,
            in_flight: create_fence(device, true)?,
        })
    }

    /// Block until this frame's previous submission has completed.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn wait(&self, device: &ash::Device) -> Result<()> {
        wait_for_fence(device, self.in_flight, u64::MAX)
    }

    /// Reset the in-flight fence for resubmission.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn reset(&self, device: &ash::Device) -> Result<()> {
        reset_fence(device, self.in_flight)
    }

    /// Destroy the set's semaphores and fence.
    ///
    /// # Safety
    /// The device must be valid and the resources must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_semaphore(self.image_available, None);
        device.destroy_semaphore(self.render_finished, None);
        device.destroy_fence(self.in_flight, None);
    }
}

/// Fixed-size ring of [`FrameSync`] sets, indexed modulo the ring depth.
pub struct FrameSyncManager {
    frame_syncs: Vec<FrameSync>,
    current_frame: usize,
}

impl FrameSyncManager {
    /// Create a sync ring for the given number of frames in flight.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device, frames_in_flight: usize) -> Result<Self> {
        let mut frame_syncs = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            frame_syncs.push(FrameSync::new(device)?);
        }

        Ok(Self {
            frame_syncs,
            current_frame: 0,
        })
    }

    /// The current slot's sync resources.
    pub fn current(&self) -> &FrameSync {
        &self.frame_syncs[self.current_frame]
    }

    /// Advance the ring, wrapping at its depth.
    pub fn advance(&mut self) {
        self.current_frame = (self.current_frame + 1) % self.frame_syncs.len();
    }

    /// The current slot index.
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// The ring depth.
    pub fn frames_in_flight(&self) -> usize {
        self.frame_syncs.len()
    }

    /// Destroy every set in the ring.
    ///
    /// # Safety
    /// The device must be valid and no set may be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        for sync in &self.frame_syncs {
            sync.destroy(device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn null_sync() -> FrameSync {
        FrameSync {
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            in_flight: vk::Fence::null(),
        }
    }

    fn manager(depth: usize) -> FrameSyncManager {
        FrameSyncManager {
            frame_syncs: (0..depth).map(|_| null_sync()).collect(),
            current_frame: 0,
        }
    }

    #[test]
    fn depth_one_never_moves() {
        let mut m = manager(1);
        assert_eq!(m.current_frame(), 0);
        m.advance();
        assert_eq!(m.current_frame(), 0);
        m.advance();
        assert_eq!(m.current_frame(), 0);
    }

    #[test]
    fn depth_two_alternates() {
        let mut m = manager(2);
        m.advance();
        assert_eq!(m.current_frame(), 1);
        m.advance();
        assert_eq!(m.current_frame(), 0);
    }

    #[test]
    fn depth_three_wraps() {
        let mut m = manager(3);
        for expected in [1, 2, 0, 1, 2, 0] {
            m.advance();
            assert_eq!(m.current_frame(), expected);
        }
        assert_eq!(m.frames_in_flight(), 3);
    }
}
