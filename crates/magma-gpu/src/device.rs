//! Physical device selection and logical device creation.

use crate::error::{GpuError, Result};
use ash::vk;
use std::collections::BTreeSet;
use std::ffi::CStr;

/// Multisample level required of every candidate device.
pub const TARGET_SAMPLE_COUNT: vk::SampleCountFlags = vk::SampleCountFlags::TYPE_8;

/// Result of physical device selection.
///
/// Selection runs once at start-up; the chosen device and queue family
/// indices never change for the lifetime of the process.
#[derive(Clone, Copy)]
pub struct DeviceSelection {
    pub physical_device: vk::PhysicalDevice,
    pub graphics_family: u32,
    pub present_family: u32,
    pub sample_count: vk::SampleCountFlags,
}

/// Per-queue-family capability summary used by the family scan.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueueFamilySupport {
    pub graphics: bool,
    pub present: bool,
}

/// Whether the device type counts as a GPU for selection purposes.
pub fn is_gpu_device_type(ty: vk::PhysicalDeviceType) -> bool {
    ty == vk::PhysicalDeviceType::DISCRETE_GPU || ty == vk::PhysicalDeviceType::INTEGRATED_GPU
}

/// Whether framebuffers on this device support `count` samples for both
/// color and depth attachments.
pub fn supports_sample_count(limits: &vk::PhysicalDeviceLimits, count: vk::SampleCountFlags) -> bool {
    (limits.framebuffer_color_sample_counts & limits.framebuffer_depth_sample_counts).contains(count)
}

/// Scan queue families in ascending order, recording the graphics-capable and
/// present-capable family and stopping once both are found.
///
/// The two indices may differ; a mismatch is rejected later, at swapchain
/// build time, where image sharing would be required.
pub fn find_queue_family_indices(families: &[QueueFamilySupport]) -> Option<(u32, u32)> {
    let mut graphics = None;
    let mut present = None;

    for (i, family) in families.iter().enumerate() {
        if family.graphics {
            graphics = Some(i as u32);
        }
        if family.present {
            present = Some(i as u32);
        }
        if graphics.is_some() && present.is_some() {
            break;
        }
    }

    Some((graphics?, present?))
}

/// Select the first physical device passing every capability check.
///
/// A candidate must be a discrete or integrated GPU with geometry shader
/// support, expose graphics and present queue families for the given surface,
/// support `VK_KHR_swapchain`, and support 8x MSAA on color and depth
/// framebuffers. No re-selection happens during the session.
///
/// # Safety
/// The instance, surface loader, and surface must be valid.
pub unsafe fn select_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<DeviceSelection> {
    let devices = instance.enumerate_physical_devices()?;

    for device in devices {
        let properties = instance.get_physical_device_properties(device);
        let features = instance.get_physical_device_features(device);

        if !is_gpu_device_type(properties.device_type) || features.geometry_shader != vk::TRUE {
            continue;
        }

        let family_support = query_queue_family_support(instance, surface_loader, surface, device)?;
        let Some((graphics_family, present_family)) = find_queue_family_indices(&family_support)
        else {
            continue;
        };

        if !device_supports_swapchain(instance, device)? {
            continue;
        }

        if !supports_sample_count(&properties.limits, TARGET_SAMPLE_COUNT) {
            continue;
        }

        let name = CStr::from_ptr(properties.device_name.as_ptr());
        tracing::info!(
            "Selected GPU: {:?} (graphics family {}, present family {})",
            name,
            graphics_family,
            present_family
        );

        return Ok(DeviceSelection {
            physical_device: device,
            graphics_family,
            present_family,
            sample_count: TARGET_SAMPLE_COUNT,
        });
    }

    Err(GpuError::NoSuitableDevice)
}

unsafe fn query_queue_family_support(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    device: vk::PhysicalDevice,
) -> Result<Vec<QueueFamilySupport>> {
    let families = instance.get_physical_device_queue_family_properties(device);

    let mut support = Vec::with_capacity(families.len());
    for (i, family) in families.iter().enumerate() {
        let present =
            surface_loader.get_physical_device_surface_support(device, i as u32, surface)?;
        support.push(QueueFamilySupport {
            graphics: family.queue_flags.contains(vk::QueueFlags::GRAPHICS),
            present,
        });
    }

    Ok(support)
}

unsafe fn device_supports_swapchain(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
) -> Result<bool> {
    let extensions = instance.enumerate_device_extension_properties(device)?;
    Ok(extensions
        .iter()
        .any(|ext| CStr::from_ptr(ext.extension_name.as_ptr()) == ash::khr::swapchain::NAME))
}

/// Create the logical device and retrieve the graphics and present queues.
///
/// One queue is created per distinct family. The features enabled are
/// `geometry_shader` (checked during selection) and `sample_rate_shading`
/// (per-sample shading for the MSAA pipeline).
///
/// # Safety
/// The instance must be valid and the selection must come from
/// [`select_physical_device`] against the same instance.
pub unsafe fn create_device(
    instance: &ash::Instance,
    selection: &DeviceSelection,
) -> Result<(ash::Device, vk::Queue, vk::Queue)> {
    let unique_families: BTreeSet<u32> = [selection.graphics_family, selection.present_family]
        .into_iter()
        .collect();

    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
        .iter()
        .map(|&family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    let extension_names = [ash::khr::swapchain::NAME.as_ptr()];

    let features = vk::PhysicalDeviceFeatures::default()
        .geometry_shader(true)
        .sample_rate_shading(true);

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    let device = instance.create_device(selection.physical_device, &device_create_info, None)?;

    let graphics_queue = device.get_device_queue(selection.graphics_family, 0);
    let present_queue = device.get_device_queue(selection.present_family, 0);

    tracing::info!("Logical device created");
    Ok((device, graphics_queue, present_queue))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_device_types() {
        assert!(is_gpu_device_type(vk::PhysicalDeviceType::DISCRETE_GPU));
        assert!(is_gpu_device_type(vk::PhysicalDeviceType::INTEGRATED_GPU));
        assert!(!is_gpu_device_type(vk::PhysicalDeviceType::VIRTUAL_GPU));
        assert!(!is_gpu_device_type(vk::PhysicalDeviceType::CPU));
        assert!(!is_gpu_device_type(vk::PhysicalDeviceType::OTHER));
    }

    #[test]
    fn sample_count_needs_color_and_depth() {
        let both = vk::PhysicalDeviceLimits {
            framebuffer_color_sample_counts: vk::SampleCountFlags::TYPE_8
                | vk::SampleCountFlags::TYPE_1,
            framebuffer_depth_sample_counts: vk::SampleCountFlags::TYPE_8
                | vk::SampleCountFlags::TYPE_1,
            ..Default::default()
        };
        assert!(supports_sample_count(&both, vk::SampleCountFlags::TYPE_8));

        let color_only = vk::PhysicalDeviceLimits {
            framebuffer_color_sample_counts: vk::SampleCountFlags::TYPE_8,
            framebuffer_depth_sample_counts: vk::SampleCountFlags::TYPE_4,
            ..Default::default()
        };
        assert!(!supports_sample_count(&color_only, vk::SampleCountFlags::TYPE_8));
    }

    fn fam(graphics: bool, present: bool) -> QueueFamilySupport {
        QueueFamilySupport { graphics, present }
    }

    #[test]
    fn queue_scan_shared_family() {
        let families = [fam(false, false), fam(true, true)];
        assert_eq!(find_queue_family_indices(&families), Some((1, 1)));
    }

    #[test]
    fn queue_scan_split_families() {
        let families = [fam(true, false), fam(false, true)];
        assert_eq!(find_queue_family_indices(&families), Some((0, 1)));
    }

    #[test]
    fn queue_scan_stops_at_first_complete_pair() {
        // A later family also supporting both must not displace the result.
        let families = [fam(true, true), fam(true, true)];
        assert_eq!(find_queue_family_indices(&families), Some((0, 0)));
    }

    #[test]
    fn queue_scan_missing_capability() {
        assert_eq!(find_queue_family_indices(&[fam(true, false)]), None);
        assert_eq!(find_queue_family_indices(&[fam(false, true)]), None);
        assert_eq!(find_queue_family_indices(&[]), None);
    }
}
