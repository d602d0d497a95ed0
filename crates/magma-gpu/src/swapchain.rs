//! Swapchain lifecycle management.
//!
//! The swapchain, its images and views, the depth and MSAA attachments, the
//! render pass, and the framebuffers form one resource group with a single
//! create/destroy/recreate surface. Either the whole group exists or none of
//! it does; `create` tears down everything already built on any failure.

use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::memory::GpuImage;
use crate::surface::SurfaceContext;
use ash::vk;

/// Depth formats tried in order.
const DEPTH_FORMAT_CANDIDATES: [vk::Format; 1] = [vk::Format::D24_UNORM_S8_UINT];

/// Select the surface format.
///
/// Only `B8G8R8A8_SRGB` with the sRGB nonlinear color space is accepted; the
/// shaders and clear colors assume it, so there is no best-effort substitute.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> Result<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .copied()
        .ok_or(GpuError::NoSurfaceFormat)
}

/// Select the present mode: `MAILBOX` when available, else `FIFO`.
pub fn select_present_mode(available: &[vk::PresentModeKHR]) -> Result<vk::PresentModeKHR> {
    if available.is_empty() {
        return Err(GpuError::NoPresentMode);
    }
    if available.contains(&vk::PresentModeKHR::MAILBOX) {
        Ok(vk::PresentModeKHR::MAILBOX)
    } else {
        Ok(vk::PresentModeKHR::FIFO)
    }
}

/// Select the swapchain image count: one above the minimum, clamped to the
/// maximum when the surface reports one (0 means unbounded).
pub fn select_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && count > capabilities.max_image_count {
        count = capabilities.max_image_count;
    }
    count
}

/// Select the swapchain extent.
///
/// `current_extent.width == u32::MAX` is the surface's "you choose" sentinel;
/// otherwise the reported extent is authoritative.
pub fn select_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    fb_width: u32,
    fb_height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: fb_width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: fb_height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// Whether a format can back a depth-stencil attachment with optimal tiling.
pub fn supports_depth_format(properties: vk::FormatProperties) -> bool {
    properties
        .optimal_tiling_features
        .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
}

/// Find a supported depth buffer format from the candidate list.
///
/// # Safety
/// The instance and physical device must be valid.
pub unsafe fn find_depth_format(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<vk::Format> {
    DEPTH_FORMAT_CANDIDATES
        .into_iter()
        .find(|&format| {
            let properties = instance.get_physical_device_format_properties(physical_device, format);
            supports_depth_format(properties)
        })
        .ok_or(GpuError::NoDepthFormat)
}

/// The swapchain resource group.
///
/// Everything the render loop needs per surface: the swapchain and its
/// presentable images, the multisampled color and depth attachments, the
/// render pass describing them, and one framebuffer per presentable image.
pub struct SwapchainUnit {
    pub swapchain: vk::SwapchainKHR,
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub depth_format: vk::Format,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub depth_image: Option<GpuImage>,
    pub depth_view: vk::ImageView,
    pub msaa_image: Option<GpuImage>,
    pub msaa_view: vk::ImageView,
    pub render_pass: vk::RenderPass,
    pub framebuffers: Vec<vk::Framebuffer>,
}

impl SwapchainUnit {
    /// Build the full resource group for the surface.
    ///
    /// All-or-nothing: any failure destroys whatever was already built, in
    /// reverse order, before the error is returned.
    ///
    /// # Safety
    /// The context and surface must be valid; the surface must not have a
    /// live swapchain.
    pub unsafe fn create(
        gpu: &GpuContext,
        surface: &SurfaceContext,
        fb_width: u32,
        fb_height: u32,
    ) -> Result<Self> {
        // Image sharing between distinct queue families is not supported.
        if gpu.graphics_queue_family() != gpu.present_queue_family() {
            return Err(GpuError::QueueFamilyMismatch {
                graphics: gpu.graphics_queue_family(),
                present: gpu.present_queue_family(),
            });
        }

        let caps = surface.capabilities(gpu)?;
        let surface_format = select_surface_format(&caps.formats)?;
        let present_mode = select_present_mode(&caps.present_modes)?;
        let image_count = select_image_count(&caps.capabilities);
        let extent = select_extent(&caps.capabilities, fb_width, fb_height);
        let depth_format = find_depth_format(gpu.instance(), gpu.physical_device())?;

        let mut unit = Self {
            swapchain: vk::SwapchainKHR::null(),
            surface_format,
            present_mode,
            depth_format,
            extent,
            images: Vec::new(),
            image_views: Vec::new(),
            depth_image: None,
            depth_view: vk::ImageView::null(),
            msaa_image: None,
            msaa_view: vk::ImageView::null(),
            render_pass: vk::RenderPass::null(),
            framebuffers: Vec::new(),
        };

        match unit.build(gpu, surface, image_count, caps.capabilities.current_transform) {
            Ok(()) => {
                tracing::info!(
                    "Swapchain created: {}x{}, {} images, {:?}",
                    extent.width,
                    extent.height,
                    unit.images.len(),
                    present_mode
                );
                Ok(unit)
            }
            Err(e) => {
                unit.destroy(gpu, surface);
                Err(e)
            }
        }
    }

    unsafe fn build(
        &mut self,
        gpu: &GpuContext,
        surface: &SurfaceContext,
        image_count: u32,
        pre_transform: vk::SurfaceTransformFlagsKHR,
    ) -> Result<()> {
        let device = gpu.device();

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.surface)
            .min_image_count(image_count)
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(self.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(false)
            .old_swapchain(vk::SwapchainKHR::null());

        self.swapchain = surface
            .swapchain_loader
            .create_swapchain(&create_info, None)
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;

        self.images = surface.swapchain_loader.get_swapchain_images(self.swapchain)?;

        for &image in &self.images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.surface_format.format)
                .components(vk::ComponentMapping::default())
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .base_mip_level(0)
                        .level_count(1)
                        .base_array_layer(0)
                        .layer_count(1),
                );
            self.image_views.push(device.create_image_view(&view_info, None)?);
        }

        let allocator = gpu.allocator().lock();

        // Multisampled depth attachment.
        let depth_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(self.depth_format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .samples(gpu.sample_count());
        let depth_image =
            allocator.create_image(&depth_info, vk::MemoryPropertyFlags::DEVICE_LOCAL)?;
        let depth_view_info = vk::ImageViewCreateInfo::default()
            .image(depth_image.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(self.depth_format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::DEPTH)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );
        self.depth_image = Some(depth_image);
        self.depth_view = device.create_image_view(&depth_view_info, None)?;

        // Multisampled color attachment, resolved into the presentable image
        // each frame; never sampled or stored across frames.
        let msaa_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(self.surface_format.format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .usage(
                vk::ImageUsageFlags::TRANSIENT_ATTACHMENT | vk::ImageUsageFlags::COLOR_ATTACHMENT,
            )
            .samples(gpu.sample_count());
        let msaa_image =
            allocator.create_image(&msaa_info, vk::MemoryPropertyFlags::DEVICE_LOCAL)?;
        let msaa_view_info = vk::ImageViewCreateInfo::default()
            .image(msaa_image.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(self.surface_format.format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );
        self.msaa_image = Some(msaa_image);
        self.msaa_view = device.create_image_view(&msaa_view_info, None)?;

        drop(allocator);

        self.render_pass = create_render_pass(
            device,
            self.surface_format.format,
            self.depth_format,
            gpu.sample_count(),
        )?;

        for &view in &self.image_views {
            let attachments = [self.msaa_view, self.depth_view, view];
            let framebuffer_info = vk::FramebufferCreateInfo::default()
                .render_pass(self.render_pass)
                .attachments(&attachments)
                .width(self.extent.width)
                .height(self.extent.height)
                .layers(1);
            self.framebuffers
                .push(device.create_framebuffer(&framebuffer_info, None)?);
        }

        Ok(())
    }

    /// Acquire the next presentable image, signaling `semaphore` when it is
    /// ready. Returns the raw Vulkan result for the frame engine to classify.
    ///
    /// # Safety
    /// The surface and semaphore must be valid.
    pub unsafe fn acquire_next_image(
        &self,
        surface: &SurfaceContext,
        semaphore: vk::Semaphore,
    ) -> std::result::Result<(u32, bool), vk::Result> {
        surface.swapchain_loader.acquire_next_image(
            self.swapchain,
            u64::MAX,
            semaphore,
            vk::Fence::null(),
        )
    }

    /// Queue a present of `image_index`, waiting on `wait_semaphores`.
    /// Returns the raw Vulkan result for the frame engine to classify.
    ///
    /// # Safety
    /// The queue, image index, and semaphores must be valid.
    pub unsafe fn present(
        &self,
        surface: &SurfaceContext,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> std::result::Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        surface.swapchain_loader.queue_present(queue, &present_info)
    }

    /// Destroy the whole resource group in reverse dependency order.
    ///
    /// Null-safe: partially built units (the `create` failure path) destroy
    /// only what exists.
    ///
    /// # Safety
    /// The device must be idle with respect to this swapchain.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext, surface: &SurfaceContext) {
        let device = gpu.device();

        for framebuffer in self.framebuffers.drain(..) {
            device.destroy_framebuffer(framebuffer, None);
        }
        if self.render_pass != vk::RenderPass::null() {
            device.destroy_render_pass(self.render_pass, None);
            self.render_pass = vk::RenderPass::null();
        }

        let allocator = gpu.allocator().lock();
        if self.msaa_view != vk::ImageView::null() {
            device.destroy_image_view(self.msaa_view, None);
            self.msaa_view = vk::ImageView::null();
        }
        if let Some(mut image) = self.msaa_image.take() {
            allocator.destroy_image(&mut image);
        }
        if self.depth_view != vk::ImageView::null() {
            device.destroy_image_view(self.depth_view, None);
            self.depth_view = vk::ImageView::null();
        }
        if let Some(mut image) = self.depth_image.take() {
            allocator.destroy_image(&mut image);
        }
        drop(allocator);

        for view in self.image_views.drain(..) {
            device.destroy_image_view(view, None);
        }
        self.images.clear();

        if self.swapchain != vk::SwapchainKHR::null() {
            surface
                .swapchain_loader
                .destroy_swapchain(self.swapchain, None);
            self.swapchain = vk::SwapchainKHR::null();
        }
    }

    /// Tear down and rebuild the whole group at the new framebuffer size.
    ///
    /// Waits for the device to go idle first; there is no partial rebuild.
    ///
    /// # Safety
    /// The context and surface must be valid.
    pub unsafe fn recreate(
        &mut self,
        gpu: &GpuContext,
        surface: &SurfaceContext,
        fb_width: u32,
        fb_height: u32,
    ) -> Result<()> {
        gpu.wait_idle()?;
        self.destroy(gpu, surface);
        *self = Self::create(gpu, surface, fb_width, fb_height)?;
        Ok(())
    }
}

/// Build the single-subpass render pass over the three attachments:
/// multisampled color (0), multisampled depth (1), and the single-sample
/// resolve target (2) that ends the pass ready for presentation.
unsafe fn create_render_pass(
    device: &ash::Device,
    color_format: vk::Format,
    depth_format: vk::Format,
    samples: vk::SampleCountFlags,
) -> Result<vk::RenderPass> {
    let attachments = [
        vk::AttachmentDescription::default()
            .format(color_format)
            .samples(samples)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
        vk::AttachmentDescription::default()
            .format(depth_format)
            .samples(samples)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::DONT_CARE)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
    ];

    let color_ref = [vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];
    let depth_ref = vk::AttachmentReference::default()
        .attachment(1)
        .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
    let resolve_ref = [vk::AttachmentReference::default()
        .attachment(2)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

    let subpass = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_ref)
        .resolve_attachments(&resolve_ref)
        .depth_stencil_attachment(&depth_ref)];

    let dependency = [vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        )
        .src_access_mask(
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
                | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        )
        .dst_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )];

    let render_pass_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpass)
        .dependencies(&dependency);

    Ok(device.create_render_pass(&render_pass_info, None)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn surface_format_requires_exact_match() {
        let formats = [
            format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = select_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn surface_format_rejects_wrong_color_space() {
        let formats = [format(
            vk::Format::B8G8R8A8_SRGB,
            vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        )];
        assert!(matches!(
            select_surface_format(&formats),
            Err(GpuError::NoSurfaceFormat)
        ));
        assert!(matches!(
            select_surface_format(&[]),
            Err(GpuError::NoSurfaceFormat)
        ));
    }

    #[test]
    fn present_mode_prefers_mailbox() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            select_present_mode(&modes).unwrap(),
            vk::PresentModeKHR::MAILBOX
        );
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        assert_eq!(
            select_present_mode(&modes).unwrap(),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn present_mode_empty_is_an_error() {
        assert!(matches!(
            select_present_mode(&[]),
            Err(GpuError::NoPresentMode)
        ));
    }

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            ..Default::default()
        }
    }

    #[test]
    fn image_count_is_min_plus_one() {
        assert_eq!(select_image_count(&caps(2, 8)), 3);
    }

    #[test]
    fn image_count_clamps_to_max() {
        assert_eq!(select_image_count(&caps(3, 3)), 3);
    }

    #[test]
    fn image_count_zero_max_means_unbounded() {
        assert_eq!(select_image_count(&caps(4, 0)), 5);
    }

    #[test]
    fn extent_uses_reported_size_when_fixed() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 640,
                height: 480,
            },
            ..Default::default()
        };
        let extent = select_extent(&caps, 1920, 1080);
        assert_eq!(extent.width, 640);
        assert_eq!(extent.height, 480);
    }

    #[test]
    fn extent_clamps_framebuffer_size_when_flexible() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 1000,
                height: 1000,
            },
            ..Default::default()
        };
        let extent = select_extent(&caps, 5000, 50);
        assert_eq!(extent.width, 1000);
        assert_eq!(extent.height, 100);
    }

    #[test]
    fn depth_feature_predicate() {
        let supported = vk::FormatProperties {
            optimal_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
                | vk::FormatFeatureFlags::SAMPLED_IMAGE,
            ..Default::default()
        };
        assert!(supports_depth_format(supported));

        let linear_only = vk::FormatProperties {
            linear_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            ..Default::default()
        };
        assert!(!supports_depth_format(linear_only));
    }
}
