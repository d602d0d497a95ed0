//! GPU memory management.
//!
//! Allocation is deliberately explicit: every buffer and image gets its own
//! `vkAllocateMemory` call, with the memory type chosen by a first-fit scan
//! over the device's memory types. There is no sub-allocation.

use crate::error::{GpuError, Result};
use ash::vk;
use std::sync::Arc;

/// Pick a memory type index for an allocation.
///
/// Returns the lowest index whose bit is set in `type_bits` and whose
/// property flags are a superset of `required`.
pub fn find_memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Result<u32> {
    for i in 0..memory_properties.memory_type_count {
        let supported = type_bits & (1 << i) != 0;
        let adequate = memory_properties.memory_types[i as usize]
            .property_flags
            .contains(required);
        if supported && adequate {
            return Ok(i);
        }
    }

    Err(GpuError::NoCompatibleMemoryType {
        type_bits,
        flags: required,
    })
}

/// GPU memory allocator.
///
/// Queries the physical device memory properties once and binds each
/// resource to a dedicated device memory allocation.
pub struct GpuAllocator {
    device: Arc<ash::Device>,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl GpuAllocator {
    /// Create a new allocator.
    ///
    /// # Safety
    /// The instance, device, and physical device must be valid.
    pub unsafe fn new(
        instance: &ash::Instance,
        device: Arc<ash::Device>,
        physical_device: vk::PhysicalDevice,
    ) -> Self {
        let memory_properties = instance.get_physical_device_memory_properties(physical_device);
        Self {
            device,
            memory_properties,
        }
    }

    /// Create a buffer and bind fresh device memory to it.
    pub fn create_buffer(
        &self,
        size: u64,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<GpuBuffer> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.device.create_buffer(&buffer_info, None)? };

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let memory = match self.allocate(&requirements, properties) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe { self.device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                self.device.destroy_buffer(buffer, None);
                self.device.free_memory(memory, None);
            }
            return Err(e.into());
        }

        Ok(GpuBuffer {
            buffer,
            memory,
            size,
            mapped: None,
        })
    }

    /// Create an image and bind fresh device memory to it.
    pub fn create_image(
        &self,
        create_info: &vk::ImageCreateInfo,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<GpuImage> {
        let image = unsafe { self.device.create_image(create_info, None)? };

        let requirements = unsafe { self.device.get_image_memory_requirements(image) };
        let memory = match self.allocate(&requirements, properties) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe { self.device.bind_image_memory(image, memory, 0) } {
            unsafe {
                self.device.destroy_image(image, None);
                self.device.free_memory(memory, None);
            }
            return Err(e.into());
        }

        Ok(GpuImage {
            image,
            memory,
            format: create_info.format,
            extent: create_info.extent,
        })
    }

    fn allocate(
        &self,
        requirements: &vk::MemoryRequirements,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<vk::DeviceMemory> {
        let memory_type_index = find_memory_type_index(
            &self.memory_properties,
            requirements.memory_type_bits,
            properties,
        )?;

        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        Ok(unsafe { self.device.allocate_memory(&alloc_info, None)? })
    }

    /// Map the whole buffer for persistent host access.
    ///
    /// The memory must be host-visible. The mapping stays valid until the
    /// buffer is destroyed.
    pub fn map_buffer(&self, buffer: &mut GpuBuffer) -> Result<()> {
        if buffer.mapped.is_some() {
            return Ok(());
        }
        let ptr = unsafe {
            self.device
                .map_memory(buffer.memory, 0, buffer.size, vk::MemoryMapFlags::empty())?
        };
        buffer.mapped = Some(ptr as *mut u8);
        Ok(())
    }

    /// Destroy a buffer and free its memory. Safe to call on an already
    /// destroyed buffer.
    pub fn destroy_buffer(&self, buffer: &mut GpuBuffer) {
        unsafe {
            if buffer.mapped.take().is_some() {
                self.device.unmap_memory(buffer.memory);
            }
            if buffer.buffer != vk::Buffer::null() {
                self.device.destroy_buffer(buffer.buffer, None);
                buffer.buffer = vk::Buffer::null();
            }
            if buffer.memory != vk::DeviceMemory::null() {
                self.device.free_memory(buffer.memory, None);
                buffer.memory = vk::DeviceMemory::null();
            }
        }
    }

    /// Destroy an image and free its memory. Safe to call on an already
    /// destroyed image.
    pub fn destroy_image(&self, image: &mut GpuImage) {
        unsafe {
            if image.image != vk::Image::null() {
                self.device.destroy_image(image.image, None);
                image.image = vk::Image::null();
            }
            if image.memory != vk::DeviceMemory::null() {
                self.device.free_memory(image.memory, None);
                image.memory = vk::DeviceMemory::null();
            }
        }
    }
}

/// A buffer with its dedicated device memory.
pub struct GpuBuffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: u64,
    mapped: Option<*mut u8>,
}

impl GpuBuffer {
    /// The persistent mapping, if [`GpuAllocator::map_buffer`] has run.
    pub fn mapped_ptr(&self) -> Option<*mut u8> {
        self.mapped
    }

    /// Write data at the start of the mapped buffer.
    pub fn write<T: Copy>(&self, data: &[T]) -> Result<()> {
        let bytes = unsafe {
            std::slice::from_raw_parts(data.as_ptr() as *const u8, std::mem::size_of_val(data))
        };
        self.write_bytes(0, bytes)
    }

    /// Write raw bytes at the given offset of the mapped buffer.
    pub fn write_bytes(&self, offset: u64, data: &[u8]) -> Result<()> {
        let ptr = self
            .mapped
            .ok_or_else(|| GpuError::InvalidState("Buffer not mapped".to_string()))?;

        let end = offset
            .checked_add(data.len() as u64)
            .ok_or_else(|| GpuError::InvalidState("Offset overflow".to_string()))?;
        if end > self.size {
            return Err(GpuError::InvalidState(
                "Data range too large for buffer".to_string(),
            ));
        }

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.add(offset as usize), data.len());
        }

        Ok(())
    }
}

/// An image with its dedicated device memory.
pub struct GpuImage {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub format: vk::Format,
    pub extent: vk::Extent3D,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut p = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (i, &flags) in types.iter().enumerate() {
            p.memory_types[i] = vk::MemoryType {
                property_flags: flags,
                heap_index: 0,
            };
        }
        p
    }

    #[test]
    fn first_fit_picks_lowest_matching_index() {
        let p = props(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        let index = find_memory_type_index(
            &p,
            0b111,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn type_bits_exclude_otherwise_matching_types() {
        let p = props(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);

        // Bit 0 is cleared, so only index 1 qualifies.
        let index =
            find_memory_type_index(&p, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn superset_flags_are_accepted() {
        let p = props(&[vk::MemoryPropertyFlags::DEVICE_LOCAL
            | vk::MemoryPropertyFlags::HOST_VISIBLE
            | vk::MemoryPropertyFlags::HOST_COHERENT]);

        let index =
            find_memory_type_index(&p, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn no_match_is_an_error() {
        let p = props(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);

        let err =
            find_memory_type_index(&p, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap_err();
        assert!(matches!(
            err,
            GpuError::NoCompatibleMemoryType { type_bits: 0b1, .. }
        ));
    }

    #[test]
    fn unmapped_buffer_rejects_writes() {
        let buffer = GpuBuffer {
            buffer: vk::Buffer::null(),
            memory: vk::DeviceMemory::null(),
            size: 64,
            mapped: None,
        };
        assert!(buffer.write_bytes(0, &[0u8; 4]).is_err());
    }

    #[test]
    fn mapped_writes_are_bounds_checked() {
        let mut backing = [0u8; 16];
        let buffer = GpuBuffer {
            buffer: vk::Buffer::null(),
            memory: vk::DeviceMemory::null(),
            size: backing.len() as u64,
            mapped: Some(backing.as_mut_ptr()),
        };

        buffer.write_bytes(8, &[1, 2, 3, 4]).unwrap();
        assert!(buffer.write_bytes(14, &[0u8; 4]).is_err());
        assert!(buffer.write_bytes(u64::MAX, &[0u8; 1]).is_err());
        assert_eq!(&backing[8..12], &[1, 2, 3, 4]);
    }
}
