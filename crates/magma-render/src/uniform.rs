//! The per-frame transform uniform block and its descriptor wiring.

use crate::camera::TransformUniforms;
use crate::error::Result;
use ash::vk;
use magma_gpu::{
    write_uniform_buffer, DescriptorPool, DescriptorSetLayoutBuilder, GpuAllocator, GpuBuffer,
    GpuContext,
};

/// One persistently mapped uniform buffer plus the descriptor set exposing
/// it to the vertex stage at binding 0. Lives for the whole session; only
/// its contents change, once per frame.
pub struct UniformBinding {
    buffer: GpuBuffer,
    layout: vk::DescriptorSetLayout,
    pool: DescriptorPool,
    set: vk::DescriptorSet,
}

impl UniformBinding {
    /// Allocate the buffer, build the layout/pool/set, and wire them up.
    ///
    /// # Safety
    /// The context must be valid.
    pub unsafe fn new(gpu: &GpuContext) -> Result<Self> {
        let size = std::mem::size_of::<TransformUniforms>() as u64;

        let allocator = gpu.allocator().lock();
        let mut buffer = allocator.create_buffer(
            size,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        allocator.map_buffer(&mut buffer)?;
        drop(allocator);

        let device = gpu.device();
        let layout = DescriptorSetLayoutBuilder::new()
            .uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .build(device)?;

        let pool_sizes = [vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)];
        let pool = DescriptorPool::new(device, 1, &pool_sizes)?;
        let set = pool.allocate(device, &[layout])?[0];

        write_uniform_buffer(device, set, 0, buffer.buffer, 0, size);

        Ok(Self {
            buffer,
            layout,
            pool,
            set,
        })
    }

    /// The descriptor set layout, for pipeline layout creation.
    pub fn layout(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// The descriptor set to bind while drawing.
    pub fn set(&self) -> vk::DescriptorSet {
        self.set
    }

    /// Copy the transform block into the mapped buffer.
    pub fn write(&self, uniforms: &TransformUniforms) -> Result<()> {
        self.buffer.write(std::slice::from_ref(uniforms))?;
        Ok(())
    }

    /// Destroy the descriptor pool, layout, and buffer.
    ///
    /// # Safety
    /// The device must be idle with respect to the descriptor set.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext, allocator: &GpuAllocator) {
        self.pool.destroy(gpu.device());
        gpu.device().destroy_descriptor_set_layout(self.layout, None);
        allocator.destroy_buffer(&mut self.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_block_layout() {
        assert_eq!(std::mem::offset_of!(TransformUniforms, model), 0);
        assert_eq!(std::mem::offset_of!(TransformUniforms, view), 64);
        assert_eq!(std::mem::offset_of!(TransformUniforms, projection), 128);
        assert_eq!(std::mem::size_of::<TransformUniforms>(), 192);
    }
}
