//! Vertex layout and `.tris` model loading.

use crate::error::{RenderError, Result};
use ash::vk;
use glam::Vec3;
use magma_gpu::{execute_single_time_commands, CommandPool, GpuBuffer, GpuContext};
use std::path::Path;

/// One vertex as the pipeline consumes it: position plus RGBA color.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl Vertex {
    /// The single vertex buffer binding.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(std::mem::size_of::<Self>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
    }

    /// Position at location 0, color at location 1.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(std::mem::offset_of!(Vertex, position) as u32),
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(1)
                .format(vk::Format::R32G32B32A32_SFLOAT)
                .offset(std::mem::offset_of!(Vertex, color) as u32),
        ]
    }
}

/// Parse the `.tris` text format: a leading triangle count, then three
/// whitespace-separated `x y z` position triples per triangle.
pub fn parse_tris(text: &str) -> Result<Vec<Vec3>> {
    let mut tokens = text.split_whitespace();

    let count: usize = tokens
        .next()
        .ok_or_else(|| RenderError::Parse("Missing triangle count".to_string()))?
        .parse()
        .map_err(|e| RenderError::Parse(format!("Bad triangle count: {e}")))?;

    let mut positions = Vec::with_capacity(count * 3);
    for i in 0..count * 3 {
        let mut component = |axis: &str| -> Result<f32> {
            tokens
                .next()
                .ok_or_else(|| {
                    RenderError::Parse(format!("Expected {count} triangles, data ends at vertex {i}"))
                })?
                .parse()
                .map_err(|e| RenderError::Parse(format!("Bad {axis} at vertex {i}: {e}")))
        };
        let x = component("x")?;
        let y = component("y")?;
        let z = component("z")?;
        positions.push(Vec3::new(x, y, z));
    }

    Ok(positions)
}

/// Read and parse a `.tris` model file.
pub fn load_tris(path: impl AsRef<Path>) -> Result<Vec<Vec3>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let positions = parse_tris(&text)?;
    tracing::info!(
        "Loaded {} ({} triangles)",
        path.as_ref().display(),
        positions.len() / 3
    );
    Ok(positions)
}

/// Upload vertices into a device-local vertex buffer via a staging copy.
///
/// The staging buffer is host-visible and thrown away once the one-shot
/// transfer on the graphics queue has drained. The resulting buffer is never
/// written again.
///
/// # Safety
/// The context and pool must be valid; the pool's queue family must be the
/// graphics family.
pub unsafe fn upload_vertices(
    gpu: &GpuContext,
    pool: &CommandPool,
    vertices: &[Vertex],
) -> Result<GpuBuffer> {
    let size = std::mem::size_of_val(vertices) as u64;
    let allocator = gpu.allocator().lock();

    let mut staging = allocator.create_buffer(
        size,
        vk::BufferUsageFlags::TRANSFER_SRC,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;
    allocator.map_buffer(&mut staging)?;
    staging.write(vertices)?;

    let vertex_buffer = match allocator.create_buffer(
        size,
        vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    ) {
        Ok(buffer) => buffer,
        Err(e) => {
            allocator.destroy_buffer(&mut staging);
            return Err(e.into());
        }
    };

    let copy_result = execute_single_time_commands(
        gpu.device(),
        pool,
        gpu.graphics_queue(),
        |cmd| {
            let region = vk::BufferCopy::default().size(size);
            gpu.device()
                .cmd_copy_buffer(cmd, staging.buffer, vertex_buffer.buffer, &[region]);
        },
    );

    allocator.destroy_buffer(&mut staging);

    match copy_result {
        Ok(()) => Ok(vertex_buffer),
        Err(e) => {
            let mut vertex_buffer = vertex_buffer;
            allocator.destroy_buffer(&mut vertex_buffer);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout() {
        assert_eq!(std::mem::size_of::<Vertex>(), 28);
        assert_eq!(Vertex::binding_description().stride, 28);

        let attributes = Vertex::attribute_descriptions();
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[0].format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(attributes[1].offset, 12);
        assert_eq!(attributes[1].format, vk::Format::R32G32B32A32_SFLOAT);
    }

    #[test]
    fn parse_single_triangle() {
        let positions = parse_tris("1\n0 0 0  1 0 0  0 1 0\n").unwrap();
        assert_eq!(
            positions,
            vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)]
        );
    }

    #[test]
    fn parse_count_mismatch() {
        let err = parse_tris("2\n0 0 0  1 0 0  0 1 0\n").unwrap_err();
        assert!(matches!(err, RenderError::Parse(_)));
    }

    #[test]
    fn parse_malformed_float() {
        let err = parse_tris("1\n0 0 zero  1 0 0  0 1 0\n").unwrap_err();
        assert!(matches!(err, RenderError::Parse(_)));
    }

    #[test]
    fn parse_missing_count() {
        assert!(matches!(parse_tris(""), Err(RenderError::Parse(_))));
    }
}
