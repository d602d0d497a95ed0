//! Viewer application implementation.

use std::path::PathBuf;

use magma_app::{AppContext, DeviceEvent, DeviceId, FrameContext, MagmaApp, WindowEvent};
use magma_gpu::{
    record_draw, DrawRecording, GpuBuffer, GraphicsPipeline, GraphicsPipelineConfig,
};
use magma_render::{
    load_spirv, upload_vertices, Camera, ModelTransform, TransformUniforms, UniformBinding, Vertex,
};
use tracing::{info, warn};
use winit::event::{ElementState, MouseButton};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::model;

/// Full drag across one window dimension turns the camera half a revolution.
const ROTATIONS_PER_SCREEN: f32 = 0.5;

/// Camera dolly step per W/S press, in world units.
const CAMERA_STEP: f32 = 5.0;

/// Viewer options from the command line.
struct ViewerArgs {
    model: Option<PathBuf>,
    shader_dir: PathBuf,
}

impl Default for ViewerArgs {
    fn default() -> Self {
        Self {
            model: None,
            shader_dir: PathBuf::from("shaders_out"),
        }
    }
}

impl ViewerArgs {
    fn from_args() -> Self {
        let mut parsed = Self::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--model" => {
                    if i + 1 < args.len() {
                        parsed.model = Some(PathBuf::from(&args[i + 1]));
                        i += 1;
                    }
                }
                "--shader-dir" => {
                    if i + 1 < args.len() {
                        parsed.shader_dir = PathBuf::from(&args[i + 1]);
                        i += 1;
                    }
                }
                _ => {}
            }
            i += 1;
        }

        parsed
    }
}

/// Viewer application state.
pub struct Viewer {
    /// Device-local vertex buffer for the model.
    vertex_buffer: GpuBuffer,
    vertex_count: u32,
    /// Mapped transform block and its descriptor set.
    uniforms: UniformBinding,
    /// Model pipeline against the swapchain unit's render pass.
    pipeline: GraphicsPipeline,
    camera: Camera,
    model: ModelTransform,
    /// Whether the left mouse button is held.
    dragging: bool,
    /// Window size for scaling mouse deltas into turns.
    window_size: (f32, f32),
}

impl MagmaApp for Viewer {
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self> {
        let args = ViewerArgs::from_args();

        let vertices = model::load_model(args.model.as_deref());
        // SAFETY: GPU context and command pool are valid
        let vertex_buffer = unsafe { upload_vertices(&ctx.gpu, &ctx.command_pool, &vertices)? };

        let vertex_shader = load_spirv(args.shader_dir.join("vert.spv"))?;
        let fragment_shader = load_spirv(args.shader_dir.join("frag.spv"))?;

        // SAFETY: GPU context is valid
        let uniforms = unsafe { UniformBinding::new(&ctx.gpu)? };

        let config = GraphicsPipelineConfig {
            vertex_shader,
            fragment_shader,
            vertex_bindings: vec![Vertex::binding_description()],
            vertex_attributes: Vertex::attribute_descriptions().to_vec(),
            samples: ctx.gpu.sample_count(),
            ..Default::default()
        };
        // SAFETY: Render pass and descriptor layout are valid
        let pipeline = unsafe {
            GraphicsPipeline::new(
                ctx.gpu.device(),
                &config,
                ctx.unit.render_pass,
                &[uniforms.layout()],
                &[],
            )?
        };

        info!("Viewer ready: {} vertices", vertices.len());

        Ok(Self {
            vertex_buffer,
            vertex_count: vertices.len() as u32,
            uniforms,
            pipeline,
            camera: Camera::default(),
            model: ModelTransform::default(),
            dragging: false,
            window_size: (ctx.width() as f32, ctx.height() as f32),
        })
    }

    fn update(&mut self, _ctx: &AppContext, _dt: f32) {
        let uniforms = TransformUniforms::new(&self.model, &self.camera);
        if let Err(e) = self.uniforms.write(&uniforms) {
            warn!("Failed to write transform block: {e}");
        }
    }

    fn render(&mut self, ctx: &AppContext, frame: &mut FrameContext) -> anyhow::Result<()> {
        let draw = DrawRecording {
            render_pass: ctx.unit.render_pass,
            framebuffer: ctx.unit.framebuffers[frame.image_index as usize],
            extent: frame.extent,
            pipeline: self.pipeline.pipeline,
            pipeline_layout: self.pipeline.layout,
            descriptor_set: self.uniforms.set(),
            vertex_buffer: self.vertex_buffer.buffer,
            vertex_count: self.vertex_count,
        };
        // SAFETY: The command buffer is recording and all handles are valid
        unsafe { record_draw(ctx.gpu.device(), frame.command_buffer, &draw)? };
        Ok(())
    }

    fn on_resize(&mut self, _ctx: &mut AppContext, width: u32, height: u32) -> anyhow::Result<()> {
        self.window_size = (width as f32, height as f32);
        Ok(())
    }

    fn on_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.dragging = state.is_pressed();
                false
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::KeyW) => {
                        self.camera.position.z += CAMERA_STEP;
                        true
                    }
                    PhysicalKey::Code(KeyCode::KeyS) => {
                        self.camera.position.z -= CAMERA_STEP;
                        true
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }

    fn on_device_event(&mut self, _device_id: DeviceId, event: &DeviceEvent) {
        if !self.dragging {
            return;
        }
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            let (width, height) = self.window_size;
            let pitch = -(*dy as f32) / height * ROTATIONS_PER_SCREEN;
            let yaw = -(*dx as f32) / width * ROTATIONS_PER_SCREEN;
            self.camera.rotate(pitch, yaw);
        }
    }

    fn cleanup(&mut self, ctx: &mut AppContext) {
        // SAFETY: The runner has waited for the device to go idle
        unsafe {
            self.pipeline.destroy(ctx.gpu.device());
            let allocator = ctx.gpu.allocator().lock();
            self.uniforms.destroy(&ctx.gpu, &allocator);
            allocator.destroy_buffer(&mut self.vertex_buffer);
        }
    }
}
