//! Scene math, mesh loading, and uniform plumbing for Magma.
//!
//! This crate provides:
//! - First-person camera and model transforms (quaternion based)
//! - Vertex layout and `.tris` model loading with staging upload
//! - SPIR-V loading
//! - The per-frame transform uniform block and its descriptor wiring

pub mod camera;
pub mod error;
pub mod mesh;
pub mod shader;
pub mod uniform;

pub use camera::{projection_matrix, quat_from_turns, Camera, ModelTransform, TransformUniforms};
pub use error::{RenderError, Result};
pub use mesh::{load_tris, parse_tris, upload_vertices, Vertex};
pub use shader::load_spirv;
pub use uniform::UniformBinding;
