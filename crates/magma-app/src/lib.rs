//! Windowed application framework for Magma.
//!
//! This crate handles the boilerplate around the GPU layer:
//! - Window creation and the winit event loop
//! - GPU context, surface, and swapchain setup
//! - The per-frame protocol (via `magma_gpu::frame`), including swapchain
//!   rebuilds when the surface goes stale
//!
//! # Example
//!
//! ```no_run
//! use magma_app::{run_app, AppConfig, AppContext, FrameContext, MagmaApp};
//!
//! struct MyApp;
//!
//! impl MagmaApp for MyApp {
//!     fn init(ctx: &mut AppContext) -> anyhow::Result<Self> {
//!         Ok(MyApp)
//!     }
//!
//!     fn update(&mut self, ctx: &AppContext, dt: f32) {}
//!
//!     fn render(&mut self, ctx: &AppContext, frame: &mut FrameContext) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app::<MyApp>(AppConfig::new("My App"))
//! }
//! ```

mod app;
mod context;
mod frame;
mod runner;

pub use app::MagmaApp;
pub use context::AppContext;
pub use frame::FrameContext;
pub use runner::{run_app, AppConfig};

// Re-export commonly used types for convenience
pub use magma_gpu::{GpuContext, GpuContextBuilder};
pub use winit::event::{DeviceEvent, DeviceId, WindowEvent};
