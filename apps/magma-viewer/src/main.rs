//! Magma demo viewer.
//!
//! Renders a triangle-soup model with 8x MSAA, a drag-to-look camera, and
//! W/S dolly controls.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p magma-viewer -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `--model <PATH>`: Path to a `.tris` model file (default: built-in cube)
//! - `--shader-dir <DIR>`: Directory containing `vert.spv` and `frag.spv`
//!   (default: `shaders_out`)
//! - `-h, --help`: Print help message
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;
mod model;

use magma_app::{run_app, AppConfig};

use crate::app::Viewer;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

fn main() -> anyhow::Result<()> {
    // Check for help flag before starting the app
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    run_app::<Viewer>(AppConfig::new("Magma Viewer").with_size(WIDTH, HEIGHT))
}

fn print_help() {
    eprintln!(
        "Magma Demo Viewer

USAGE:
    cargo run -p magma-viewer -- [OPTIONS]

OPTIONS:
    --model <PATH>        Path to a .tris model file
                          Default: built-in cube
    --shader-dir <DIR>    Directory containing vert.spv and frag.spv
                          Default: shaders_out
    -h, --help            Print this help message

CONTROLS:
    Left mouse drag       Rotate the camera
    W / S                 Dolly the camera along world Z

ENVIRONMENT VARIABLES:
    RUST_LOG              Set log level (e.g., info, debug, trace)"
    );
}
