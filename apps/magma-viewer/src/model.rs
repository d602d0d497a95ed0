//! Demo model preparation.
//!
//! Loads a `.tris` triangle soup and massages it for display: scale up,
//! flip Y into Vulkan's clip-space convention, and center the model
//! vertically. Falls back to a built-in cube when no file is given or the
//! file fails to load.

use std::path::Path;

use glam::Vec3;
use magma_render::{load_tris, Vertex};
use tracing::warn;

const MODEL_SCALE: f32 = 10.0;

const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
const YELLOW: [f32; 4] = [1.0, 1.0, 0.0, 1.0];
const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

/// Load and prepare the demo model, or the fallback cube.
pub fn load_model(path: Option<&Path>) -> Vec<Vertex> {
    let positions = match path {
        Some(path) => match load_tris(path) {
            Ok(positions) => positions,
            Err(e) => {
                warn!("Failed to load {}: {e}; using built-in cube", path.display());
                cube_positions()
            }
        },
        None => cube_positions(),
    };
    prepare(positions)
}

/// Scale, flip Y, center vertically, and assign stream colors.
fn prepare(mut positions: Vec<Vec3>) -> Vec<Vertex> {
    for p in &mut positions {
        *p *= MODEL_SCALE;
        p.y = -p.y;
    }

    let (min_y, max_y) = positions.iter().fold((f32::MAX, f32::MIN), |(lo, hi), p| {
        (lo.min(p.y), hi.max(p.y))
    });
    let y_offset = -(min_y + max_y) / 2.0;

    positions
        .iter()
        .enumerate()
        .map(|(i, p)| Vertex {
            position: [p.x, p.y + y_offset, p.z],
            color: stream_color(i),
        })
        .collect()
}

/// Vertex color by position in the stream: each run of nine vertices gets
/// three white, three yellow, and three blue.
fn stream_color(index: usize) -> [f32; 4] {
    match index % 9 {
        0..=2 => WHITE,
        3..=5 => YELLOW,
        _ => BLUE,
    }
}

/// A unit cube as 12 triangles, centered at the origin.
fn cube_positions() -> Vec<Vec3> {
    const H: f32 = 0.5;
    let corners = [
        Vec3::new(-H, -H, -H),
        Vec3::new(H, -H, -H),
        Vec3::new(H, H, -H),
        Vec3::new(-H, H, -H),
        Vec3::new(-H, -H, H),
        Vec3::new(H, -H, H),
        Vec3::new(H, H, H),
        Vec3::new(-H, H, H),
    ];
    // Two triangles per face
    const INDICES: [usize; 36] = [
        0, 1, 2, 2, 3, 0, // back
        4, 6, 5, 6, 4, 7, // front
        0, 3, 7, 7, 4, 0, // left
        1, 5, 6, 6, 2, 1, // right
        3, 2, 6, 6, 7, 3, // top
        0, 4, 5, 5, 1, 0, // bottom
    ];
    INDICES.iter().map(|&i| corners[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_cycle_runs_in_threes() {
        for base in [0, 9, 18] {
            for i in 0..3 {
                assert_eq!(stream_color(base + i), WHITE);
            }
            for i in 3..6 {
                assert_eq!(stream_color(base + i), YELLOW);
            }
            for i in 6..9 {
                assert_eq!(stream_color(base + i), BLUE);
            }
        }
    }

    #[test]
    fn fallback_cube_has_twelve_triangles() {
        assert_eq!(cube_positions().len(), 36);
        assert_eq!(load_model(None).len(), 36);
    }

    #[test]
    fn prepared_model_is_vertically_centered() {
        let vertices = prepare(vec![
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 3.0, 0.0),
            Vec3::new(1.0, 2.0, 0.0),
        ]);
        let (min_y, max_y) = vertices.iter().fold((f32::MAX, f32::MIN), |(lo, hi), v| {
            (lo.min(v.position[1]), hi.max(v.position[1]))
        });
        assert!((min_y + max_y).abs() < 1e-5);
        // Scaled by 10 with Y negated, so the span is 20
        assert!((max_y - min_y - 20.0).abs() < 1e-5);
    }

    #[test]
    fn missing_file_falls_back_to_cube() {
        let vertices = load_model(Some(Path::new("/nonexistent/model.tris")));
        assert_eq!(vertices.len(), 36);
    }
}
