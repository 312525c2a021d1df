// THEORY:
// `DepthFrame` is the only thing the probe needs to know about a camera: the
// depth, in metres, behind a pixel of the color image. The live viewer wraps an
// OpenCV depth map registered to the color stream; tests use synthetic surfaces.
//
// Depth sensors report 0 where they have no reading (holes around edges, dark or
// shiny materials). Samples are read raw by default so the recorded points are
// exactly what the sensor measured. Hole filling takes the farthest valid reading
// among a pixel's four neighbours ("farthest from around"); `fill_holes` applies
// it to a whole raw depth map for the colorized depth view, and `read_depth` can
// apply it to individual sample reads when asked.

use crate::core_modules::camera_model::CameraIntrinsics;
use crate::core_modules::normal_estimator::Point3;
use crate::core_modules::region_sampler::{PixelCoord, SAMPLE_COUNT};

/// A depth image aligned with the color image.
pub trait DepthFrame {
    /// Depth in metres at `(col, row)`, `Some(0.0)` for a hole, `None` outside the image.
    fn depth_at(&self, col: i32, row: i32) -> Option<f64>;
}

impl<F: Fn(i32, i32) -> Option<f64>> DepthFrame for F {
    fn depth_at(&self, col: i32, row: i32) -> Option<f64> {
        self(col, row)
    }
}

const NEIGHBOURS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

fn is_valid(depth: f64) -> bool {
    depth.is_finite() && depth > 0.0
}

/// Reads the depth at `(col, row)`, filling a hole from its neighbours when asked.
///
/// Out-of-image pixels read as 0.
pub fn read_depth<D: DepthFrame + ?Sized>(frame: &D, col: i32, row: i32, hole_filling: bool) -> f64 {
    let depth = frame.depth_at(col, row).unwrap_or(0.0);
    if is_valid(depth) || !hole_filling {
        return depth;
    }
    NEIGHBOURS
        .iter()
        .filter_map(|(dc, dr)| frame.depth_at(col + dc, row + dr))
        .filter(|d| is_valid(*d))
        .fold(0.0, f64::max)
}

/// Hole-fills a raw row-major depth map; 0 marks a hole.
///
/// Neighbours are read from `depth`, not from already filled output.
pub fn fill_holes(depth: &[u16], width: usize) -> Vec<u16> {
    if width == 0 {
        return depth.to_vec();
    }
    let height = depth.len() / width;
    let at = |col: isize, row: isize| -> u16 {
        if col < 0 || row < 0 || col >= width as isize || row >= height as isize {
            0
        } else {
            depth[row as usize * width + col as usize]
        }
    };
    depth
        .iter()
        .enumerate()
        .map(|(i, &raw)| {
            if raw != 0 || i >= width * height {
                return raw;
            }
            let (col, row) = ((i % width) as isize, (i / width) as isize);
            NEIGHBOURS
                .iter()
                .map(|(dc, dr)| at(col + *dc as isize, row + *dr as isize))
                .max()
                .unwrap_or(0)
        })
        .collect()
}

/// Deprojects every sample pixel, in sample order.
pub fn deproject_samples<D: DepthFrame + ?Sized>(
    frame: &D,
    pixels: &[PixelCoord; SAMPLE_COUNT],
    intrinsics: &CameraIntrinsics,
    hole_filling: bool,
) -> [Point3; SAMPLE_COUNT] {
    pixels.map(|pixel| {
        let (col, row) = pixel.to_pixel();
        let depth = read_depth(frame, col, row, hole_filling);
        intrinsics.deproject(PixelCoord::new(f64::from(col), f64::from(row)), depth)
    })
}
