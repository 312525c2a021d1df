// THEORY:
// The `camera_model` is the bridge between pixels and metres. Two directions are
// needed by the probe:
//
// 1.  **Deprojection**: a sample pixel plus its depth reading becomes a 3D point
//     in camera space, using the depth stream's intrinsics.
// 2.  **Projection**: the tip of the normal arrow is mapped back into the color
//     image for the overlay, using a fixed, calibrated intrinsic set.
//
// Projection can legitimately fail for a given frame (a point at or behind the
// camera plane, NaNs from bad depth, pixel coordinates too large to draw). Those
// cases come back as a `ProjectionError` so the caller can skip the overlay for
// that frame and carry on.

use crate::core_modules::region_sampler::PixelCoord;
use nalgebra::{Point2, Vector3};
use serde::Deserialize;
use thiserror::Error;

/// Points closer than this to the camera plane are not projected.
pub const MIN_PROJECTION_DEPTH: f64 = 1e-9;

/// Default length of the drawn normal arrow, in metres.
pub const DEFAULT_ARROW_LENGTH: f64 = 0.04;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ProjectionError {
    #[error("target out of range: depth {0} is at or behind the camera plane")]
    BehindCamera(f64),
    #[error("target out of range: non-finite coordinates")]
    NonFinite,
    #[error("target out of range: pixel ({0}, {1}) cannot be drawn")]
    OutOfBounds(f64, f64),
}

/// Pinhole intrinsics without distortion.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    /// Calibrated color camera used to draw the overlay (640x480 stream).
    pub const OVERLAY_640X480: Self = Self {
        fx: 610.899,
        fy: 610.824,
        cx: 324.496,
        cy: 234.984,
    };

    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Square pixels with the principal point at the image center, as reported
    /// by drivers that only expose a focal length.
    pub fn from_focal_length(focal: f64, width: u32, height: u32) -> Self {
        Self::new(focal, focal, f64::from(width) / 2.0, f64::from(height) / 2.0)
    }

    /// Lifts `pixel` at `depth` metres into camera space.
    pub fn deproject(&self, pixel: PixelCoord, depth: f64) -> Vector3<f64> {
        let x = (pixel.col - self.cx) / self.fx;
        let y = (pixel.row - self.cy) / self.fy;
        Vector3::new(x * depth, y * depth, depth)
    }

    /// Maps a camera-space point to sub-pixel image coordinates.
    pub fn project(&self, point: &Vector3<f64>) -> Result<Point2<f64>, ProjectionError> {
        if !point.iter().all(|c| c.is_finite()) {
            return Err(ProjectionError::NonFinite);
        }
        if point.z <= MIN_PROJECTION_DEPTH {
            return Err(ProjectionError::BehindCamera(point.z));
        }
        let u = self.fx * point.x / point.z + self.cx;
        let v = self.fy * point.y / point.z + self.cy;
        if !u.is_finite() || !v.is_finite() {
            return Err(ProjectionError::NonFinite);
        }
        Ok(Point2::new(u, v))
    }

    /// Projects and truncates to a drawable integer pixel.
    pub fn project_to_pixel(&self, point: &Vector3<f64>) -> Result<(i32, i32), ProjectionError> {
        let uv = self.project(point)?;
        let in_range = |c: f64| c > f64::from(i32::MIN) && c < f64::from(i32::MAX);
        if !in_range(uv.x) || !in_range(uv.y) {
            return Err(ProjectionError::OutOfBounds(uv.x, uv.y));
        }
        Ok((uv.x as i32, uv.y as i32))
    }
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        Self::OVERLAY_640X480
    }
}

/// The normal drawn as a segment in image space, from the patch center outward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalSegment {
    pub start: (i32, i32),
    pub end: (i32, i32),
}

impl NormalSegment {
    /// Projects `origin` and `origin + length * normal` through `intrinsics`.
    pub fn project(
        intrinsics: &CameraIntrinsics,
        origin: &Vector3<f64>,
        normal: &Vector3<f64>,
        length: f64,
    ) -> Result<Self, ProjectionError> {
        let tip = origin + normal * length;
        Ok(Self {
            start: intrinsics.project_to_pixel(origin)?,
            end: intrinsics.project_to_pixel(&tip)?,
        })
    }
}
