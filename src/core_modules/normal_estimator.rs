// THEORY:
// The `normal_estimator` turns the nine deprojected sample points into a single
// unit normal for the patch of surface under the probe.
//
// The patch is treated as a fan of eight triangles sharing the center point P0:
// (P0, P1, P2), (P0, P2, P3), ..., (P0, P8, P1). Each triangle contributes the
// cross product of its two edges anchored at P0. The contributions are not
// normalized first, so bigger (better conditioned) triangles weigh more.
//
// Orientation: camera space has +z pointing away from the camera. Each
// contribution is turned to face +z before summing (`Orientation::PerTriangle`),
// and the final sum is negated so the reported normal faces the camera. The
// alternative, `Orientation::Global`, flips the raw sum once. On clean data they
// agree; they differ when noise makes individual triangles fold over.
//
// The ring order is whatever `region_sampler::RING_DIRECTIONS` produces.

use crate::core_modules::region_sampler::{RING_SIZE, SAMPLE_COUNT};
use nalgebra::Vector3;
use serde::Deserialize;
use thiserror::Error;

/// Sums with a norm at or below this are treated as degenerate.
pub const DEGENERATE_EPSILON: f64 = 1e-12;

pub type Point3 = Vector3<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NormalError {
    /// The sample points do not span a plane (coincident, collinear or no depth).
    #[error("degenerate sample points, surface normal is undefined")]
    Degenerate,
    /// At least one sample coordinate is NaN or infinite.
    #[error("non-finite sample point")]
    NonFinite,
}

/// How triangle contributions are turned toward +z before they are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Flip each triangle's cross product individually.
    #[default]
    PerTriangle,
    /// Sum the raw cross products and flip the total once.
    Global,
}

/// Un-normalized normal of the triangle (p0, p1, p2).
fn triangle_cross(p0: &Point3, p1: &Point3, p2: &Point3) -> Point3 {
    (p1 - p0).cross(&(p2 - p0))
}

fn facing_positive_z(v: Point3) -> Point3 {
    if v.z < 0.0 { -v } else { v }
}

/// Iterates the eight fan triangles' raw cross products, in ring order.
fn fan_crosses(points: &[Point3; SAMPLE_COUNT]) -> impl Iterator<Item = Point3> + '_ {
    (1..=RING_SIZE).map(move |k| {
        let next = k % RING_SIZE + 1;
        triangle_cross(&points[0], &points[k], &points[next])
    })
}

/// Raw sum of the fan's cross products, with no orientation applied.
///
/// The sign of the result depends on the winding of the ring.
pub fn fan_cross_sum(points: &[Point3; SAMPLE_COUNT]) -> Point3 {
    fan_crosses(points).sum()
}

/// Estimates the unit surface normal with the default per-triangle orientation.
pub fn estimate_normal(points: &[Point3; SAMPLE_COUNT]) -> Result<Point3, NormalError> {
    estimate_normal_with(points, Orientation::PerTriangle)
}

/// Estimates the unit surface normal, facing the camera (z <= 0).
pub fn estimate_normal_with(
    points: &[Point3; SAMPLE_COUNT],
    orientation: Orientation,
) -> Result<Point3, NormalError> {
    if points.iter().any(|p| !p.iter().all(|c| c.is_finite())) {
        return Err(NormalError::NonFinite);
    }

    let sum: Point3 = match orientation {
        Orientation::PerTriangle => fan_crosses(points).map(facing_positive_z).sum(),
        Orientation::Global => facing_positive_z(fan_cross_sum(points)),
    };

    let inward = -sum;
    let magnitude = inward.norm();
    if !magnitude.is_finite() || magnitude <= DEGENERATE_EPSILON {
        return Err(NormalError::Degenerate);
    }
    Ok(inward / magnitude)
}
