// THEORY:
// The `region_sampler` decides *where* in the image the probe looks. It produces
// a fixed nine-point footprint: the center pixel followed by a ring of eight
// neighbours placed on the border of a square of side `edge`.
//
// The order of the ring is not cosmetic. The normal estimator builds a fan of
// triangles out of consecutive ring points, so both sides must agree on one
// rotational traversal. That traversal lives in `RING_DIRECTIONS` and nowhere
// else; the estimator consumes points in exactly the order produced here.

/// Number of points in a sample footprint (center + ring).
pub const SAMPLE_COUNT: usize = 9;

/// Number of points on the ring around the center.
pub const RING_SIZE: usize = SAMPLE_COUNT - 1;

/// Default side length of the square footprint, in pixels.
pub const DEFAULT_EDGE: f64 = 14.0;

/// Unit steps `(d_col, d_row)` for ring points 1..=8, in traversal order.
///
/// Image rows grow downward, so `+1` on the row axis is "south".
pub const RING_DIRECTIONS: [(i8, i8); RING_SIZE] = [
    (-1, 1),  // south-west
    (-1, 0),  // west
    (-1, -1), // north-west
    (0, -1),  // north
    (1, -1),  // north-east
    (1, 0),   // east
    (1, 1),   // south-east
    (0, 1),   // south
];

/// A sub-pixel image coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelCoord {
    pub col: f64,
    pub row: f64,
}

impl PixelCoord {
    pub fn new(col: f64, row: f64) -> Self {
        Self { col, row }
    }

    /// Snaps to the nearest integer pixel, ties to even.
    pub fn to_pixel(self) -> (i32, i32) {
        (
            self.col.round_ties_even() as i32,
            self.row.round_ties_even() as i32,
        )
    }

    pub fn distance_to(self, other: PixelCoord) -> f64 {
        ((self.col - other.col).powi(2) + (self.row - other.row).powi(2)).sqrt()
    }
}

impl From<(f64, f64)> for PixelCoord {
    fn from((col, row): (f64, f64)) -> Self {
        Self { col, row }
    }
}

/// Returns the nine sample positions around `center`.
///
/// Index 0 is `center`; indices 1..=8 follow `RING_DIRECTIONS`, each offset by
/// `edge / 2` along the axes it moves on. Bounds are not checked here.
pub fn sample_offsets(center: PixelCoord, edge: f64) -> [PixelCoord; SAMPLE_COUNT] {
    let half = edge / 2.0;
    let mut samples = [center; SAMPLE_COUNT];
    for (slot, (d_col, d_row)) in samples[1..].iter_mut().zip(RING_DIRECTIONS) {
        *slot = PixelCoord::new(
            center.col + f64::from(d_col) * half,
            center.row + f64::from(d_row) * half,
        );
    }
    samples
}
