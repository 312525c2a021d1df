/// Rounds `value` down to `precision` decimal places.
///
/// Half a unit of the last kept decimal is subtracted before rounding to the
/// nearest (ties to even), so results lean toward negative infinity:
/// `0.1234 -> 0.123`, `-0.1234 -> -0.124`.
pub fn floor_round(value: f64, precision: i32) -> f64 {
    let scale = 10f64.powi(precision);
    let shifted = value - 0.5 * 10f64.powi(-precision);
    (shifted * scale).round_ties_even() / scale
}
