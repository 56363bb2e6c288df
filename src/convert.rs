//! Small numeric conversions used throughout the mesh and interpolation code.

/// Widens `x` to `f64`. A thin, named wrapper around `as` so call sites read as intent
/// rather than a bare cast.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn f64_from_usize(x: usize) -> f64 {
    x as f64
}

/// Floors `x` to the containing non-negative integer, or `None` if `x` is negative or
/// non-finite. Used to turn a continuous axis coordinate into a cell/vertex index before
/// the caller clamps it into range.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub(crate) fn usize_from_f64_floor(x: f64) -> Option<usize> {
    if x.is_finite() && x >= 0.0 {
        Some(x.floor() as usize)
    } else {
        None
    }
}

/// Rounds `x` to the nearest non-negative integer, saturating at `0` for negative or
/// non-finite input. Used by the seeder to turn a fractional particle allocation
/// (`n_total * p_c`) into an integer count.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub(crate) fn usize_from_f64_round(x: f64) -> usize {
    if x.is_finite() && x > 0.0 {
        x.round() as usize
    } else {
        0
    }
}
