//! Elementwise sign.
//!
//! Unlike [`f32::signum`], which maps `+0.0` to `1.0`, [`sign`] maps both
//! zeros to `0.0` so pixels with a zero gradient are left untouched.

use ndarray::{Array, ArrayBase, Data, Dimension};

/// `-1.0` for negative, `0.0` for zero, `1.0` for positive input.
///
/// NaN maps to `0.0`; callers reject non-finite gradients beforehand.
#[inline]
pub fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Apply [`sign`] to every element.
pub fn signed<S, D>(values: &ArrayBase<S, D>) -> Array<f32, D>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    values.mapv(sign)
}
