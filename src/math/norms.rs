//! Norms of perturbation tensors.
//!
//! Generic over any ndarray storage and dimensionality so the same code
//! measures a whole batch or a single example view.

use ndarray::{ArrayBase, Data, Dimension};

/// L2 (Euclidean) norm over every element.
pub fn l2_norm<S, D>(v: &ArrayBase<S, D>) -> f32
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    l2_norm_sq(v).sqrt()
}

/// Squared L2 norm (avoids sqrt).
pub fn l2_norm_sq<S, D>(v: &ArrayBase<S, D>) -> f32
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    v.iter().map(|x| x * x).sum()
}

/// L∞ norm: the largest absolute element, `0.0` when empty.
pub fn linf_norm<S, D>(v: &ArrayBase<S, D>) -> f32
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    v.iter().fold(0.0f32, |m, x| m.max(x.abs()))
}

/// `linf_norm(a - b)` without allocating the difference.
///
/// Elements are paired in logical order; callers check shapes first.
pub fn linf_distance<S, T, D>(a: &ArrayBase<S, D>, b: &ArrayBase<T, D>) -> f32
where
    S: Data<Elem = f32>,
    T: Data<Elem = f32>,
    D: Dimension,
{
    a.iter()
        .zip(b.iter())
        .fold(0.0f32, |m, (x, y)| m.max((x - y).abs()))
}
