//! Pixel range validation.
//!
//! The attack assumes its input already lies inside the clip range. These
//! checks let callers enforce that precondition, and verify the output.

use ndarray::{Array4, ArrayBase, Axis, Data, Dimension};

use crate::attacks::ClipRange;
use crate::error::FgsmError;

/// Check that every value lies inside `range`.
///
/// Returns [`FgsmError::InvalidRange`] with the observed extremes otherwise.
/// Non-finite values always fail.
pub fn check_range<S, D>(values: &ArrayBase<S, D>, range: &ClipRange) -> Result<(), FgsmError>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    let mut valid = true;
    for &v in values.iter() {
        if !v.is_finite() || !range.contains(v) {
            valid = false;
        }
        min = min.min(v);
        max = max.max(v);
    }

    if valid {
        Ok(())
    } else {
        Err(FgsmError::InvalidRange {
            min,
            max,
            lower: range.lower,
            upper: range.upper,
        })
    }
}

/// Indices of the examples in `images` whose pixels all lie inside `range`.
pub fn filter_in_range(images: &Array4<f32>, range: &ClipRange) -> Vec<usize> {
    images
        .axis_iter(Axis(0))
        .enumerate()
        .filter(|(_, example)| check_range(example, range).is_ok())
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array4};

    #[test]
    fn test_range_pass() {
        let values = arr1(&[0.0, 0.5, 1.0]);
        assert!(check_range(&values, &ClipRange::unit()).is_ok());
    }

    #[test]
    fn test_range_fail_reports_extremes() {
        let values = arr1(&[-0.25, 0.5, 1.5]);
        match check_range(&values, &ClipRange::unit()) {
            Err(FgsmError::InvalidRange { min, max, .. }) => {
                assert_eq!(min, -0.25);
                assert_eq!(max, 1.5);
            }
            other => panic!("expected InvalidRange, got {:?}", other),
        }
    }

    #[test]
    fn test_range_rejects_nan() {
        let values = arr1(&[0.5, f32::NAN]);
        assert!(check_range(&values, &ClipRange::unit()).is_err());
    }

    #[test]
    fn test_filter_in_range() {
        let mut images = Array4::<f32>::from_elem((3, 2, 2, 1), 0.5);
        images[[1, 0, 1, 0]] = 2.0;
        assert_eq!(filter_in_range(&images, &ClipRange::unit()), vec![0, 2]);
        assert_eq!(filter_in_range(&images, &ClipRange::byte()), vec![0, 1, 2]);
    }
}
