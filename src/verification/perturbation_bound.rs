//! Perturbation-budget verification for adversarial batches.
//!
//! Confirms that every example moved by at most its epsilon in L∞ norm,
//! the defining property of a single sign-gradient step.

use ndarray::{Array4, Axis};

use crate::attacks::Epsilon;
use crate::error::FgsmError;
use crate::math::norms::linf_distance;

/// Check that `adversarial` stays within `epsilon` (plus `tolerance`) of
/// `original` in L∞ norm, example by example.
pub fn check_perturbation_bound(
    original: &Array4<f32>,
    adversarial: &Array4<f32>,
    epsilon: &Epsilon,
    tolerance: f32,
) -> Result<(), FgsmError> {
    if original.dim() != adversarial.dim() {
        return Err(FgsmError::ShapeMismatch(format!(
            "original {:?} vs adversarial {:?}",
            original.shape(),
            adversarial.shape()
        )));
    }
    epsilon.validate(original.len_of(Axis(0)))?;

    for (i, (orig, adv)) in original
        .axis_iter(Axis(0))
        .zip(adversarial.axis_iter(Axis(0)))
        .enumerate()
    {
        let norm = linf_distance(&adv, &orig);
        let budget = epsilon.for_example(i);
        if norm > budget + tolerance {
            return Err(FgsmError::VerificationError(format!(
                "Example {} perturbation {:.6} exceeds epsilon {:.6}",
                i, norm, budget
            )));
        }
    }
    Ok(())
}

/// Indices of examples whose perturbation stays within budget.
pub fn filter_within_bound(
    original: &Array4<f32>,
    adversarial: &Array4<f32>,
    epsilon: f32,
    tolerance: f32,
) -> Vec<usize> {
    original
        .axis_iter(Axis(0))
        .zip(adversarial.axis_iter(Axis(0)))
        .enumerate()
        .filter(|(_, (orig, adv))| linf_distance(adv, orig) <= epsilon + tolerance)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn test_bound_pass() {
        let original = Array4::from_elem((2, 1, 2, 1), 0.5);
        let adversarial = original.mapv(|x| x + 0.1);
        assert!(check_perturbation_bound(&original, &adversarial, &Epsilon::Scalar(0.1), 1e-6).is_ok());
    }

    #[test]
    fn test_bound_fail() {
        let original = Array4::from_elem((1, 1, 2, 1), 0.5);
        let mut adversarial = original.clone();
        adversarial[[0, 0, 1, 0]] = 0.9;
        let result = check_perturbation_bound(&original, &adversarial, &Epsilon::Scalar(0.1), 1e-6);
        assert!(matches!(result, Err(FgsmError::VerificationError(_))));
    }

    #[test]
    fn test_bound_per_example() {
        let original = Array4::from_elem((2, 1, 1, 1), 0.5);
        let mut adversarial = original.clone();
        adversarial[[1, 0, 0, 0]] = 0.7;
        let tight: Epsilon = vec![0.3f32, 0.1].into();
        let loose: Epsilon = vec![0.0f32, 0.2].into();
        assert!(check_perturbation_bound(&original, &adversarial, &tight, 1e-6).is_err());
        assert!(check_perturbation_bound(&original, &adversarial, &loose, 1e-6).is_ok());
    }

    #[test]
    fn test_bound_shape_mismatch() {
        let original = Array4::<f32>::zeros((1, 2, 2, 1));
        let adversarial = Array4::<f32>::zeros((1, 2, 1, 1));
        assert!(matches!(
            check_perturbation_bound(&original, &adversarial, &Epsilon::Scalar(0.1), 0.0),
            Err(FgsmError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_filter_within_bound() {
        let original = Array4::from_elem((3, 1, 1, 1), 0.5);
        let mut adversarial = original.clone();
        adversarial[[0, 0, 0, 0]] = 0.6;
        adversarial[[1, 0, 0, 0]] = 0.0;
        adversarial[[2, 0, 0, 0]] = 0.45;
        assert_eq!(filter_within_bound(&original, &adversarial, 0.1, 1e-6), vec![0, 2]);
    }
}
