//! Attack parameters: perturbation budget, clip bounds and generator settings.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::FgsmError;

/// Valid pixel range the adversarial batch is clipped into.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipRange {
    /// Smallest valid value
    pub lower: f32,
    /// Largest valid value
    pub upper: f32,
}

impl Default for ClipRange {
    fn default() -> Self {
        Self::unit()
    }
}

impl ClipRange {
    /// Create a range, rejecting inverted or non-finite bounds.
    pub fn new(lower: f32, upper: f32) -> Result<Self, FgsmError> {
        let range = Self { lower, upper };
        range.validate()?;
        Ok(range)
    }

    /// `[0, 1]`, images normalized by 255.
    pub fn unit() -> Self {
        Self {
            lower: 0.0,
            upper: 1.0,
        }
    }

    /// `[-1, 1]`, images normalized around zero.
    pub fn symmetric() -> Self {
        Self {
            lower: -1.0,
            upper: 1.0,
        }
    }

    /// `[0, 255]`, raw byte intensities.
    pub fn byte() -> Self {
        Self {
            lower: 0.0,
            upper: 255.0,
        }
    }

    /// Width of the range.
    pub fn width(&self) -> f32 {
        self.upper - self.lower
    }

    /// Whether `value` lies inside the range (inclusive).
    #[inline]
    pub fn contains(&self, value: f32) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// Clamp `value` into the range.
    ///
    /// Never panics; an inverted range yields `upper`.
    #[inline]
    pub fn apply(&self, value: f32) -> f32 {
        value.max(self.lower).min(self.upper)
    }

    /// Check that the bounds are finite and ordered.
    pub fn validate(&self) -> Result<(), FgsmError> {
        if !self.lower.is_finite() || !self.upper.is_finite() || self.lower > self.upper {
            return Err(FgsmError::InvalidClipRange {
                lower: self.lower,
                upper: self.upper,
            });
        }
        Ok(())
    }
}

/// Perturbation budget, shared by the batch or given per example.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Epsilon {
    /// Same budget for every example
    Scalar(f32),
    /// One budget per example, broadcast along the batch axis
    PerExample(Array1<f32>),
}

impl From<f32> for Epsilon {
    fn from(value: f32) -> Self {
        Epsilon::Scalar(value)
    }
}

impl From<Array1<f32>> for Epsilon {
    fn from(values: Array1<f32>) -> Self {
        Epsilon::PerExample(values)
    }
}

impl From<Vec<f32>> for Epsilon {
    fn from(values: Vec<f32>) -> Self {
        Epsilon::PerExample(Array1::from_vec(values))
    }
}

impl Epsilon {
    /// Budget applied to example `index`.
    #[inline]
    pub fn for_example(&self, index: usize) -> f32 {
        match self {
            Epsilon::Scalar(eps) => *eps,
            Epsilon::PerExample(values) => values[index],
        }
    }

    /// Largest budget in use.
    pub fn max(&self) -> f32 {
        match self {
            Epsilon::Scalar(eps) => *eps,
            Epsilon::PerExample(values) => values.iter().copied().fold(0.0, f32::max),
        }
    }

    /// Check that every budget is finite and non-negative, and that a
    /// per-example budget covers exactly `batch_size` examples.
    pub fn validate(&self, batch_size: usize) -> Result<(), FgsmError> {
        let check = |eps: f32| {
            if eps.is_finite() && eps >= 0.0 {
                Ok(())
            } else {
                Err(FgsmError::InvalidEpsilon(eps))
            }
        };
        match self {
            Epsilon::Scalar(eps) => check(*eps),
            Epsilon::PerExample(values) => {
                if values.len() != batch_size {
                    return Err(FgsmError::ShapeMismatch(format!(
                        "{} per-example epsilons for a batch of {}",
                        values.len(),
                        batch_size
                    )));
                }
                values.iter().try_for_each(|&eps| check(eps))
            }
        }
    }
}

/// Generator settings.
///
/// # Example
///
/// ```rust
/// use fgsm::attacks::{ClipRange, FgsmConfig};
///
/// let config = FgsmConfig::byte_range().with_input_validation(true);
/// assert_eq!(config.clip, ClipRange::byte());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FgsmConfig {
    /// Bounds the adversarial batch is clipped into.
    pub clip: ClipRange,
    /// Reject input batches with values outside `clip` before attacking.
    pub validate_input_range: bool,
    /// Log a warning when epsilon exceeds this fraction of the clip width.
    pub warn_epsilon_fraction: f32,
}

impl Default for FgsmConfig {
    fn default() -> Self {
        Self {
            clip: ClipRange::unit(),
            validate_input_range: false,
            warn_epsilon_fraction: 0.3,
        }
    }
}

impl FgsmConfig {
    /// Pixels normalized into `[0, 1]` (the default).
    pub fn unit_range() -> Self {
        Self::default()
    }

    /// Pixels normalized into `[-1, 1]`.
    pub fn symmetric_range() -> Self {
        Self {
            clip: ClipRange::symmetric(),
            ..Self::default()
        }
    }

    /// Raw byte intensities in `[0, 255]`.
    pub fn byte_range() -> Self {
        Self {
            clip: ClipRange::byte(),
            ..Self::default()
        }
    }

    /// Replace the clip range.
    pub fn with_clip(mut self, clip: ClipRange) -> Self {
        self.clip = clip;
        self
    }

    /// Enable or disable input range validation.
    pub fn with_input_validation(mut self, enabled: bool) -> Self {
        self.validate_input_range = enabled;
        self
    }

    /// Epsilon above which a warning is logged.
    pub fn warn_epsilon_threshold(&self) -> f32 {
        self.warn_epsilon_fraction * self.clip.width()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_clip_range_validation() {
        assert!(ClipRange::new(0.0, 1.0).is_ok());
        assert!(ClipRange::new(1.0, 0.0).is_err());
        assert!(ClipRange::new(f32::NAN, 1.0).is_err());
        assert!(ClipRange::new(0.0, f32::INFINITY).is_err());
    }

    #[test]
    fn test_clip_range_apply() {
        let range = ClipRange::unit();
        assert_eq!(range.apply(1.15), 1.0);
        assert_eq!(range.apply(-0.2), 0.0);
        assert_eq!(range.apply(0.4), 0.4);
        assert!(range.contains(1.0));
        assert!(!range.contains(1.0001));
    }

    #[test]
    fn test_inverted_range_apply_does_not_panic() {
        let inverted = ClipRange {
            lower: 1.0,
            upper: 0.0,
        };
        assert!(inverted.validate().is_err());
        assert_eq!(inverted.apply(0.5), 0.0);
        assert_eq!(inverted.apply(2.0), 0.0);
    }

    #[test]
    fn test_epsilon_scalar() {
        let eps = Epsilon::from(0.1f32);
        assert!(eps.validate(3).is_ok());
        assert_eq!(eps.for_example(2), 0.1);
        assert_eq!(eps.max(), 0.1);
    }

    #[test]
    fn test_epsilon_rejects_negative_and_nan() {
        assert!(matches!(
            Epsilon::from(-0.1f32).validate(1),
            Err(FgsmError::InvalidEpsilon(_))
        ));
        assert!(Epsilon::from(f32::NAN).validate(1).is_err());
        assert!(Epsilon::from(vec![0.1f32, -1.0]).validate(2).is_err());
    }

    #[test]
    fn test_epsilon_per_example() {
        let eps = Epsilon::from(arr1(&[0.0f32, 0.2, 0.1]));
        assert!(eps.validate(3).is_ok());
        assert_eq!(eps.for_example(1), 0.2);
        assert_eq!(eps.max(), 0.2);
        assert!(matches!(eps.validate(2), Err(FgsmError::ShapeMismatch(_))));
    }

    #[test]
    fn test_config_presets() {
        assert_eq!(FgsmConfig::default().clip, ClipRange::unit());
        assert_eq!(FgsmConfig::symmetric_range().clip.lower, -1.0);
        assert!((FgsmConfig::byte_range().warn_epsilon_threshold() - 76.5).abs() < 1e-3);
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: FgsmConfig = serde_json::from_str(r#"{"validate_input_range": true}"#).unwrap();
        assert!(config.validate_input_range);
        assert_eq!(config.clip, ClipRange::unit());

        let json = serde_json::to_string(&FgsmConfig::symmetric_range()).unwrap();
        let restored: FgsmConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, FgsmConfig::symmetric_range());
    }
}
