//! Categorical cross-entropy
//!
//! `loss = -mean_over_batch(sum_over_classes(labels * log(predictions)))`
//!
//! Predictions are expected to be probability rows (softmax outputs) and are
//! not renormalized. They are clamped into `[log_epsilon, 1 - log_epsilon]`
//! before the logarithm so a saturated softmax cannot produce `log(0)`.

use serde::{Deserialize, Serialize};

use super::Loss;
use crate::autodiff::{Tape, Var};
use crate::error::FgsmError;

/// Default clamp applied to probabilities before taking the logarithm.
pub const DEFAULT_LOG_EPSILON: f32 = 1e-7;

/// Categorical cross-entropy averaged over the batch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoricalCrossentropy {
    /// Treat predictions as unnormalized logits and apply log-softmax.
    pub from_logits: bool,
    /// Probability clamp used when `from_logits` is false (0.0..0.5).
    pub log_epsilon: f32,
}

impl Default for CategoricalCrossentropy {
    fn default() -> Self {
        Self {
            from_logits: false,
            log_epsilon: DEFAULT_LOG_EPSILON,
        }
    }
}

impl CategoricalCrossentropy {
    /// Cross-entropy over logits instead of probabilities.
    pub fn from_logits() -> Self {
        Self {
            from_logits: true,
            ..Self::default()
        }
    }
}

impl Loss for CategoricalCrossentropy {
    fn name(&self) -> &str {
        "categorical_crossentropy"
    }

    fn loss(&self, tape: &mut Tape, labels: Var, predictions: Var) -> Result<Var, FgsmError> {
        let label_shape = tape.value(labels)?.shape().to_vec();
        let pred_shape = tape.value(predictions)?.shape().to_vec();
        if label_shape.len() != 2 || label_shape != pred_shape {
            return Err(FgsmError::ShapeMismatch(format!(
                "labels {:?} are incompatible with predictions {:?}",
                label_shape, pred_shape
            )));
        }

        let log_probs = if self.from_logits {
            tape.log_softmax(predictions)?
        } else {
            if !(0.0..0.5).contains(&self.log_epsilon) {
                return Err(FgsmError::InvalidClipRange {
                    lower: self.log_epsilon,
                    upper: 1.0 - self.log_epsilon,
                });
            }
            let clamped = tape.clamp(predictions, self.log_epsilon, 1.0 - self.log_epsilon)?;
            tape.log(clamped)?
        };

        let weighted = tape.mul(labels, log_probs)?;
        let per_example = tape.sum_last_axis(weighted)?;
        let mean = tape.mean(per_example)?;
        tape.scale(mean, -1.0)
    }
}
