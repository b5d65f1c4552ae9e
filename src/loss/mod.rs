//! Loss functions reduced to a scalar on the tape.
//!
//! - [`crossentropy`] - categorical cross-entropy, the attack's default objective

pub mod crossentropy;

pub use crossentropy::CategoricalCrossentropy;

use crate::autodiff::{Tape, Var};
use crate::error::FgsmError;

/// A scalar loss over a batch of predictions.
///
/// Implementations record their computation on `tape` so that the
/// perturbation generator can differentiate through it.
pub trait Loss: Send + Sync {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &str;

    /// Record `loss(labels, predictions)` and return the scalar result.
    fn loss(&self, tape: &mut Tape, labels: Var, predictions: Var) -> Result<Var, FgsmError>;
}
