//! Differentiable models the attack can be run against.
//!
//! Any type implementing [`DifferentiableModel`] can be attacked. The crate
//! ships two implementations:
//!
//! - [`FnModel`] - wraps a closure that records its forward pass on a tape
//! - [`Sequential`] - a stack of dense layers and activations, serializable with serde

pub mod sequential;

pub use sequential::{Layer, Linear, Sequential};

use ndarray::{Array2, ArrayView4, Ix2};

use crate::autodiff::{Tape, Var};
use crate::error::FgsmError;

/// A model whose forward pass is differentiable with respect to its input.
///
/// `forward` receives the image batch already recorded on `tape` and must
/// record every operation it performs there. Weights are recorded with
/// [`Tape::constant`]; the input is what the caller chose to watch.
pub trait DifferentiableModel {
    /// Record the forward pass and return the `(N, num_classes)` prediction.
    fn forward(&self, tape: &mut Tape, input: Var) -> Result<Var, FgsmError>;

    /// Evaluate the model without tracking gradients.
    fn predict(&self, images: ArrayView4<'_, f32>) -> Result<Array2<f32>, FgsmError> {
        let mut tape = Tape::new();
        let input = tape.constant(images.to_owned().into_dyn());
        let output = self.forward(&mut tape, input)?;
        let value = tape.value(output)?.clone();
        value.into_dimensionality::<Ix2>().map_err(|_| {
            FgsmError::ShapeMismatch("model output is not a 2-D prediction batch".to_string())
        })
    }
}

impl<M: DifferentiableModel + ?Sized> DifferentiableModel for &M {
    fn forward(&self, tape: &mut Tape, input: Var) -> Result<Var, FgsmError> {
        (**self).forward(tape, input)
    }
}

impl<M: DifferentiableModel + ?Sized> DifferentiableModel for Box<M> {
    fn forward(&self, tape: &mut Tape, input: Var) -> Result<Var, FgsmError> {
        (**self).forward(tape, input)
    }
}

/// Adapter turning a closure into a [`DifferentiableModel`].
///
/// # Example
///
/// ```rust
/// use fgsm::models::{DifferentiableModel, FnModel};
/// use ndarray::Array4;
///
/// // Two-class model: softmax over [sum(pixels), 0]
/// let model = FnModel::new(|tape: &mut fgsm::Tape, input| {
///     let flat = tape.flatten(input)?;
///     let logit = tape.sum_last_axis(flat)?;
///     let n = tape.value(logit)?.len();
///     let logit = tape.reshape(logit, &[n, 1])?;
///     let zeros = tape.constant(ndarray::Array2::<f32>::zeros((n, 1)).into_dyn());
///     let both = tape.concat_columns(logit, zeros)?;
///     tape.softmax(both)
/// });
///
/// let images = Array4::<f32>::zeros((1, 2, 2, 1));
/// let probs = model.predict(images.view()).unwrap();
/// assert!((probs[[0, 0]] - 0.5).abs() < 1e-6);
/// ```
pub struct FnModel<F> {
    f: F,
}

impl<F> FnModel<F>
where
    F: Fn(&mut Tape, Var) -> Result<Var, FgsmError>,
{
    /// Wrap a forward closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> DifferentiableModel for FnModel<F>
where
    F: Fn(&mut Tape, Var) -> Result<Var, FgsmError>,
{
    fn forward(&self, tape: &mut Tape, input: Var) -> Result<Var, FgsmError> {
        (self.f)(tape, input)
    }
}

impl<F> std::fmt::Debug for FnModel<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnModel").finish_non_exhaustive()
    }
}
