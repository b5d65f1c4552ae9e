//! Fast Gradient Sign Method
//!
//! Single-step attack from Goodfellow et al. (2015), "Explaining and
//! Harnessing Adversarial Examples":
//!
//! `adversarial = clip(images + epsilon * sign(d loss / d images))`
//!
//! The gradient is taken with respect to the input batch, not the model's
//! weights, so the model is only ever evaluated, never updated.

use ndarray::{Array2, Array4, Axis, Ix4, Zip};
use rayon::prelude::*;
use tracing::{debug, trace, warn};

use super::config::{ClipRange, Epsilon, FgsmConfig};
use super::PerturbationGenerator;
use crate::autodiff::Tape;
use crate::error::FgsmError;
use crate::loss::Loss;
use crate::math::sign::signed;
use crate::models::DifferentiableModel;
use crate::verification::range::check_range;

/// One FGSM step with the default configuration and cross-entropy loss.
///
/// Equivalent to `PerturbationGenerator::default().generate(...)`.
///
/// # Arguments
///
/// * `model` - Classifier producing `(N, num_classes)` probability rows
/// * `images` - Clean batch `(N, H, W, C)` with values in `[0, 1]`
/// * `labels` - True (or target) label distributions `(N, num_classes)`
/// * `epsilon` - Perturbation budget, scalar or per example
///
/// # Example
///
/// ```rust
/// use fgsm::{fgsm, Sequential};
/// use ndarray::{array, Array1, Array2, Array4};
///
/// let model = Sequential::softmax_classifier(
///     Array2::from_shape_fn((4, 2), |(i, j)| if (i + j) % 2 == 0 { 1.0 } else { -1.0 }),
///     Array1::zeros(2),
/// )
/// .unwrap();
/// let images = Array4::from_elem((1, 2, 2, 1), 0.5);
/// let labels = array![[1.0, 0.0]];
///
/// let adversarial = fgsm(&model, &images, &labels, 0.1f32).unwrap();
/// assert_eq!(adversarial.dim(), images.dim());
/// assert!(adversarial.iter().all(|&x| (0.0..=1.0).contains(&x)));
/// ```
pub fn fgsm<M>(
    model: &M,
    images: &Array4<f32>,
    labels: &Array2<f32>,
    epsilon: impl Into<Epsilon>,
) -> Result<Array4<f32>, FgsmError>
where
    M: DifferentiableModel + ?Sized,
{
    PerturbationGenerator::default().generate(model, images, labels, epsilon)
}

/// Result of a single step, before it is handed to the caller.
pub(crate) struct Outcome {
    pub(crate) adversarial: Array4<f32>,
    pub(crate) loss: f32,
    pub(crate) zero_gradient: usize,
    pub(crate) clipped: usize,
}

pub(crate) fn run<M, L>(
    model: &M,
    loss_fn: &L,
    config: &FgsmConfig,
    images: &Array4<f32>,
    labels: &Array2<f32>,
    epsilon: &Epsilon,
) -> Result<Outcome, FgsmError>
where
    M: DifferentiableModel + ?Sized,
    L: Loss + ?Sized,
{
    let batch_size = images.len_of(Axis(0));
    if batch_size == 0 {
        return Err(FgsmError::EmptyBatch);
    }
    if labels.nrows() != batch_size {
        return Err(FgsmError::ShapeMismatch(format!(
            "{} images but {} label rows",
            batch_size,
            labels.nrows()
        )));
    }
    config.clip.validate()?;
    epsilon.validate(batch_size)?;
    if config.validate_input_range {
        check_range(images, &config.clip)?;
    }

    let epsilon_max = epsilon.max();
    let threshold = config.warn_epsilon_threshold();
    if epsilon_max > threshold {
        warn!(
            epsilon = epsilon_max,
            threshold, "epsilon is large relative to the clip range"
        );
    }

    // Forward pass with the input watched
    let mut tape = Tape::new();
    let input = tape.watch(images.clone().into_dyn());
    let targets = tape.constant(labels.clone().into_dyn());
    let prediction = model.forward(&mut tape, input)?;

    let prediction_shape = tape.value(prediction)?.shape();
    if prediction_shape != labels.shape() {
        return Err(FgsmError::ShapeMismatch(format!(
            "model output {:?} is incompatible with labels {:?}",
            prediction_shape,
            labels.shape()
        )));
    }

    let loss = loss_fn.loss(&mut tape, targets, prediction)?;
    let loss_value = tape
        .value(loss)?
        .iter()
        .next()
        .copied()
        .unwrap_or(f32::NAN);
    trace!(nodes = tape.len(), loss = loss_value, "forward pass recorded");

    // Backward pass: d loss / d images
    let gradient = tape.backward(loss)?.take(input).ok_or_else(|| {
        FgsmError::NonDifferentiableModel(
            "loss does not depend on the input image batch".to_string(),
        )
    })?;
    let gradient = gradient.into_dimensionality::<Ix4>()?;
    if let Some(bad) = gradient.iter().find(|g| !g.is_finite()) {
        return Err(FgsmError::NonDifferentiableModel(format!(
            "gradient contains non-finite value {}",
            bad
        )));
    }

    let direction = signed(&gradient);
    let zero_gradient = direction.iter().filter(|&&s| s == 0.0).count();
    if zero_gradient == direction.len() {
        warn!("gradient is zero everywhere, batch is returned unperturbed");
    }

    let (adversarial, clipped) = apply_signed_step(images, &direction, epsilon, config.clip);
    debug!(
        batch_size,
        epsilon = epsilon_max,
        loss = loss_value,
        zero_gradient,
        clipped,
        "fgsm step applied"
    );

    Ok(Outcome {
        adversarial,
        loss: loss_value,
        zero_gradient,
        clipped,
    })
}

/// `clip(images + epsilon * direction)` into a new allocation, one example
/// per rayon task. Returns the batch and the number of clipped elements.
fn apply_signed_step(
    images: &Array4<f32>,
    direction: &Array4<f32>,
    epsilon: &Epsilon,
    clip: ClipRange,
) -> (Array4<f32>, usize) {
    let mut adversarial = images.to_owned();
    let clipped = adversarial
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(direction.axis_iter(Axis(0)).into_par_iter())
        .enumerate()
        .map(|(i, (mut example, step))| {
            let eps = epsilon.for_example(i);
            let mut clipped = 0usize;
            Zip::from(&mut example).and(&step).for_each(|x, &s| {
                let raw = *x + eps * s;
                let bounded = clip.apply(raw);
                if bounded != raw {
                    clipped += 1;
                }
                *x = bounded;
            });
            clipped
        })
        .sum::<usize>();
    (adversarial, clipped)
}
