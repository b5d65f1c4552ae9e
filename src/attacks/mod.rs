//! Adversarial perturbation generation.
//!
//! - [`fgsm()`] - one Fast Gradient Sign step with default settings
//! - [`PerturbationGenerator`] - configurable generator with an optional report
//! - [`config`] - [`FgsmConfig`], [`ClipRange`] and [`Epsilon`]

pub mod config;
pub mod fgsm;

pub use config::{ClipRange, Epsilon, FgsmConfig};
pub use fgsm::fgsm;

use ndarray::{Array2, Array4, Axis};

use crate::error::FgsmError;
use crate::loss::{CategoricalCrossentropy, Loss};
use crate::math::norms::{l2_norm, linf_norm};
use crate::models::DifferentiableModel;
use crate::verification::PerturbationReport;

/// Single-step adversarial batch generator.
///
/// Holds only immutable settings: every call builds its own tape and
/// returns a fresh allocation, so one generator can be shared across
/// threads.
///
/// # Example
///
/// ```rust
/// use fgsm::{FgsmConfig, PerturbationGenerator, Sequential};
/// use ndarray::{array, Array1, Array2, Array4};
///
/// let model = Sequential::softmax_classifier(
///     Array2::from_shape_fn((4, 2), |(i, j)| (i as f32 + 1.0) * if j == 0 { 1.0 } else { -1.0 }),
///     Array1::zeros(2),
/// )
/// .unwrap();
///
/// let generator = PerturbationGenerator::new(FgsmConfig::default());
/// let images = Array4::from_elem((1, 2, 2, 1), 0.5);
/// let labels = array![[1.0, 0.0]];
///
/// let (adversarial, report) = generator
///     .generate_with_report(&model, &images, &labels, 0.05f32)
///     .unwrap();
/// assert!((report.linf_norm - 0.05).abs() < 1e-6);
/// assert_eq!(adversarial.dim(), (1, 2, 2, 1));
/// ```
#[derive(Clone, Debug)]
pub struct PerturbationGenerator<L = CategoricalCrossentropy> {
    config: FgsmConfig,
    loss: L,
}

impl Default for PerturbationGenerator {
    fn default() -> Self {
        Self::new(FgsmConfig::default())
    }
}

impl PerturbationGenerator {
    /// Create a generator using categorical cross-entropy.
    pub fn new(config: FgsmConfig) -> Self {
        Self {
            config,
            loss: CategoricalCrossentropy::default(),
        }
    }
}

impl<L: Loss> PerturbationGenerator<L> {
    /// Create a generator with a custom loss.
    pub fn with_loss(config: FgsmConfig, loss: L) -> Self {
        Self { config, loss }
    }

    /// Current settings.
    pub fn config(&self) -> &FgsmConfig {
        &self.config
    }

    /// Loss being maximized.
    pub fn loss(&self) -> &L {
        &self.loss
    }

    /// Produce an adversarial batch in a single gradient step.
    ///
    /// # Arguments
    ///
    /// * `model` - Differentiable classifier producing `(N, num_classes)` rows
    /// * `images` - Clean batch `(N, H, W, C)` inside the configured clip range
    /// * `labels` - Label distributions `(N, num_classes)`, row-aligned with `images`
    /// * `epsilon` - Non-negative budget, scalar or one per example
    ///
    /// # Errors
    ///
    /// * [`FgsmError::ShapeMismatch`] - batch sizes or model output disagree with `labels`
    /// * [`FgsmError::NonDifferentiableModel`] - the loss has no gradient with respect to `images`
    /// * [`FgsmError::InvalidRange`] - input outside the clip range, when validation is enabled
    pub fn generate<M>(
        &self,
        model: &M,
        images: &Array4<f32>,
        labels: &Array2<f32>,
        epsilon: impl Into<Epsilon>,
    ) -> Result<Array4<f32>, FgsmError>
    where
        M: DifferentiableModel + ?Sized,
    {
        let epsilon = epsilon.into();
        fgsm::run(model, &self.loss, &self.config, images, labels, &epsilon)
            .map(|outcome| outcome.adversarial)
    }

    /// Same as [`generate`](Self::generate), also returning statistics of the step.
    pub fn generate_with_report<M>(
        &self,
        model: &M,
        images: &Array4<f32>,
        labels: &Array2<f32>,
        epsilon: impl Into<Epsilon>,
    ) -> Result<(Array4<f32>, PerturbationReport), FgsmError>
    where
        M: DifferentiableModel + ?Sized,
    {
        let epsilon = epsilon.into();
        let outcome = fgsm::run(model, &self.loss, &self.config, images, labels, &epsilon)?;

        let delta = &outcome.adversarial - images;
        let total = images.len() as f32;
        let batch_size = images.len_of(Axis(0));

        let report = PerturbationReport {
            batch_size,
            example_len: images.len() / batch_size,
            loss_name: self.loss.name().to_string(),
            loss: outcome.loss,
            epsilon_max: epsilon.max(),
            zero_gradient_fraction: fraction(outcome.zero_gradient, total),
            clipped_fraction: fraction(outcome.clipped, total),
            linf_norm: linf_norm(&delta),
            l2_norm: l2_norm(&delta),
        };
        Ok((outcome.adversarial, report))
    }
}

/// `count / total`, or `0.0` for batches with no elements.
fn fraction(count: usize, total: f32) -> f32 {
    if total == 0.0 {
        0.0
    } else {
        count as f32 / total
    }
}
