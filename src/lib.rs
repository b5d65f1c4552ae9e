//! # fgsm-rs: Fast Gradient Sign Method for ndarray image batches
//!
//! Generates adversarial examples in a single gradient step:
//! every pixel moves by `epsilon` in the direction that increases the
//! classifier's loss, and the result is clipped back into the valid range.
//!
//! ## Attack API
//!
//! - [`fgsm()`] - One step with default settings (`[0, 1]` pixels, cross-entropy)
//! - [`PerturbationGenerator`] - Configurable generator, optionally returning a
//!   [`PerturbationReport`]
//!
//! ## Models
//!
//! The attack needs the gradient of the loss with respect to the input, so
//! models record their forward pass on an [`autodiff::Tape`]. Implement
//! [`DifferentiableModel`] directly, wrap a closure in [`FnModel`], or load a
//! [`Sequential`] stack of dense layers from JSON.

#![deny(missing_docs)]

pub mod attacks;
pub mod autodiff;
pub mod error;
pub mod loss;
pub mod math;
pub mod models;
pub mod verification;

// Re-exports
pub use attacks::fgsm::fgsm;
pub use attacks::PerturbationGenerator;
pub use attacks::{ClipRange, Epsilon, FgsmConfig};
pub use autodiff::{Gradients, Tape, Var};
pub use error::FgsmError;
pub use loss::{CategoricalCrossentropy, Loss};
pub use models::{DifferentiableModel, FnModel, Layer, Linear, Sequential};
pub use verification::PerturbationReport;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Python bindings via PyO3
#[cfg(feature = "python")]
mod python {
    use numpy::{IntoPyArray, PyArray2, PyArray4, PyReadonlyArray1, PyReadonlyArray2, PyReadonlyArray4};
    use pyo3::prelude::*;

    use crate::{ClipRange, DifferentiableModel, FgsmConfig, FgsmError, PerturbationGenerator, Sequential};

    fn fgsm_err(e: FgsmError) -> PyErr {
        PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{}", e))
    }

    #[pyclass(name = "Classifier")]
    struct PyClassifier {
        inner: Sequential,
    }

    #[pymethods]
    impl PyClassifier {
        #[new]
        fn new(weight: PyReadonlyArray2<'_, f32>, bias: PyReadonlyArray1<'_, f32>) -> PyResult<Self> {
            let inner = Sequential::softmax_classifier(
                weight.as_array().to_owned(),
                bias.as_array().to_owned(),
            )
            .map_err(fgsm_err)?;
            Ok(Self { inner })
        }

        #[staticmethod]
        fn from_json(json: &str) -> PyResult<Self> {
            let inner = Sequential::from_json(json).map_err(fgsm_err)?;
            Ok(Self { inner })
        }

        fn to_json(&self) -> PyResult<String> {
            self.inner.to_json().map_err(fgsm_err)
        }

        fn predict<'py>(
            &self,
            py: Python<'py>,
            images: PyReadonlyArray4<'py, f32>,
        ) -> PyResult<&'py PyArray2<f32>> {
            let probs = self.inner.predict(images.as_array()).map_err(fgsm_err)?;
            Ok(probs.into_pyarray(py))
        }

        #[pyo3(signature = (images, labels, epsilon, clip_min = 0.0, clip_max = 1.0))]
        fn fgsm<'py>(
            &self,
            py: Python<'py>,
            images: PyReadonlyArray4<'py, f32>,
            labels: PyReadonlyArray2<'py, f32>,
            epsilon: f32,
            clip_min: f32,
            clip_max: f32,
        ) -> PyResult<&'py PyArray4<f32>> {
            let clip = ClipRange::new(clip_min, clip_max).map_err(fgsm_err)?;
            let generator = PerturbationGenerator::new(FgsmConfig::default().with_clip(clip));
            let adversarial = generator
                .generate(
                    &self.inner,
                    &images.as_array().to_owned(),
                    &labels.as_array().to_owned(),
                    epsilon,
                )
                .map_err(fgsm_err)?;
            Ok(adversarial.into_pyarray(py))
        }
    }

    #[pymodule]
    #[pyo3(name = "fgsm")]
    fn fgsm_module(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_class::<PyClassifier>()?;
        m.add("__version__", crate::VERSION)?;
        Ok(())
    }
}
