//! Feed-forward stack of dense layers.
//!
//! The image batch `(N, H, W, C)` is flattened to `(N, H*W*C)` before the
//! first layer. Layers serialize as `{"type": "linear", ...}` /
//! `{"type": "softmax"}` so trained weights can be shipped as JSON.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::DifferentiableModel;
use crate::autodiff::{Tape, Var};
use crate::error::FgsmError;

/// Dense layer `y = x W + b` with `W` of shape `(in_features, out_features)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Linear {
    /// Weight matrix `(in_features, out_features)`
    pub weight: Array2<f32>,
    /// Bias vector `(out_features)`
    pub bias: Array1<f32>,
}

impl Linear {
    /// Create a layer, checking that the bias matches the output width.
    pub fn new(weight: Array2<f32>, bias: Array1<f32>) -> Result<Self, FgsmError> {
        let layer = Self { weight, bias };
        layer.validate()?;
        Ok(layer)
    }

    /// Input width.
    pub fn in_features(&self) -> usize {
        self.weight.nrows()
    }

    /// Output width.
    pub fn out_features(&self) -> usize {
        self.weight.ncols()
    }

    fn validate(&self) -> Result<(), FgsmError> {
        if self.bias.len() != self.out_features() {
            return Err(FgsmError::ShapeMismatch(format!(
                "bias length {} does not match {} output features",
                self.bias.len(),
                self.out_features()
            )));
        }
        Ok(())
    }

    fn forward(&self, tape: &mut Tape, input: Var) -> Result<Var, FgsmError> {
        let weight = tape.constant(self.weight.clone().into_dyn());
        let bias = tape.constant(self.bias.clone().into_dyn());
        let product = tape.matmul(input, weight)?;
        tape.add_bias(product, bias)
    }
}

/// One stage of a [`Sequential`] model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layer {
    /// Dense layer
    Linear(Linear),
    /// Rectified linear unit
    Relu,
    /// Logistic sigmoid
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
    /// Softmax over the class axis
    Softmax,
}

impl Layer {
    fn forward(&self, tape: &mut Tape, input: Var) -> Result<Var, FgsmError> {
        match self {
            Layer::Linear(linear) => linear.forward(tape, input),
            Layer::Relu => tape.relu(input),
            Layer::Sigmoid => tape.sigmoid(input),
            Layer::Tanh => tape.tanh(input),
            Layer::Softmax => tape.softmax(input),
        }
    }
}

/// Feed-forward classifier made of [`Layer`]s applied in order.
///
/// # Example
///
/// ```rust
/// use fgsm::models::{DifferentiableModel, Sequential};
/// use ndarray::{Array1, Array2, Array4};
///
/// let model = Sequential::softmax_classifier(
///     Array2::from_shape_fn((4, 3), |(i, j)| (i as f32 - j as f32) * 0.1),
///     Array1::zeros(3),
/// )
/// .unwrap();
///
/// let probs = model.predict(Array4::from_elem((2, 2, 2, 1), 0.5).view()).unwrap();
/// assert_eq!(probs.dim(), (2, 3));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Build a model, checking that consecutive dense layers connect.
    pub fn new(layers: Vec<Layer>) -> Result<Self, FgsmError> {
        let model = Self { layers };
        model.validate()?;
        Ok(model)
    }

    /// Single dense layer followed by softmax.
    pub fn softmax_classifier(weight: Array2<f32>, bias: Array1<f32>) -> Result<Self, FgsmError> {
        Self::new(vec![Layer::Linear(Linear::new(weight, bias)?), Layer::Softmax])
    }

    /// The layers in application order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Expected flattened input width (from the first dense layer).
    pub fn in_features(&self) -> Option<usize> {
        self.linears().next().map(Linear::in_features)
    }

    /// Number of output classes (from the last dense layer).
    pub fn num_classes(&self) -> Option<usize> {
        self.linears().last().map(Linear::out_features)
    }

    /// Load a model from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, FgsmError> {
        let model: Sequential = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    /// Serialize the model to JSON.
    pub fn to_json(&self) -> Result<String, FgsmError> {
        Ok(serde_json::to_string(self)?)
    }

    fn linears(&self) -> impl Iterator<Item = &Linear> {
        self.layers.iter().filter_map(|layer| match layer {
            Layer::Linear(linear) => Some(linear),
            _ => None,
        })
    }

    fn validate(&self) -> Result<(), FgsmError> {
        let mut width: Option<usize> = None;
        for linear in self.linears() {
            linear.validate()?;
            if let Some(w) = width {
                if w != linear.in_features() {
                    return Err(FgsmError::ShapeMismatch(format!(
                        "dense layer expects {} inputs but the previous layer produces {}",
                        linear.in_features(),
                        w
                    )));
                }
            }
            width = Some(linear.out_features());
        }
        Ok(())
    }
}

impl DifferentiableModel for Sequential {
    fn forward(&self, tape: &mut Tape, input: Var) -> Result<Var, FgsmError> {
        let flat = tape.flatten(input)?;
        if let Some(expected) = self.in_features() {
            let actual = tape.value(flat)?.shape()[1];
            if actual != expected {
                return Err(FgsmError::ShapeMismatch(format!(
                    "model expects {} features per example, image batch provides {}",
                    expected, actual
                )));
            }
        }
        self.layers
            .iter()
            .try_fold(flat, |x, layer| layer.forward(tape, x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, Array4};

    fn tiny_mlp() -> Sequential {
        Sequential::new(vec![
            Layer::Linear(
                Linear::new(
                    arr2(&[[1.0, -1.0, 0.5], [0.5, 0.5, -0.5]]),
                    arr1(&[0.0, 0.1, 0.0]),
                )
                .unwrap(),
            ),
            Layer::Relu,
            Layer::Linear(Linear::new(arr2(&[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]), arr1(&[0.0, 0.0])).unwrap()),
            Layer::Softmax,
        ])
        .unwrap()
    }

    #[test]
    fn test_linear_bias_mismatch() {
        let result = Linear::new(Array2::zeros((2, 3)), Array1::zeros(2));
        assert!(matches!(result, Err(FgsmError::ShapeMismatch(_))));
    }

    #[test]
    fn test_disconnected_layers_rejected() {
        let result = Sequential::new(vec![
            Layer::Linear(Linear::new(Array2::zeros((4, 3)), Array1::zeros(3)).unwrap()),
            Layer::Linear(Linear::new(Array2::zeros((2, 2)), Array1::zeros(2)).unwrap()),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_mlp_predicts_distributions() {
        let model = tiny_mlp();
        assert_eq!(model.in_features(), Some(2));
        assert_eq!(model.num_classes(), Some(2));
        let images = Array4::from_shape_vec((2, 1, 2, 1), vec![0.1, 0.9, 0.7, 0.3]).unwrap();
        let probs = model.predict(images.view()).unwrap();
        for row in probs.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_input_width_mismatch() {
        let model = tiny_mlp();
        let images = Array4::<f32>::zeros((1, 3, 3, 1));
        assert!(matches!(
            model.predict(images.view()),
            Err(FgsmError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_json_roundtrip() {
        let model = tiny_mlp();
        let json = model.to_json().unwrap();
        assert!(json.contains("\"type\":\"linear\""));
        let restored = Sequential::from_json(&json).unwrap();
        assert_eq!(restored, model);
    }

    #[test]
    fn test_from_json_validates() {
        let json = r#"{"layers":[{"type":"linear","weight":{"v":1,"dim":[1,2],"data":[1.0,2.0]},"bias":{"v":1,"dim":[3],"data":[0.0,0.0,0.0]}}]}"#;
        assert!(Sequential::from_json(json).is_err());
        assert!(matches!(
            Sequential::from_json("{"),
            Err(FgsmError::Serialization(_))
        ));
    }
}
