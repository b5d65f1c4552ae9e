//! Forward operations recorded on a [`Tape`].
//!
//! Elementwise binary operations require operands of identical shape; the
//! only broadcasting operation is [`Tape::add_bias`], which adds a vector to
//! every row of a matrix.

use ndarray::{concatenate, ArrayD, Axis, IxDyn};

use super::tape::{matrix, scalar, Op, Tape, Var};
use crate::error::FgsmError;

impl Tape {
    fn unary(&mut self, op: Op, input: Var, value: ArrayD<f32>) -> Var {
        let tracked = self.is_tracked(input);
        self.push(op, value, tracked)
    }

    fn binary(&mut self, op: Op, a: Var, b: Var, value: ArrayD<f32>) -> Var {
        let tracked = self.is_tracked(a) || self.is_tracked(b);
        self.push(op, value, tracked)
    }

    fn same_shape(&self, a: Var, b: Var, what: &str) -> Result<(), FgsmError> {
        let lhs = self.value(a)?.shape();
        let rhs = self.value(b)?.shape();
        if lhs != rhs {
            return Err(FgsmError::ShapeMismatch(format!(
                "{} operands differ: {:?} vs {:?}",
                what, lhs, rhs
            )));
        }
        Ok(())
    }

    fn last_axis(&self, input: Var, what: &str) -> Result<Axis, FgsmError> {
        let ndim = self.value(input)?.ndim();
        if ndim == 0 {
            return Err(FgsmError::ShapeMismatch(format!(
                "{} requires at least one axis",
                what
            )));
        }
        Ok(Axis(ndim - 1))
    }

    /// Elementwise `a + b`.
    pub fn add(&mut self, a: Var, b: Var) -> Result<Var, FgsmError> {
        self.same_shape(a, b, "add")?;
        let value = self.value(a)? + self.value(b)?;
        Ok(self.binary(Op::Add(a, b), a, b, value))
    }

    /// Elementwise `a - b`.
    pub fn sub(&mut self, a: Var, b: Var) -> Result<Var, FgsmError> {
        self.same_shape(a, b, "sub")?;
        let value = self.value(a)? - self.value(b)?;
        Ok(self.binary(Op::Sub(a, b), a, b, value))
    }

    /// Elementwise `a * b`.
    pub fn mul(&mut self, a: Var, b: Var) -> Result<Var, FgsmError> {
        self.same_shape(a, b, "mul")?;
        let value = self.value(a)? * self.value(b)?;
        Ok(self.binary(Op::Mul(a, b), a, b, value))
    }

    /// Multiply every element by a constant.
    pub fn scale(&mut self, input: Var, k: f32) -> Result<Var, FgsmError> {
        let value = self.value(input)?.mapv(|x| x * k);
        Ok(self.unary(Op::Scale(input, k), input, value))
    }

    /// Add a constant to every element.
    pub fn add_scalar(&mut self, input: Var, c: f32) -> Result<Var, FgsmError> {
        let value = self.value(input)?.mapv(|x| x + c);
        Ok(self.unary(Op::AddScalar(input), input, value))
    }

    /// Matrix product of two 2-D values.
    pub fn matmul(&mut self, a: Var, b: Var) -> Result<Var, FgsmError> {
        let lhs = matrix(self.value(a)?)?;
        let rhs = matrix(self.value(b)?)?;
        if lhs.ncols() != rhs.nrows() {
            return Err(FgsmError::ShapeMismatch(format!(
                "matmul inner dimensions differ: {:?} x {:?}",
                lhs.shape(),
                rhs.shape()
            )));
        }
        let value = lhs.dot(&rhs).into_dyn();
        Ok(self.binary(Op::MatMul(a, b), a, b, value))
    }

    /// Add a 1-D `bias` to every row of the 2-D `input`.
    pub fn add_bias(&mut self, input: Var, bias: Var) -> Result<Var, FgsmError> {
        let x = matrix(self.value(input)?)?;
        let b = self.value(bias)?;
        if b.ndim() != 1 || b.len() != x.ncols() {
            return Err(FgsmError::ShapeMismatch(format!(
                "bias of shape {:?} does not match {} columns",
                b.shape(),
                x.ncols()
            )));
        }
        let value = (&x.into_dyn() + b).into_dyn();
        Ok(self.binary(Op::AddBias(input, bias), input, bias, value))
    }

    /// Join two matrices with the same number of rows side by side.
    pub fn concat_columns(&mut self, a: Var, b: Var) -> Result<Var, FgsmError> {
        let lhs = matrix(self.value(a)?)?;
        let rhs = matrix(self.value(b)?)?;
        if lhs.nrows() != rhs.nrows() {
            return Err(FgsmError::ShapeMismatch(format!(
                "concat_columns row counts differ: {} vs {}",
                lhs.nrows(),
                rhs.nrows()
            )));
        }
        let value = concatenate(Axis(1), &[lhs, rhs])?.into_dyn();
        Ok(self.binary(Op::ConcatColumns(a, b), a, b, value))
    }

    /// Rectified linear unit.
    pub fn relu(&mut self, input: Var) -> Result<Var, FgsmError> {
        let value = self.value(input)?.mapv(|x| x.max(0.0));
        Ok(self.unary(Op::Relu(input), input, value))
    }

    /// Logistic sigmoid.
    pub fn sigmoid(&mut self, input: Var) -> Result<Var, FgsmError> {
        let value = self.value(input)?.mapv(|x| 1.0 / (1.0 + (-x).exp()));
        Ok(self.unary(Op::Sigmoid(input), input, value))
    }

    /// Hyperbolic tangent.
    pub fn tanh(&mut self, input: Var) -> Result<Var, FgsmError> {
        let value = self.value(input)?.mapv(f32::tanh);
        Ok(self.unary(Op::Tanh(input), input, value))
    }

    /// Elementwise exponential.
    pub fn exp(&mut self, input: Var) -> Result<Var, FgsmError> {
        let value = self.value(input)?.mapv(f32::exp);
        Ok(self.unary(Op::Exp(input), input, value))
    }

    /// Elementwise natural logarithm.
    pub fn log(&mut self, input: Var) -> Result<Var, FgsmError> {
        let value = self.value(input)?.mapv(f32::ln);
        Ok(self.unary(Op::Log(input), input, value))
    }

    /// Clamp into `[min, max]`; gradient flows only where the input is inside.
    pub fn clamp(&mut self, input: Var, min: f32, max: f32) -> Result<Var, FgsmError> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(FgsmError::InvalidClipRange {
                lower: min,
                upper: max,
            });
        }
        let value = self.value(input)?.mapv(|x| x.clamp(min, max));
        Ok(self.unary(Op::Clamp { input, min, max }, input, value))
    }

    /// Softmax along the last axis.
    pub fn softmax(&mut self, input: Var) -> Result<Var, FgsmError> {
        let axis = self.last_axis(input, "softmax")?;
        let mut value = self.value(input)?.clone();
        for mut row in value.lanes_mut(axis) {
            let max = row.fold(f32::NEG_INFINITY, |m, &x| m.max(x));
            row.mapv_inplace(|x| (x - max).exp());
            let total = row.sum();
            row.mapv_inplace(|x| x / total);
        }
        Ok(self.unary(Op::Softmax(input), input, value))
    }

    /// Log-softmax along the last axis.
    pub fn log_softmax(&mut self, input: Var) -> Result<Var, FgsmError> {
        let axis = self.last_axis(input, "log_softmax")?;
        let mut value = self.value(input)?.clone();
        for mut row in value.lanes_mut(axis) {
            let max = row.fold(f32::NEG_INFINITY, |m, &x| m.max(x));
            let log_total = row.iter().map(|&x| (x - max).exp()).sum::<f32>().ln() + max;
            row.mapv_inplace(|x| x - log_total);
        }
        Ok(self.unary(Op::LogSoftmax(input), input, value))
    }

    /// Reinterpret the value with a new shape of equal length.
    pub fn reshape(&mut self, input: Var, shape: &[usize]) -> Result<Var, FgsmError> {
        let current = self.value(input)?;
        let len: usize = shape.iter().product();
        if len != current.len() {
            return Err(FgsmError::ShapeMismatch(format!(
                "cannot reshape {:?} into {:?}",
                current.shape(),
                shape
            )));
        }
        let value = current
            .as_standard_layout()
            .into_owned()
            .into_shape(IxDyn(shape))?;
        Ok(self.unary(Op::Reshape(input), input, value))
    }

    /// Collapse every axis after the first: `(N, ...) -> (N, prod(...))`.
    pub fn flatten(&mut self, input: Var) -> Result<Var, FgsmError> {
        let shape = self.value(input)?.shape().to_vec();
        let rows = shape.first().copied().ok_or_else(|| {
            FgsmError::ShapeMismatch("cannot flatten a scalar".to_string())
        })?;
        let cols: usize = shape[1..].iter().product();
        self.reshape(input, &[rows, cols])
    }

    /// Sum along the last axis, dropping it.
    pub fn sum_last_axis(&mut self, input: Var) -> Result<Var, FgsmError> {
        let axis = self.last_axis(input, "sum_last_axis")?;
        let value = self.value(input)?.sum_axis(axis);
        Ok(self.unary(Op::SumLastAxis(input), input, value))
    }

    /// Mean of every element, as a scalar.
    pub fn mean(&mut self, input: Var) -> Result<Var, FgsmError> {
        let x = self.value(input)?;
        if x.is_empty() {
            return Err(FgsmError::ShapeMismatch(
                "mean of an empty value".to_string(),
            ));
        }
        let value = scalar(x.sum() / x.len() as f32);
        Ok(self.unary(Op::Mean(input), input, value))
    }

    /// Copy a value while cutting it off from the gradient.
    pub fn stop_gradient(&mut self, input: Var) -> Result<Var, FgsmError> {
        let value = self.value(input)?.clone();
        Ok(self.push(Op::StopGradient, value, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_elementwise_shape_mismatch() {
        let mut tape = Tape::new();
        let a = tape.constant(arr1(&[1.0, 2.0]).into_dyn());
        let b = tape.constant(arr1(&[1.0]).into_dyn());
        assert!(matches!(tape.add(a, b), Err(FgsmError::ShapeMismatch(_))));
        assert!(tape.mul(a, b).is_err());
        assert!(tape.sub(a, b).is_err());
    }

    #[test]
    fn test_matmul_inner_mismatch() {
        let mut tape = Tape::new();
        let a = tape.constant(arr2(&[[1.0, 2.0]]).into_dyn());
        let b = tape.constant(arr2(&[[1.0, 2.0]]).into_dyn());
        assert!(tape.matmul(a, b).is_err());
    }

    #[test]
    fn test_add_bias_broadcasts_rows() {
        let mut tape = Tape::new();
        let x = tape.constant(arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn());
        let b = tape.constant(arr1(&[10.0, 20.0]).into_dyn());
        let y = tape.add_bias(x, b).unwrap();
        let v = tape.value(y).unwrap();
        assert_eq!(v[[1, 0]], 13.0);
        assert_eq!(v[[0, 1]], 22.0);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let mut tape = Tape::new();
        let x = tape.constant(arr2(&[[1.0, 2.0, 3.0], [1000.0, 0.0, -1000.0]]).into_dyn());
        let p = tape.softmax(x).unwrap();
        let v = tape.value(p).unwrap();
        for row in v.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-6);
        }
        assert!((v[[1, 0]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_log_softmax_matches_log_of_softmax() {
        let mut tape = Tape::new();
        let x = tape.constant(arr2(&[[0.1, -0.4, 2.0]]).into_dyn());
        let p = tape.softmax(x).unwrap();
        let ls = tape.log_softmax(x).unwrap();
        let p = tape.value(p).unwrap().clone();
        let ls = tape.value(ls).unwrap();
        for (a, b) in p.iter().zip(ls.iter()) {
            assert!((a.ln() - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_concat_columns_splits_gradient() {
        let mut tape = Tape::new();
        let a = tape.watch(arr2(&[[1.0], [2.0]]).into_dyn());
        let b = tape.watch(arr2(&[[3.0, 4.0], [5.0, 6.0]]).into_dyn());
        let joined = tape.concat_columns(a, b).unwrap();
        assert_eq!(tape.value(joined).unwrap().shape(), &[2, 3]);
        let w = tape.constant(arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).into_dyn());
        let weighted = tape.mul(joined, w).unwrap();
        let loss = tape.mean(weighted).unwrap();
        let grads = tape.backward(loss).unwrap();
        let ga = grads.wrt(a).unwrap();
        let gb = grads.wrt(b).unwrap();
        assert!((ga[[1, 0]] - 4.0 / 6.0).abs() < 1e-6);
        assert!((gb[[0, 1]] - 3.0 / 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_reshape_length_mismatch() {
        let mut tape = Tape::new();
        let x = tape.constant(arr1(&[1.0, 2.0, 3.0]).into_dyn());
        assert!(tape.reshape(x, &[2, 2]).is_err());
    }

    #[test]
    fn test_sum_last_axis_and_mean() {
        let mut tape = Tape::new();
        let x = tape.constant(arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn());
        let s = tape.sum_last_axis(x).unwrap();
        assert_eq!(tape.value(s).unwrap().shape(), &[2]);
        let m = tape.mean(s).unwrap();
        assert_eq!(tape.value(m).unwrap().ndim(), 0);
        assert!((tape.value(m).unwrap().sum() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_tracking_propagates_through_ops() {
        let mut tape = Tape::new();
        let x = tape.watch(arr1(&[1.0]).into_dyn());
        let c = tape.constant(arr1(&[2.0]).into_dyn());
        let y = tape.mul(x, c).unwrap();
        let z = tape.relu(c).unwrap();
        assert!(tape.is_tracked(y));
        assert!(!tape.is_tracked(z));
    }

    #[test]
    fn test_activation_gradients() {
        let mut tape = Tape::new();
        let x = tape.watch(arr1(&[0.0]).into_dyn());
        let s = tape.sigmoid(x).unwrap();
        let t = tape.tanh(x).unwrap();
        let sum = tape.add(s, t).unwrap();
        let loss = tape.mean(sum).unwrap();
        let grads = tape.backward(loss).unwrap();
        // sigmoid'(0) = 0.25, tanh'(0) = 1
        assert!((grads.wrt(x).unwrap()[[0]] - 1.25).abs() < 1e-6);
    }
}
