//! Wengert-list tape and its reverse pass.
//!
//! Every forward operation appends a node holding its output value and the
//! handles of its operands. [`Tape::backward`] walks the list in reverse
//! insertion order and applies the chain rule, which is a valid topological
//! order because operands are always recorded before their consumers.

use ndarray::{s, ArrayD, ArrayView2, Axis, Ix2, IxDyn, Zip};
use tracing::trace;

use crate::error::FgsmError;

/// Handle to a value recorded on a [`Tape`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Var(pub(crate) usize);

impl Var {
    /// Position of the node on its tape.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Operation that produced a node.
#[derive(Clone, Debug)]
pub(crate) enum Op {
    Watch,
    Constant,
    Add(Var, Var),
    Sub(Var, Var),
    Mul(Var, Var),
    Scale(Var, f32),
    AddScalar(Var),
    MatMul(Var, Var),
    AddBias(Var, Var),
    ConcatColumns(Var, Var),
    Relu(Var),
    Sigmoid(Var),
    Tanh(Var),
    Exp(Var),
    Log(Var),
    Clamp { input: Var, min: f32, max: f32 },
    Softmax(Var),
    LogSoftmax(Var),
    Reshape(Var),
    SumLastAxis(Var),
    Mean(Var),
    StopGradient,
}

#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) op: Op,
    pub(crate) value: ArrayD<f32>,
    /// Whether the node depends on a watched leaf.
    pub(crate) tracked: bool,
}

/// Reverse-mode differentiation context.
///
/// Values registered with [`Tape::watch`] are the variables of interest;
/// gradients are only propagated through nodes that depend on one of them.
/// A tape is built for a single forward pass and discarded afterwards.
#[derive(Clone, Debug, Default)]
pub struct Tape {
    pub(crate) nodes: Vec<Node>,
}

impl Tape {
    /// Create a new, empty tape.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Number of recorded nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Record a value whose gradient should be tracked.
    pub fn watch(&mut self, value: ArrayD<f32>) -> Var {
        self.push(Op::Watch, value, true)
    }

    /// Record a value that is not differentiated (weights, labels, ...).
    pub fn constant(&mut self, value: ArrayD<f32>) -> Var {
        self.push(Op::Constant, value, false)
    }

    /// Value of a recorded variable.
    pub fn value(&self, var: Var) -> Result<&ArrayD<f32>, FgsmError> {
        self.node(var).map(|n| &n.value)
    }

    /// Whether a variable depends on a watched leaf.
    pub fn is_tracked(&self, var: Var) -> bool {
        self.nodes.get(var.0).map(|n| n.tracked).unwrap_or(false)
    }

    pub(crate) fn node(&self, var: Var) -> Result<&Node, FgsmError> {
        self.nodes.get(var.0).ok_or_else(|| {
            FgsmError::ShapeMismatch(format!(
                "variable {} is not recorded on this tape ({} nodes)",
                var.0,
                self.nodes.len()
            ))
        })
    }

    pub(crate) fn push(&mut self, op: Op, value: ArrayD<f32>, tracked: bool) -> Var {
        let id = self.nodes.len();
        self.nodes.push(Node { op, value, tracked });
        Var(id)
    }

    /// Compute gradients of a scalar `output` with respect to every tracked node.
    pub fn backward(&self, output: Var) -> Result<Gradients, FgsmError> {
        let out = self.node(output)?;
        if out.value.len() != 1 {
            return Err(FgsmError::ShapeMismatch(format!(
                "backward requires a scalar output, got shape {:?}",
                out.value.shape()
            )));
        }

        let mut grads: Vec<Option<ArrayD<f32>>> = vec![None; output.0 + 1];
        grads[output.0] = Some(ArrayD::ones(out.value.raw_dim()));

        for id in (0..=output.0).rev() {
            let node = &self.nodes[id];
            if !node.tracked {
                continue;
            }
            let grad = match grads[id].take() {
                Some(g) => g,
                None => continue,
            };
            trace!(node = id, op = ?node.op, "backward");
            self.propagate(node, &grad, &mut grads)?;
            grads[id] = Some(grad);
        }

        Ok(Gradients { grads })
    }

    fn accumulate(&self, grads: &mut [Option<ArrayD<f32>>], var: Var, contribution: ArrayD<f32>) {
        if !self.is_tracked(var) {
            return;
        }
        match &mut grads[var.0] {
            Some(existing) => *existing += &contribution,
            slot => *slot = Some(contribution),
        }
    }

    fn propagate(
        &self,
        node: &Node,
        grad: &ArrayD<f32>,
        grads: &mut [Option<ArrayD<f32>>],
    ) -> Result<(), FgsmError> {
        match node.op {
            Op::Watch | Op::Constant | Op::StopGradient => {}
            Op::Add(a, b) => {
                self.accumulate(grads, a, grad.clone());
                self.accumulate(grads, b, grad.clone());
            }
            Op::Sub(a, b) => {
                self.accumulate(grads, a, grad.clone());
                self.accumulate(grads, b, grad.mapv(|g| -g));
            }
            Op::Mul(a, b) => {
                let av = &self.node(a)?.value;
                let bv = &self.node(b)?.value;
                self.accumulate(grads, a, grad * bv);
                self.accumulate(grads, b, grad * av);
            }
            Op::Scale(a, k) => self.accumulate(grads, a, grad.mapv(|g| g * k)),
            Op::AddScalar(a) => self.accumulate(grads, a, grad.clone()),
            Op::MatMul(a, b) => {
                let lhs = matrix(&self.node(a)?.value)?;
                let rhs = matrix(&self.node(b)?.value)?;
                let g = matrix(grad)?;
                self.accumulate(grads, a, g.dot(&rhs.t()).into_dyn());
                self.accumulate(grads, b, lhs.t().dot(&g).into_dyn());
            }
            Op::AddBias(x, bias) => {
                self.accumulate(grads, x, grad.clone());
                self.accumulate(grads, bias, grad.sum_axis(Axis(0)));
            }
            Op::ConcatColumns(a, b) => {
                let split = matrix(&self.node(a)?.value)?.ncols();
                let g = matrix(grad)?;
                self.accumulate(grads, a, g.slice(s![.., ..split]).to_owned().into_dyn());
                self.accumulate(grads, b, g.slice(s![.., split..]).to_owned().into_dyn());
            }
            Op::Relu(a) => {
                let x = &self.node(a)?.value;
                let local = Zip::from(grad)
                    .and(x)
                    .map_collect(|&g, &x| if x > 0.0 { g } else { 0.0 });
                self.accumulate(grads, a, local);
            }
            Op::Sigmoid(a) => {
                let local = Zip::from(grad)
                    .and(&node.value)
                    .map_collect(|&g, &y| g * y * (1.0 - y));
                self.accumulate(grads, a, local);
            }
            Op::Tanh(a) => {
                let local = Zip::from(grad)
                    .and(&node.value)
                    .map_collect(|&g, &y| g * (1.0 - y * y));
                self.accumulate(grads, a, local);
            }
            Op::Exp(a) => self.accumulate(grads, a, grad * &node.value),
            Op::Log(a) => {
                let x = &self.node(a)?.value;
                self.accumulate(grads, a, grad / x);
            }
            Op::Clamp { input, min, max } => {
                let x = &self.node(input)?.value;
                let local = Zip::from(grad).and(x).map_collect(|&g, &x| {
                    if (min..=max).contains(&x) {
                        g
                    } else {
                        0.0
                    }
                });
                self.accumulate(grads, input, local);
            }
            Op::Softmax(a) => {
                let y = &node.value;
                let dot = sum_last_keepdims(&(grad * y));
                let local = y * &(grad - &dot);
                self.accumulate(grads, a, local);
            }
            Op::LogSoftmax(a) => {
                let probs = node.value.mapv(f32::exp);
                let total = sum_last_keepdims(grad);
                let local = grad - &(&probs * &total);
                self.accumulate(grads, a, local);
            }
            Op::Reshape(a) => {
                let shape = self.node(a)?.value.raw_dim();
                let local = grad.as_standard_layout().into_owned().into_shape(shape)?;
                self.accumulate(grads, a, local);
            }
            Op::SumLastAxis(a) => {
                let x = &self.node(a)?.value;
                let last = Axis(x.ndim() - 1);
                let local = grad
                    .view()
                    .insert_axis(last)
                    .broadcast(x.raw_dim())
                    .ok_or_else(|| {
                        FgsmError::ShapeMismatch(format!(
                            "cannot broadcast gradient {:?} to {:?}",
                            grad.shape(),
                            x.shape()
                        ))
                    })?
                    .to_owned();
                self.accumulate(grads, a, local);
            }
            Op::Mean(a) => {
                let x = &self.node(a)?.value;
                let g = grad.iter().next().copied().unwrap_or(0.0);
                let local = ArrayD::from_elem(x.raw_dim(), g / x.len() as f32);
                self.accumulate(grads, a, local);
            }
        }
        Ok(())
    }
}

/// Gradients produced by [`Tape::backward`].
#[derive(Clone, Debug)]
pub struct Gradients {
    grads: Vec<Option<ArrayD<f32>>>,
}

impl Gradients {
    /// Gradient of the output with respect to `var`.
    ///
    /// Returns `None` when the output does not depend on `var`.
    pub fn wrt(&self, var: Var) -> Option<&ArrayD<f32>> {
        self.grads.get(var.0).and_then(|g| g.as_ref())
    }

    /// Take ownership of the gradient for `var`.
    pub fn take(mut self, var: Var) -> Option<ArrayD<f32>> {
        self.grads.get_mut(var.0).and_then(|g| g.take())
    }
}

pub(crate) fn matrix(value: &ArrayD<f32>) -> Result<ArrayView2<'_, f32>, FgsmError> {
    value.view().into_dimensionality::<Ix2>().map_err(|_| {
        FgsmError::ShapeMismatch(format!("expected a 2-D matrix, got shape {:?}", value.shape()))
    })
}

pub(crate) fn sum_last_keepdims(value: &ArrayD<f32>) -> ArrayD<f32> {
    let last = Axis(value.ndim().saturating_sub(1));
    value.sum_axis(last).insert_axis(last)
}

pub(crate) fn scalar(value: f32) -> ArrayD<f32> {
    ArrayD::from_elem(IxDyn(&[]), value)
}
