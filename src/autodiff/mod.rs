//! Reverse-mode automatic differentiation over `ndarray` values.
//!
//! The tape is the explicit differentiation context threaded through
//! [`DifferentiableModel::forward`](crate::models::DifferentiableModel::forward):
//!
//! - [`tape`] - [`Tape`], [`Var`] and the reverse pass producing [`Gradients`]
//! - [`ops`] - forward operations (linear algebra, activations, reductions)

pub mod ops;
pub mod tape;

pub use tape::{Gradients, Tape, Var};
