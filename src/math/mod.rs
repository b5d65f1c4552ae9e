//! Mathematical primitives for fgsm-rs.
//!
//! Provides shared math utilities used by the attack and verification:
//!
//! - [`norms`] - L2 and L∞ norm computations
//! - [`sign`] - elementwise sign with an exact zero

pub mod norms;
pub mod sign;

pub use norms::{l2_norm, l2_norm_sq, linf_distance, linf_norm};
pub use sign::{sign, signed};
