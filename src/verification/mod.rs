//! Verification primitives for adversarial batches.
//!
//! Provides practical checks around a single attack call:
//!
//! - [`range`] - Validate that pixel values lie inside the clip range
//! - [`perturbation_bound`] - Confirm each example moved by at most epsilon
//! - [`report`] - Serializable per-call statistics

pub mod perturbation_bound;
pub mod range;
pub mod report;

pub use perturbation_bound::{check_perturbation_bound, filter_within_bound};
pub use range::{check_range, filter_in_range};
pub use report::PerturbationReport;
