//! Per-call perturbation report.
//!
//! Summarizes what a single attack did to a batch, for logging and
//! post-hoc analysis. A report is returned to the caller; the generator
//! keeps no history.

use serde::{Deserialize, Serialize};

/// Statistics of one adversarial batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerturbationReport {
    /// Number of examples in the batch.
    pub batch_size: usize,
    /// Elements per example (`H * W * C`).
    pub example_len: usize,
    /// Loss function used (as string).
    pub loss_name: String,
    /// Loss at the clean input.
    pub loss: f32,
    /// Largest epsilon applied.
    pub epsilon_max: f32,
    /// Fraction of elements whose gradient was exactly zero.
    pub zero_gradient_fraction: f32,
    /// Fraction of elements that were clipped into range.
    pub clipped_fraction: f32,
    /// L∞ norm of `adversarial - images`.
    pub linf_norm: f32,
    /// L2 norm of `adversarial - images` over the whole batch.
    pub l2_norm: f32,
}

impl PerturbationReport {
    /// Serialize the report to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Whether the attack left the batch unchanged.
    pub fn is_noop(&self) -> bool {
        self.linf_norm == 0.0
    }
}
