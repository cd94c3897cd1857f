#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The settings of the Levenberg-Marquardt run of the [`BundleAdjuster`](crate::BundleAdjuster).
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BundleAdjusterSettings {
    /// The optimizer gives up after `patience * (parameters + 1)` evaluations.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_patience"))]
    pub patience: usize,
    /// Relative reduction of the cost below which the optimizer has converged.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_ftol"))]
    pub ftol: f64,
    /// Relative change of the parameters below which the optimizer has converged.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_xtol"))]
    pub xtol: f64,
    /// Orthogonality between the residuals and the jacobian columns at convergence.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_gtol"))]
    pub gtol: f64,
}

fn default_patience() -> usize {
    100
}

fn default_ftol() -> f64 {
    1e-12
}

fn default_xtol() -> f64 {
    1e-12
}

fn default_gtol() -> f64 {
    1e-14
}

impl Default for BundleAdjusterSettings {
    fn default() -> Self {
        Self {
            patience: default_patience(),
            ftol: default_ftol(),
            xtol: default_xtol(),
            gtol: default_gtol(),
        }
    }
}

impl BundleAdjusterSettings {
    #[must_use]
    pub fn patience(self, patience: usize) -> Self {
        Self { patience, ..self }
    }
}
