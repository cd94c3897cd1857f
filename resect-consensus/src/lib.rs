//! Robust estimators used to localize a camera from correspondences polluted by outliers.
//!
//! - [`AcRansac`] is the a contrario RANSAC of Moisan, Moulon and Monasse. It does not need an
//!   inlier threshold: every hypothesis is scored by its number of false alarms (NFA) over all
//!   possible thresholds, and the threshold of the most meaningful model is returned.
//! - [`LoRansac`] is the locally optimized RANSAC of Chum, Matas and Kittler. It uses a fixed
//!   threshold through a [`ScoreEvaluator`] and polishes every new best hypothesis with a
//!   least squares solver on its inliers.
//!
//! Both operate on a [`Kernel`], which hides the data, the minimal solver and the
//! normalization of the problem behind sample indices.

mod ac_ransac;
mod lo_ransac;
mod sampling;
mod score;
mod support;

pub use ac_ransac::*;
pub use lo_ransac::*;
pub use score::*;
pub use support::*;

/// A robust estimation problem expressed over the indices of its samples.
pub trait Kernel {
    type Model: Clone;

    /// Size of a minimal sample.
    const MIN_SAMPLES: usize;

    /// Upper bound on the number of models a minimal sample produces.
    const MAX_MODELS: usize;

    /// Number of samples of the problem.
    fn num_samples(&self) -> usize;

    /// Appends the models fitting the given samples to `models`.
    fn fit(&self, samples: &[usize], models: &mut Vec<Self::Model>);

    /// Squared error of one sample under a model, in the normalized frame of the kernel.
    fn error(&self, sample: usize, model: &Self::Model) -> f64;

    /// Errors of every sample under the model.
    fn errors(&self, model: &Self::Model, errors: &mut Vec<f64>) {
        errors.clear();
        errors.extend((0..self.num_samples()).map(|sample| self.error(sample, model)));
    }

    /// Moves a model from the normalized frame of the kernel back to the frame of the caller.
    fn unnormalize(&self, model: &mut Self::Model);
}

/// A kernel with the statistics the a contrario model needs.
pub trait AcKernel: Kernel {
    /// `log10` of the probability for a random point to have an error of `1` or less.
    fn log_alpha0(&self) -> f64;

    /// Exponent relating the error to the probability, `1` for squared distances in a plane.
    fn mult_error(&self) -> f64;

    /// Scale from caller units to normalized units.
    fn normalizer_scale(&self) -> f64;

    /// Converts a squared normalized error back to a caller distance.
    fn unnormalize_error(&self, error: f64) -> f64 {
        error.sqrt() / self.normalizer_scale()
    }
}

/// A kernel which can also fit a model in the least squares sense.
pub trait LoKernel: Kernel {
    /// Smallest sample the least squares solver accepts.
    const MIN_SAMPLES_LS: usize;

    /// Appends the models fitting the given samples in the least squares sense.
    fn fit_ls(&self, samples: &[usize], models: &mut Vec<Self::Model>, weights: Option<&[f64]>);

    /// Weights for a reweighted least squares fit, `1 / max(eps, √error)` by default.
    fn compute_weights(
        &self,
        model: &Self::Model,
        samples: &[usize],
        weights: &mut Vec<f64>,
        eps: f64,
    ) {
        weights.clear();
        weights.extend(
            samples
                .iter()
                .map(|&sample| 1.0 / self.error(sample, model).sqrt().max(eps)),
        );
    }
}
