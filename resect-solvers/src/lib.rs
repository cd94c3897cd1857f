//! Geometric solvers for camera resection.
//!
//! - [`LambdaTwist`] solves the calibrated Perspective-3-Point problem and yields up to four
//!   poses from three correspondences.
//! - [`SixPoint`] estimates a full 3x4 [`ProjectionMatrix`] from six or more correspondences
//!   with the normalized direct linear transform, optionally weighted.
//!
//! Both implement [`Estimator`] so they can be driven by any sample consensus algorithm.
//! They also implement [`ResectionSolver`], which is what the robust estimators of
//! `resect-consensus` expect: a solver turning a sample into projection matrices.
#![warn(missing_docs)]

mod p3p;
mod six_point;

pub use p3p::*;
pub use six_point::*;

use resect_core::sample_consensus::Estimator;
use resect_core::{FeatureWorldMatch, ProjectionMatrix};
use resect_pinhole::NormalizedKeyPoint;

/// A solver which produces projection matrix hypotheses from a sample of correspondences.
pub trait ResectionSolver {
    /// Smallest sample the solver accepts.
    const MIN_SAMPLES: usize;

    /// Upper bound on the number of hypotheses produced from one minimal sample.
    const MAX_MODELS: usize;

    /// Appends the hypotheses explaining `samples` to `models`.
    fn solve(
        &self,
        samples: &[FeatureWorldMatch<NormalizedKeyPoint>],
        models: &mut Vec<ProjectionMatrix>,
    );
}

impl ResectionSolver for LambdaTwist {
    const MIN_SAMPLES: usize =
        <Self as Estimator<FeatureWorldMatch<NormalizedKeyPoint>>>::MIN_SAMPLES;
    const MAX_MODELS: usize = 4;

    fn solve(
        &self,
        samples: &[FeatureWorldMatch<NormalizedKeyPoint>],
        models: &mut Vec<ProjectionMatrix>,
    ) {
        models.extend(
            self.estimate(samples.iter().copied())
                .into_iter()
                .map(ProjectionMatrix::from),
        );
    }
}

impl ResectionSolver for SixPoint {
    const MIN_SAMPLES: usize =
        <Self as Estimator<FeatureWorldMatch<NormalizedKeyPoint>>>::MIN_SAMPLES;
    const MAX_MODELS: usize = 1;

    fn solve(
        &self,
        samples: &[FeatureWorldMatch<NormalizedKeyPoint>],
        models: &mut Vec<ProjectionMatrix>,
    ) {
        models.extend(self.estimate(samples.iter().copied()));
    }
}
