use crate::sampling::{uniform_indices, uniform_sample};
use crate::{LoKernel, ScoreEvaluator};
use log::*;
use rand::RngCore;
#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Floor of the residuals when computing reweighting factors.
const WEIGHT_EPSILON: f64 = 1e-4;

/// The settings of [`LoRansac`].
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LoRansacSettings {
    /// Iterations are never more than this, whatever the caller budget.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_max_iterations"))]
    pub max_iterations: usize,
    /// Accepted probability of never drawing an all-inlier sample.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_failure_probability")
    )]
    pub failure_probability: f64,
    /// The number of least squares samples drawn by each local optimization.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_local_repetitions")
    )]
    pub local_repetitions: usize,
    /// The number of reweighted least squares iterations after each local sample.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_reweighting_iterations")
    )]
    pub reweighting_iterations: usize,
    /// The factor widening the inlier threshold at the start of the local optimization.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_threshold_multiplier")
    )]
    pub threshold_multiplier: f64,
    /// Upper bound on the size of a least squares sample.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_max_local_sample_size")
    )]
    pub max_local_sample_size: usize,
}

fn default_max_iterations() -> usize {
    4096
}

fn default_failure_probability() -> f64 {
    0.01
}

fn default_local_repetitions() -> usize {
    10
}

fn default_reweighting_iterations() -> usize {
    4
}

fn default_threshold_multiplier() -> f64 {
    std::f64::consts::SQRT_2
}

fn default_max_local_sample_size() -> usize {
    10
}

impl Default for LoRansacSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            failure_probability: default_failure_probability(),
            local_repetitions: default_local_repetitions(),
            reweighting_iterations: default_reweighting_iterations(),
            threshold_multiplier: default_threshold_multiplier(),
            max_local_sample_size: default_max_local_sample_size(),
        }
    }
}

impl LoRansacSettings {
    #[must_use]
    pub fn max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }

    #[must_use]
    pub fn local_repetitions(self, local_repetitions: usize) -> Self {
        Self {
            local_repetitions,
            ..self
        }
    }

    #[must_use]
    pub fn reweighting_iterations(self, reweighting_iterations: usize) -> Self {
        Self {
            reweighting_iterations,
            ..self
        }
    }
}

/// Number of iterations needed to draw an all-inlier minimal sample with probability
/// `1 - failure_probability` given `inliers` out of `total` samples.
///
/// Returns `usize::MAX` when there are no inliers and `0` when every sample is an inlier.
pub fn iteration_bound(
    inliers: usize,
    total: usize,
    sample_size: usize,
    failure_probability: f64,
) -> usize {
    if total == 0 || inliers == 0 {
        return usize::MAX;
    }
    let all_inliers = (inliers as f64 / total as f64).powi(sample_size as i32);
    if all_inliers >= 1.0 {
        return 0;
    }
    let bound = (failure_probability.ln() / (1.0 - all_inliers).ln()).ceil();
    if bound.is_finite() && bound < usize::MAX as f64 {
        bound.max(0.0) as usize
    } else {
        usize::MAX
    }
}

/// Locally optimized RANSAC.
///
/// Hypotheses come from uniform minimal samples and are scored by their inlier count.
/// Every hypothesis beating the best one is polished by drawing least squares samples
/// from its inliers under a widened threshold, each one followed by iteratively
/// reweighted least squares while the threshold shrinks back to its nominal value.
#[derive(Debug, Clone)]
pub struct LoRansac<R> {
    rng: R,
    settings: LoRansacSettings,
}

struct Hypothesis<M> {
    model: M,
    inliers: Vec<usize>,
}

impl<R> LoRansac<R>
where
    R: RngCore,
{
    pub fn new(rng: R) -> Self {
        Self::with_settings(rng, LoRansacSettings::default())
    }

    pub fn with_settings(rng: R, settings: LoRansacSettings) -> Self {
        Self { rng, settings }
    }

    /// Finds the model with the most inliers under the threshold of `scorer`.
    ///
    /// The returned model is un-normalized. `None` is returned when no hypothesis has
    /// a single inlier.
    pub fn estimate<K>(
        &mut self,
        kernel: &K,
        scorer: &ScoreEvaluator,
        max_iterations: usize,
    ) -> Option<(K::Model, Vec<usize>)>
    where
        K: LoKernel,
    {
        let n = kernel.num_samples();
        if n < K::MIN_SAMPLES {
            debug!(
                "LO-RANSAC needs at least {} samples, got {}",
                K::MIN_SAMPLES,
                n
            );
            return None;
        }

        let all: Vec<usize> = (0..n).collect();
        let mut iterations = max_iterations.min(self.settings.max_iterations);
        let mut best: Option<Hypothesis<K::Model>> = None;
        let mut sample = Vec::with_capacity(K::MIN_SAMPLES);
        let mut models = Vec::with_capacity(K::MAX_MODELS);
        let mut inliers = Vec::with_capacity(n);

        let mut iteration = 0;
        while iteration < iterations {
            iteration += 1;
            uniform_indices(&mut self.rng, K::MIN_SAMPLES, n, &mut sample);
            models.clear();
            kernel.fit(&sample, &mut models);

            for model in models.drain(..) {
                scorer.score(kernel, &model, &all, &mut inliers, 1.0);
                let best_count = best.as_ref().map_or(0, |b| b.inliers.len());
                if inliers.len() <= best_count {
                    continue;
                }
                let mut candidate = Hypothesis {
                    model,
                    inliers: inliers.clone(),
                };
                if candidate.inliers.len() > K::MIN_SAMPLES_LS {
                    if let Some(optimized) =
                        self.optimize_locally(kernel, scorer, &candidate.model, &all)
                    {
                        if optimized.inliers.len() > candidate.inliers.len() {
                            trace!(
                                "local optimization raised the support from {} to {}",
                                candidate.inliers.len(),
                                optimized.inliers.len()
                            );
                            candidate = optimized;
                        }
                    }
                }
                let bound = iteration_bound(
                    candidate.inliers.len(),
                    n,
                    K::MIN_SAMPLES,
                    self.settings.failure_probability,
                );
                iterations = iterations.min(bound);
                best = Some(candidate);
            }
        }

        let Hypothesis { mut model, inliers } = best?;
        trace!(
            "LO-RANSAC: {} iterations, {} inliers out of {}",
            iteration,
            inliers.len(),
            n
        );
        kernel.unnormalize(&mut model);
        Some((model, inliers))
    }

    fn optimize_locally<K>(
        &mut self,
        kernel: &K,
        scorer: &ScoreEvaluator,
        model: &K::Model,
        all: &[usize],
    ) -> Option<Hypothesis<K::Model>>
    where
        K: LoKernel,
    {
        let mut base = Vec::new();
        scorer.score(
            kernel,
            model,
            all,
            &mut base,
            self.settings.threshold_multiplier,
        );
        let sample_size = self.settings.max_local_sample_size.min(base.len() / 2);
        if sample_size <= K::MIN_SAMPLES_LS {
            return None;
        }

        let mut best: Option<Hypothesis<K::Model>> = None;
        let mut sample = Vec::with_capacity(sample_size);
        let mut models = Vec::new();
        for _ in 0..self.settings.local_repetitions {
            uniform_sample(&mut self.rng, sample_size, &base, &mut sample);
            models.clear();
            kernel.fit_ls(&sample, &mut models, None);
            let start = match models.pop() {
                Some(start) => start,
                None => continue,
            };
            let candidate = self.reweight(kernel, scorer, start, all);
            if best
                .as_ref()
                .map_or(true, |b| candidate.inliers.len() > b.inliers.len())
            {
                best = Some(candidate);
            }
        }
        best
    }

    /// Iteratively reweighted least squares, shrinking the threshold to its nominal value.
    fn reweight<K>(
        &self,
        kernel: &K,
        scorer: &ScoreEvaluator,
        mut model: K::Model,
        all: &[usize],
    ) -> Hypothesis<K::Model>
    where
        K: LoKernel,
    {
        let iterations = self.settings.reweighting_iterations;
        let multiplier = self.settings.threshold_multiplier;
        let step = if iterations > 0 {
            (multiplier - 1.0) / iterations as f64
        } else {
            0.0
        };

        let mut inliers = Vec::new();
        let mut weights = Vec::new();
        let mut models = Vec::new();
        let mut scale = multiplier;
        for _ in 0..iterations {
            scorer.score(kernel, &model, all, &mut inliers, scale);
            if inliers.len() < K::MIN_SAMPLES_LS {
                break;
            }
            kernel.compute_weights(&model, &inliers, &mut weights, WEIGHT_EPSILON);
            models.clear();
            kernel.fit_ls(&inliers, &mut models, Some(&weights));
            match models.pop() {
                Some(refined) => model = refined,
                None => break,
            }
            scale -= step;
        }
        scorer.score(kernel, &model, all, &mut inliers, 1.0);
        Hypothesis { model, inliers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::location;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    #[test]
    fn iteration_bound_formula() {
        assert_eq!(iteration_bound(50, 100, 3, 0.01), 35);
        assert_eq!(iteration_bound(100, 100, 3, 0.01), 0);
        assert_eq!(iteration_bound(0, 100, 3, 0.01), usize::MAX);
        assert!(iteration_bound(10, 100, 6, 0.01) > 4096);
    }

    #[test]
    fn locally_optimized_model_fits_the_cluster() {
        pretty_env_logger::try_init().ok();
        let kernel = location(42.0, 30, 40);
        let scorer = ScoreEvaluator::new(0.04 * 0.04);
        let mut ransac = LoRansac::new(Pcg64::seed_from_u64(0));
        let (model, mut inliers) = ransac.estimate(&kernel, &scorer, 1000).unwrap();
        assert!((model - 42.0).abs() < 0.015);
        inliers.sort_unstable();
        assert_eq!(inliers, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn caller_budget_caps_iterations() {
        let kernel = location(42.0, 30, 40);
        let scorer = ScoreEvaluator::new(0.04 * 0.04);
        let settings = LoRansacSettings::default().max_iterations(0);
        let mut ransac = LoRansac::with_settings(Pcg64::seed_from_u64(0), settings);
        assert!(ransac.estimate(&kernel, &scorer, 1000).is_none());
    }

    #[test]
    fn not_enough_samples() {
        let kernel = location(0.0, 0, 0);
        let scorer = ScoreEvaluator::new(1.0);
        let mut ransac = LoRansac::new(Pcg64::seed_from_u64(0));
        assert!(ransac.estimate(&kernel, &scorer, 100).is_none());
    }
}
