use crate::sampling::{uniform_indices, uniform_sample};
use crate::AcKernel;
use float_ord::FloatOrd;
use log::*;
use rand::RngCore;

/// Result of an [`AcRansac`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct AcRansacOutput<M> {
    /// The most meaningful model, expressed in the frame of the caller.
    ///
    /// `None` when no hypothesis could be built at all. It can be set while
    /// `inliers` is empty, in which case the model is not meaningful.
    pub model: Option<M>,
    /// Samples consistent with the model under `error_max`.
    pub inliers: Vec<usize>,
    /// The adaptive inlier threshold as a caller distance (not squared).
    pub error_max: f64,
    /// `log10` of the number of false alarms of the model, negative when meaningful.
    pub min_nfa: f64,
}

impl<M> AcRansacOutput<M> {
    fn empty() -> Self {
        Self {
            model: None,
            inliers: Vec::new(),
            error_max: 0.0,
            min_nfa: f64::INFINITY,
        }
    }

    /// A model was found with a negative NFA.
    pub fn is_meaningful(&self) -> bool {
        !self.inliers.is_empty() && self.min_nfa < 0.0
    }
}

/// A contrario RANSAC.
///
/// Each hypothesis is scored by the best number of false alarms over every possible
/// inlier count `k`:
///
/// `NFA(k) = log(e₀) + log(α(k))·(k - s) + log C(n, k) + log C(k, s)`
///
/// where `s` is the minimal sample size, `n` the number of samples and `α(k)` the
/// probability for a random sample to have an error at most the `k`-th smallest error.
/// A tenth of the iterations is reserved to resample from the inliers of the best model.
#[derive(Debug, Clone)]
pub struct AcRansac<R> {
    rng: R,
}

impl<R> AcRansac<R>
where
    R: RngCore,
{
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Runs at most `max_iterations` iterations.
    ///
    /// `precision` is an upper bound on the squared error of an inlier in caller units.
    /// Pass `f64::INFINITY` to let the threshold be entirely data driven. With a finite
    /// bound, the NFA search only starts once a hypothesis has more than `2.5 s` samples
    /// under the bound.
    pub fn estimate<K>(
        &mut self,
        kernel: &K,
        max_iterations: usize,
        precision: f64,
    ) -> AcRansacOutput<K::Model>
    where
        K: AcKernel,
    {
        let sample_size = K::MIN_SAMPLES;
        let n = kernel.num_samples();
        if n <= sample_size {
            debug!(
                "AC-RANSAC needs more than {} samples, got {}",
                sample_size, n
            );
            return AcRansacOutput::empty();
        }

        let scale = kernel.normalizer_scale();
        let max_threshold = if precision.is_infinite() {
            f64::INFINITY
        } else {
            precision * scale * scale
        };

        let mut reserve = max_iterations / 10;
        let mut iterations = max_iterations - reserve;
        let mut ac_mode = precision.is_infinite();

        let log_e0 = ((K::MAX_MODELS * (n - sample_size)) as f64).log10();
        let log_c_n = log_combinations_n(n);
        let log_c_k = log_combinations_k(sample_size, n);
        let nfa = Nfa {
            sample_size,
            log_e0,
            max_threshold,
            log_alpha0: kernel.log_alpha0(),
            mult_error: kernel.mult_error(),
            log_c_n: &log_c_n,
            log_c_k: &log_c_k,
        };

        let mut output = AcRansacOutput::empty();
        let mut best_error = f64::INFINITY;
        let mut population: Vec<usize> = (0..n).collect();
        let mut sample = Vec::with_capacity(sample_size);
        let mut models = Vec::with_capacity(K::MAX_MODELS);
        let mut errors = Vec::with_capacity(n);
        let mut sorted: Vec<(FloatOrd<f64>, usize)> = Vec::with_capacity(n);

        let mut iteration = 0;
        while iteration < iterations {
            if ac_mode {
                uniform_sample(&mut self.rng, sample_size, &population, &mut sample);
            } else {
                uniform_indices(&mut self.rng, sample_size, n, &mut sample);
            }
            models.clear();
            kernel.fit(&sample, &mut models);

            let mut better = false;
            for model in &models {
                kernel.errors(model, &mut errors);
                if !ac_mode {
                    let below = errors.iter().filter(|&&e| e <= max_threshold).count();
                    if below as f64 > 2.5 * sample_size as f64 {
                        ac_mode = true;
                    }
                }
                if !ac_mode {
                    continue;
                }

                sorted.clear();
                sorted.extend(errors.iter().enumerate().map(|(i, &e)| (FloatOrd(e), i)));
                sorted.sort_unstable();

                if let Some((candidate_nfa, k)) = nfa.best(&sorted) {
                    if candidate_nfa < output.min_nfa {
                        better = true;
                        output.min_nfa = candidate_nfa;
                        output.inliers.clear();
                        output.inliers.extend(sorted[..k].iter().map(|&(_, i)| i));
                        best_error = sorted[k - 1].0 .0;
                        output.model = Some(model.clone());
                    }
                }
            }

            // Focus the sampling on the inliers of the current best model.
            if (better && output.min_nfa < 0.0) || (iteration + 1 == iterations && reserve > 0) {
                if output.inliers.is_empty() {
                    iterations += 1;
                    reserve -= 1;
                } else {
                    population.clone_from(&output.inliers);
                    if reserve > 0 {
                        iterations = iteration + 1 + reserve;
                        reserve = 0;
                    }
                }
            }
            iteration += 1;
        }

        if output.min_nfa >= 0.0 {
            output.inliers.clear();
        }
        if !output.inliers.is_empty() {
            if let Some(model) = output.model.as_mut() {
                kernel.unnormalize(model);
            }
            output.error_max = kernel.unnormalize_error(best_error);
        } else {
            output.error_max = best_error;
        }
        trace!(
            "AC-RANSAC: {} iterations, nfa {}, {} inliers out of {}",
            iteration,
            output.min_nfa,
            output.inliers.len(),
            n
        );
        output
    }
}

/// Everything needed to evaluate the NFA of a hypothesis from its sorted errors.
struct Nfa<'a> {
    sample_size: usize,
    log_e0: f64,
    max_threshold: f64,
    log_alpha0: f64,
    mult_error: f64,
    log_c_n: &'a [f64],
    log_c_k: &'a [f64],
}

impl Nfa<'_> {
    /// Returns the smallest NFA over the inlier counts `k > s` and the count reaching it.
    fn best(&self, sorted: &[(FloatOrd<f64>, usize)]) -> Option<(f64, usize)> {
        let mut best: Option<(f64, usize)> = None;
        for k in self.sample_size + 1..=sorted.len() {
            let error = sorted[k - 1].0 .0;
            if error > self.max_threshold {
                break;
            }
            let log_alpha =
                self.log_alpha0 + self.mult_error * (error + f64::from(f32::EPSILON)).log10();
            let nfa = self.log_e0
                + log_alpha * (k - self.sample_size) as f64
                + self.log_c_n[k]
                + self.log_c_k[k];
            if best.map_or(true, |(b, _)| nfa < b) {
                best = Some((nfa, k));
            }
        }
        best
    }
}

/// `log10` of the binomial coefficient `C(n, k)`.
fn log_combination(k: usize, n: usize) -> f64 {
    if k >= n || k == 0 {
        return 0.0;
    }
    let k = k.min(n - k);
    (1..=k)
        .map(|i| ((n - i + 1) as f64).log10() - (i as f64).log10())
        .sum()
}

/// `log10 C(n, k)` for every `k` in `0..=n`.
fn log_combinations_n(n: usize) -> Vec<f64> {
    (0..=n).map(|k| log_combination(k, n)).collect()
}

/// `log10 C(i, k)` for every `i` in `0..=n`.
fn log_combinations_k(k: usize, n: usize) -> Vec<f64> {
    (0..=n).map(|i| log_combination(k, i)).collect()
}
