use crate::Kernel;

/// Scores a model by the number of samples with an error under a fixed threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreEvaluator {
    threshold: f64,
}

impl ScoreEvaluator {
    /// `threshold` is a squared error in the normalized frame of the kernel.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Collects the samples whose error is below `threshold * threshold_scale` into
    /// `inliers` and returns their count.
    pub fn score<K: Kernel>(
        &self,
        kernel: &K,
        model: &K::Model,
        samples: &[usize],
        inliers: &mut Vec<usize>,
        threshold_scale: f64,
    ) -> f64 {
        let threshold = self.threshold * threshold_scale;
        inliers.clear();
        inliers.extend(
            samples
                .iter()
                .copied()
                .filter(|&sample| kernel.error(sample, model) < threshold),
        );
        inliers.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::location;

    #[test]
    fn counts_samples_under_threshold() {
        let kernel = location(10.0, 7, 5);
        let all: Vec<usize> = (0..12).collect();
        let mut inliers = Vec::new();
        let scorer = ScoreEvaluator::new(0.01);
        assert_eq!(scorer.score(&kernel, &10.0, &all, &mut inliers, 1.0), 7.0);
        assert_eq!(inliers, (0..7).collect::<Vec<_>>());
        assert_eq!(scorer.score(&kernel, &10.0, &all, &mut inliers, 1e-4), 1.0);
    }
}
