use core::f64::consts::PI;
use resect_consensus::{AcKernel, Kernel, LoKernel};
use resect_core::nalgebra::{Matrix3, Point2};
use resect_core::sample_consensus::Model;
use resect_core::{FeatureWorldMatch, ImageSize, KeyPoint, ProjectionMatrix, WorldPoint};
use resect_pinhole::NormalizedKeyPoint;
use resect_solvers::{ResectionSolver, SixPoint};

/// Conditioning of raw pixels: the image center goes to the origin and the image
/// gets a unit area.
#[rustfmt::skip]
pub fn image_normalizer(size: ImageSize) -> Matrix3<f64> {
    let width = f64::from(size.width);
    let height = f64::from(size.height);
    let norm = size.area().sqrt().recip();
    Matrix3::new(
        norm, 0.0,  -0.5 * width * norm,
        0.0,  norm, -0.5 * height * norm,
        0.0,  0.0,  1.0,
    )
}

/// Camera resection as a robust estimation problem.
///
/// Observations are moved to a normalized frame with `N` before the solver sees
/// them, and models are brought back to pixels with `N⁻¹ P`. Errors are squared
/// distances in the normalized frame.
#[derive(Debug, Clone)]
pub struct ResectionKernel<S> {
    solver: S,
    data: Vec<FeatureWorldMatch<NormalizedKeyPoint>>,
    normalizer: Matrix3<f64>,
    denormalizer: Matrix3<f64>,
}

impl<S> ResectionKernel<S> {
    /// Returns `None` when `normalizer` cannot be inverted.
    pub fn new(
        solver: S,
        points: &[KeyPoint],
        world_points: &[WorldPoint],
        normalizer: Matrix3<f64>,
    ) -> Option<Self> {
        let denormalizer = normalizer.try_inverse()?;
        let data = points
            .iter()
            .zip(world_points)
            .map(|(&KeyPoint(point), &world)| {
                let normalized = normalizer * point.to_homogeneous();
                let normalized = Point2::from_homogeneous(normalized)?;
                Some(FeatureWorldMatch(NormalizedKeyPoint(normalized), world))
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Self {
            solver,
            data,
            normalizer,
            denormalizer,
        })
    }

    pub fn normalizer(&self) -> &Matrix3<f64> {
        &self.normalizer
    }

    fn gather(&self, samples: &[usize]) -> Vec<FeatureWorldMatch<NormalizedKeyPoint>> {
        samples.iter().map(|&sample| self.data[sample]).collect()
    }
}

impl<S> Kernel for ResectionKernel<S>
where
    S: ResectionSolver,
{
    type Model = ProjectionMatrix;
    const MIN_SAMPLES: usize = S::MIN_SAMPLES;
    const MAX_MODELS: usize = S::MAX_MODELS;

    fn num_samples(&self) -> usize {
        self.data.len()
    }

    fn fit(&self, samples: &[usize], models: &mut Vec<ProjectionMatrix>) {
        self.solver.solve(&self.gather(samples), models);
    }

    fn error(&self, sample: usize, model: &ProjectionMatrix) -> f64 {
        model.residual(&self.data[sample])
    }

    fn unnormalize(&self, model: &mut ProjectionMatrix) {
        *model = model.premultiply(&self.denormalizer);
    }
}

impl<S> AcKernel for ResectionKernel<S>
where
    S: ResectionSolver,
{
    /// The area of the unit disc over the unit area of the normalized image.
    fn log_alpha0(&self) -> f64 {
        PI.log10()
    }

    fn mult_error(&self) -> f64 {
        1.0
    }

    fn normalizer_scale(&self) -> f64 {
        self.normalizer[(0, 0)]
    }
}

/// Hypotheses come from `S` and are refined with the weighted six point solver.
impl<S> LoKernel for ResectionKernel<S>
where
    S: ResectionSolver,
{
    const MIN_SAMPLES_LS: usize = <SixPoint as ResectionSolver>::MIN_SAMPLES;

    fn fit_ls(
        &self,
        samples: &[usize],
        models: &mut Vec<ProjectionMatrix>,
        weights: Option<&[f64]>,
    ) {
        models.extend(SixPoint::new().solve_weighted(&self.gather(samples), weights));
    }
}
