use resect_core::{
    nalgebra::{DMatrix, Matrix3, Matrix3x4, Matrix4, Point2, Point3, Vector2, Vector3},
    sample_consensus::Estimator,
    FeatureWorldMatch, ImagePoint, Projective, ProjectionMatrix,
};

/// Uncalibrated resection with the normalized direct linear transform.
///
/// Each correspondence contributes two rows to a `2n x 12` design matrix whose right null
/// vector is the stacked projection matrix. Both point sets are first centered and scaled
/// so every coordinate is of unit order.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SixPoint {
    /// Reject solutions which put any of the input world points behind the camera.
    pub check_cheirality: bool,
}

impl SixPoint {
    /// Creates a solver which checks cheirality.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets [`SixPoint::check_cheirality`].
    #[must_use]
    pub fn check_cheirality(self, check_cheirality: bool) -> Self {
        Self { check_cheirality }
    }

    /// Solves for the projection matrix from at least six correspondences.
    ///
    /// When `weights` is given, the two rows of correspondence `i` are scaled by
    /// `weights[i]`, which turns the solve into a weighted least squares fit.
    pub fn solve_weighted<P>(
        &self,
        data: &[FeatureWorldMatch<P>],
        weights: Option<&[f64]>,
    ) -> Option<ProjectionMatrix>
    where
        P: ImagePoint,
    {
        if data.len() < <Self as Estimator<FeatureWorldMatch<P>>>::MIN_SAMPLES {
            return None;
        }
        if weights.map_or(false, |weights| weights.len() != data.len()) {
            return None;
        }
        let world: Vec<Point3<f64>> = data
            .iter()
            .map(|FeatureWorldMatch(_, world)| world.point())
            .collect::<Option<_>>()?;
        let image: Vec<Point2<f64>> = data
            .iter()
            .map(|FeatureWorldMatch(image, _)| image.image_point())
            .collect();

        let world_transform = normalize_world(&world)?;
        let image_transform = normalize_image(&image)?;

        let mut design = DMatrix::<f64>::zeros(2 * data.len(), 12);
        for (i, (w, x)) in world.iter().zip(&image).enumerate() {
            let weight = weights.map_or(1.0, |weights| weights[i]);
            let w = world_transform * w.to_homogeneous();
            let x = image_transform * x.to_homogeneous();
            let (u, v) = (x.x / x.z, x.y / x.z);
            for j in 0..4 {
                design[(2 * i, j)] = weight * w[j];
                design[(2 * i, 8 + j)] = -weight * u * w[j];
                design[(2 * i + 1, 4 + j)] = weight * w[j];
                design[(2 * i + 1, 8 + j)] = -weight * v * w[j];
            }
        }

        let svd = design.svd(false, true);
        let v_t = svd.v_t?;
        // Singular values are not guaranteed to be sorted.
        let null = v_t.row(svd.singular_values.imin());
        let normalized = Matrix3x4::from_row_slice(null.transpose().as_slice());
        let projection = ProjectionMatrix(
            image_transform.try_inverse()? * normalized * world_transform,
        );
        if !projection.iter().all(|n| n.is_finite()) {
            return None;
        }

        if self.check_cheirality
            && data
                .iter()
                .any(|&FeatureWorldMatch(_, world)| projection.depth(world) <= 0.0)
        {
            return None;
        }
        Some(projection)
    }
}

impl Default for SixPoint {
    fn default() -> Self {
        Self {
            check_cheirality: true,
        }
    }
}

impl<P> Estimator<FeatureWorldMatch<P>> for SixPoint
where
    P: ImagePoint,
{
    type Model = ProjectionMatrix;
    type ModelIter = Option<ProjectionMatrix>;
    const MIN_SAMPLES: usize = 6;

    /// Solves from every correspondence of the iterator.
    fn estimate<I>(&self, data: I) -> Self::ModelIter
    where
        I: Iterator<Item = FeatureWorldMatch<P>> + Clone,
    {
        let data: Vec<FeatureWorldMatch<P>> = data.collect();
        self.solve_weighted(&data, None)
    }
}

/// Translates the centroid to the origin and scales the mean distance to `√3`.
fn normalize_world(points: &[Point3<f64>]) -> Option<Matrix4<f64>> {
    let n = points.len() as f64;
    let centroid = points.iter().map(|p| p.coords).sum::<Vector3<f64>>() / n;
    let mean = points.iter().map(|p| (p.coords - centroid).norm()).sum::<f64>() / n;
    if mean <= f64::EPSILON {
        return None;
    }
    let scale = 3.0f64.sqrt() / mean;
    let mut transform = Matrix4::identity() * scale;
    transform[(3, 3)] = 1.0;
    transform
        .fixed_slice_mut::<3, 1>(0, 3)
        .copy_from(&(-scale * centroid));
    Some(transform)
}

/// Translates the centroid to the origin and scales the mean distance to `√2`.
fn normalize_image(points: &[Point2<f64>]) -> Option<Matrix3<f64>> {
    let n = points.len() as f64;
    let centroid = points.iter().map(|p| p.coords).sum::<Vector2<f64>>() / n;
    let mean = points.iter().map(|p| (p.coords - centroid).norm()).sum::<f64>() / n;
    if mean <= f64::EPSILON {
        return None;
    }
    let scale = 2.0f64.sqrt() / mean;
    Some(Matrix3::new(
        scale,
        0.0,
        -scale * centroid.x,
        0.0,
        scale,
        -scale * centroid.y,
        0.0,
        0.0,
        1.0,
    ))
}
