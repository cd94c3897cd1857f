use crate::RefineParameters;
use levenberg_marquardt::LeastSquaresProblem;
use resect_core::nalgebra::{
    dimension::{Dynamic, U1},
    DMatrix, DVector, Matrix3, Point2, Point3, VecStorage, Vector3,
};
use resect_core::{Pose, Skew3, WorldToCamera};
use resect_pinhole::Intrinsics;

/// Pixel reprojection residuals of one camera over its landmarks.
///
/// The parameters are laid out as `[δω][δt][intrinsics]`, where a block is only
/// present if the mask frees it. The pose is parametrized around the initial pose
/// with `R = exp(δω) R₀` and `t = t₀ + δt`.
pub(crate) struct ReprojectionProblem<'a> {
    landmarks: &'a [(Point3<f64>, Point2<f64>)],
    mask: RefineParameters,
    initial: WorldToCamera,
    rotation: Skew3,
    translation: Vector3<f64>,
    intrinsics: Box<dyn Intrinsics>,
    /// Cleared when the intrinsics refused a parameter vector.
    consistent: bool,
}

impl<'a> ReprojectionProblem<'a> {
    pub(crate) fn new(
        landmarks: &'a [(Point3<f64>, Point2<f64>)],
        mask: RefineParameters,
        pose: WorldToCamera,
        intrinsics: Box<dyn Intrinsics>,
    ) -> Self {
        Self {
            landmarks,
            mask,
            initial: pose,
            rotation: Skew3(Vector3::zeros()),
            translation: Vector3::zeros(),
            intrinsics,
            consistent: true,
        }
    }

    pub(crate) fn num_params(&self) -> usize {
        let mut count = 0;
        if self.mask.rotation {
            count += 3;
        }
        if self.mask.translation {
            count += 3;
        }
        if self.mask.intrinsics {
            count += self.intrinsics.params().len();
        }
        count
    }

    /// The pose at the current parameters.
    pub(crate) fn pose(&self) -> WorldToCamera {
        let isometry = self.initial.isometry();
        WorldToCamera::from_parts(
            isometry.translation.vector + self.translation,
            self.rotation.rotation() * isometry.rotation,
        )
    }

    pub(crate) fn into_intrinsics(self) -> Box<dyn Intrinsics> {
        self.intrinsics
    }
}

impl<'a> LeastSquaresProblem<f64, Dynamic, Dynamic> for ReprojectionProblem<'a> {
    type ResidualStorage = VecStorage<f64, Dynamic, U1>;
    type JacobianStorage = VecStorage<f64, Dynamic, Dynamic>;
    type ParameterStorage = VecStorage<f64, Dynamic, U1>;

    fn set_params(&mut self, x: &DVector<f64>) {
        let mut x = x.as_slice();
        if self.mask.rotation {
            self.rotation = Skew3(Vector3::from_column_slice(&x[..3]));
            x = &x[3..];
        }
        if self.mask.translation {
            self.translation = Vector3::from_column_slice(&x[..3]);
            x = &x[3..];
        }
        if self.mask.intrinsics {
            self.consistent = self.intrinsics.update_from_params(x).is_ok();
        }
    }

    fn params(&self) -> DVector<f64> {
        let mut params = Vec::with_capacity(self.num_params());
        if self.mask.rotation {
            params.extend_from_slice(self.rotation.0.as_slice());
        }
        if self.mask.translation {
            params.extend_from_slice(self.translation.as_slice());
        }
        if self.mask.intrinsics {
            params.extend(self.intrinsics.params());
        }
        DVector::from_vec(params)
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        if !self.consistent {
            return None;
        }
        let pose = self.pose().isometry();
        let mut residuals = DVector::zeros(2 * self.landmarks.len());
        for (i, &(world, observed)) in self.landmarks.iter().enumerate() {
            let pixel = self.intrinsics.project(&(pose * world))?;
            residuals
                .fixed_rows_mut::<2>(2 * i)
                .copy_from(&(pixel - observed));
        }
        Some(residuals)
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        if !self.consistent {
            return None;
        }
        let pose = self.pose().isometry();
        let left_jacobian = self.rotation.left_jacobian();
        let mut jacobian = DMatrix::zeros(2 * self.landmarks.len(), self.num_params());
        for (i, &(world, _)) in self.landmarks.iter().enumerate() {
            let rotated = pose.rotation * world.coords;
            let camera = Point3::from(rotated + pose.translation.vector);
            let (_, pixel_point, pixel_intrinsics) =
                self.intrinsics.project_with_jacobians(&camera)?;

            let row = 2 * i;
            let mut column = 0;
            if self.mask.rotation {
                let point_rotation: Matrix3<f64> = Skew3::jacobian_self(rotated) * left_jacobian;
                jacobian
                    .fixed_slice_mut::<2, 3>(row, column)
                    .copy_from(&(pixel_point * point_rotation));
                column += 3;
            }
            if self.mask.translation {
                // The camera point moves one for one with the translation.
                jacobian
                    .fixed_slice_mut::<2, 3>(row, column)
                    .copy_from(&pixel_point);
                column += 3;
            }
            if self.mask.intrinsics {
                jacobian
                    .slice_mut((row, column), (2, pixel_intrinsics.ncols()))
                    .copy_from(&pixel_intrinsics);
            }
        }
        Some(jacobian)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use resect_core::nalgebra::{IsometryMatrix3, Rotation3, Translation3, Vector2};
    use resect_pinhole::{CameraIntrinsics, Pinhole, Radial};

    #[test]
    fn jacobian_matches_finite_difference() {
        let camera = Pinhole::new(
            CameraIntrinsics::identity()
                .focals(Vector2::new(700.0, 710.0))
                .principal_point(Point2::new(300.0, 200.0)),
            Radial::new([-0.05]),
        );
        let pose = WorldToCamera(IsometryMatrix3::from_parts(
            Translation3::new(0.1, -0.2, 4.0),
            Rotation3::from_euler_angles(0.1, -0.2, 0.05),
        ));
        let landmarks = vec![
            (Point3::new(0.5, 0.2, 0.3), Point2::new(320.0, 210.0)),
            (Point3::new(-0.4, 0.7, -0.2), Point2::new(280.0, 260.0)),
            (Point3::new(0.1, -0.6, 0.8), Point2::new(305.0, 150.0)),
        ];
        let mut problem = ReprojectionProblem::new(
            &landmarks,
            RefineParameters::ALL,
            pose,
            Box::new(camera),
        );
        let mut x = problem.params();
        x[0] = 0.01;
        x[1] = -0.02;
        x[5] = 0.03;
        problem.set_params(&x);

        let analytic = problem.jacobian().unwrap();
        let h = 1e-6;
        for j in 0..x.len() {
            let mut plus = x.clone();
            plus[j] += h;
            problem.set_params(&plus);
            let r_plus = problem.residuals().unwrap();
            let mut minus = x.clone();
            minus[j] -= h;
            problem.set_params(&minus);
            let r_minus = problem.residuals().unwrap();
            let numeric = (r_plus - r_minus) / (2.0 * h);
            assert_relative_eq!(numeric, analytic.column(j).into_owned(), epsilon = 1e-3);
        }
    }
}
