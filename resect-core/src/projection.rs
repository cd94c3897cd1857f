use crate::{FeatureWorldMatch, ImagePoint, Pose, Projective, WorldPoint, WorldToCamera};
use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::{Matrix3, Matrix3x4, Point2, Rotation3, Vector3};
use sample_consensus::Model;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A 3x4 linear camera `P = K [R | t]` which maps homogeneous world points to
/// homogeneous image points.
///
/// The matrix is only defined up to a non-zero scale factor.
#[derive(Debug, Clone, Copy, Default, PartialEq, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ProjectionMatrix(pub Matrix3x4<f64>);

impl ProjectionMatrix {
    /// Builds `K [R | t]` from a calibration matrix and a pose.
    pub fn from_pose(calibration: &Matrix3<f64>, pose: WorldToCamera) -> Self {
        Self(calibration * pose.homogeneous().fixed_slice::<3, 4>(0, 0))
    }

    /// Left-multiplies the camera by a 3x3 matrix, for instance to move it in or out
    /// of a normalized image frame.
    #[must_use]
    pub fn premultiply(self, transform: &Matrix3<f64>) -> Self {
        Self(transform * self.0)
    }

    /// Projects the world point into the image.
    ///
    /// Returns `None` when the point projects to infinity.
    pub fn project(&self, world: WorldPoint) -> Option<Point2<f64>> {
        let x = self.0 * world.homogeneous();
        if x.z.abs() <= f64::EPSILON * x.xy().abs().max() {
            return None;
        }
        Some(Point2::new(x.x / x.z, x.y / x.z))
    }

    /// Signed depth of the point in front of this camera.
    ///
    /// Only the sign is meaningful when the matrix carries an arbitrary scale.
    pub fn depth(&self, world: WorldPoint) -> f64 {
        let homogeneous = world.homogeneous();
        let w = (self.0 * homogeneous).z * homogeneous.w;
        let m = self.0.fixed_slice::<3, 3>(0, 0);
        m.determinant().signum() * w
    }

    /// Decomposes the camera into the calibration matrix `K`, the rotation `R` and
    /// the translation `t` with `P ~ K [R | t]`.
    ///
    /// `K` is upper triangular with a positive diagonal and `K₃₃ = 1`, and `R` is a
    /// proper rotation. Returns `None` if the left 3x3 block is singular.
    pub fn decompose(&self) -> Option<(Matrix3<f64>, Rotation3<f64>, Vector3<f64>)> {
        let mut p = self.0;
        let m = p.fixed_slice::<3, 3>(0, 0).into_owned();
        let det = m.determinant();
        if !det.is_finite() || det == 0.0 {
            return None;
        }
        // A negative determinant means the scale flipped the sign of every depth.
        if det < 0.0 {
            p = -p;
        }
        let m = p.fixed_slice::<3, 3>(0, 0).into_owned();
        let (mut k, r) = rq_decompose(&m);
        let t = k.try_inverse()? * p.column(3);
        k /= k[(2, 2)];
        let rotation = Rotation3::from_matrix_unchecked(r);
        Some((k, rotation, t))
    }

    /// Decomposes the camera into the calibration matrix and the pose.
    pub fn calibration_and_pose(&self) -> Option<(Matrix3<f64>, WorldToCamera)> {
        let (k, rotation, translation) = self.decompose()?;
        Some((k, WorldToCamera::from_parts(translation, rotation)))
    }
}

impl From<WorldToCamera> for ProjectionMatrix {
    fn from(pose: WorldToCamera) -> Self {
        Self::from_pose(&Matrix3::identity(), pose)
    }
}

/// RQ decomposition `M = K R` with `K` upper triangular with a positive diagonal and
/// `R` orthonormal.
fn rq_decompose(m: &Matrix3<f64>) -> (Matrix3<f64>, Matrix3<f64>) {
    // Reverses the row order, turning the QR of the flipped transpose into an RQ.
    let flip = Matrix3::new(0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0);
    let qr = (flip * m.transpose() * flip).qr();
    let mut k = flip * qr.r().transpose() * flip;
    let mut r = flip * qr.q().transpose() * flip;

    let mut signs = Matrix3::identity();
    for i in 0..3 {
        if k[(i, i)] < 0.0 {
            signs[(i, i)] = -1.0;
        }
    }
    k *= signs;
    r = signs * r;
    (k, r)
}

/// Squared reprojection error in the image frame of the camera.
impl<P> Model<FeatureWorldMatch<P>> for ProjectionMatrix
where
    P: ImagePoint,
{
    fn residual(&self, data: &FeatureWorldMatch<P>) -> f64 {
        let FeatureWorldMatch(observation, world) = data;
        self.project(*world)
            .map(|projected| (projected - observation.image_point()).norm_squared())
            .unwrap_or(f64::INFINITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyPoint;
    use approx::assert_relative_eq;

    fn camera() -> (Matrix3<f64>, WorldToCamera) {
        let k = Matrix3::new(900.0, 0.5, 640.0, 0.0, 880.0, 360.0, 0.0, 0.0, 1.0);
        let pose = WorldToCamera::from_parts(
            Vector3::new(0.1, -0.05, 1.2),
            Rotation3::from_euler_angles(0.15, -0.05, 0.1),
        );
        (k, pose)
    }

    #[test]
    fn decompose_recovers_calibration_and_pose() {
        let (k, pose) = camera();
        let p = ProjectionMatrix::from_pose(&k, pose);
        let (k_est, rotation, translation) = p.decompose().unwrap();
        assert_relative_eq!(k_est, k, epsilon = 1e-8);
        assert_relative_eq!(rotation, pose.rotation(), epsilon = 1e-10);
        assert_relative_eq!(translation, pose.translation(), epsilon = 1e-10);
    }

    #[test]
    fn decompose_ignores_sign_and_scale() {
        let (k, pose) = camera();
        let p = ProjectionMatrix(ProjectionMatrix::from_pose(&k, pose).0 * -0.003);
        let (k_est, pose_est) = p.calibration_and_pose().unwrap();
        assert_relative_eq!(k_est, k, epsilon = 1e-8);
        assert_relative_eq!(pose_est.center(), pose.center(), epsilon = 1e-10);
        assert_relative_eq!(
            pose_est.rotation().matrix().determinant(),
            1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn residual_is_squared_pixel_distance() {
        let (k, pose) = camera();
        let p = ProjectionMatrix::from_pose(&k, pose);
        let world = WorldPoint::new(0.2, 0.1, 2.0);
        let pixel = p.project(world).unwrap();
        let exact = FeatureWorldMatch(KeyPoint(pixel), world);
        let shifted = FeatureWorldMatch(KeyPoint::new(pixel.x + 3.0, pixel.y - 4.0), world);
        assert_relative_eq!(p.residual(&exact), 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.residual(&shifted), 25.0, epsilon = 1e-8);
        assert!(p.depth(world) > 0.0);
        assert!(ProjectionMatrix(-p.0).depth(world) > 0.0);
    }
}
