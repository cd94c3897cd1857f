use crate::{
    CameraIntrinsics, DistortionFunction, Identity, Intrinsics, IntrinsicsError, NormalizedKeyPoint,
    Radial,
};
use resect_core::nalgebra::{DMatrix, Matrix2, Matrix2x3, Matrix3, Point2, Point3};
use resect_core::KeyPoint;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Number of linear parameters refined for every pinhole camera: `fx, fy, cx, cy`.
const LINEAR_PARAMETERS: usize = 4;

/// A pinhole camera with a radial distortion model `D` applied on the normalized image
/// plane.
///
/// The refinable parameters are `[fx, fy, cx, cy, k₁, …]`. Skew is part of the model
/// but stays fixed during refinement.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Pinhole<D> {
    pub intrinsics: CameraIntrinsics,
    pub distortion: D,
}

/// A pinhole camera without distortion.
pub type PinholeCamera = Pinhole<Identity>;
/// A pinhole camera with one radial distortion coefficient.
pub type PinholeRadialK1 = Pinhole<Radial<1>>;
/// A pinhole camera with three radial distortion coefficients.
pub type PinholeRadialK3 = Pinhole<Radial<3>>;

impl<D> Pinhole<D> {
    pub fn new(intrinsics: CameraIntrinsics, distortion: D) -> Self {
        Self {
            intrinsics,
            distortion,
        }
    }
}

impl PinholeCamera {
    pub fn undistorted(intrinsics: CameraIntrinsics) -> Self {
        Self::new(intrinsics, Identity)
    }
}

impl<D> Pinhole<D>
where
    D: DistortionFunction,
{
    /// Maps a pixel to its distortion-free normalized image coordinates.
    pub fn calibrate(&self, point: KeyPoint) -> Point2<f64> {
        let distorted = self.intrinsics.calibrate(point);
        Point2::from(self.distortion.undistort(distorted.coords))
    }

    /// Maps distortion-free normalized image coordinates to a pixel.
    pub fn uncalibrate(&self, point: Point2<f64>) -> KeyPoint {
        let distorted = self.distortion.distort(point.coords);
        self.intrinsics
            .uncalibrate(NormalizedKeyPoint(Point2::from(distorted)))
    }

    fn num_params(&self) -> usize {
        LINEAR_PARAMETERS + self.distortion.parameters().len()
    }
}

impl<D> Intrinsics for Pinhole<D>
where
    D: DistortionFunction,
{
    fn model_name(&self) -> &'static str {
        D::NAME
    }

    fn is_valid(&self) -> bool {
        self.intrinsics.is_valid() && self.distortion.parameters().iter().all(|k| k.is_finite())
    }

    fn calibration_matrix(&self) -> Option<Matrix3<f64>> {
        Some(self.intrinsics.matrix())
    }

    fn has_distortion(&self) -> bool {
        !self.distortion.is_identity()
    }

    fn undistort_point(&self, point: KeyPoint) -> KeyPoint {
        self.intrinsics
            .uncalibrate(NormalizedKeyPoint(self.calibrate(point)))
    }

    fn project(&self, point: &Point3<f64>) -> Option<Point2<f64>> {
        if point.z <= 0.0 {
            return None;
        }
        Some(self.uncalibrate(Point2::new(point.x / point.z, point.y / point.z)).0)
    }

    fn project_with_jacobians(
        &self,
        point: &Point3<f64>,
    ) -> Option<(Point2<f64>, Matrix2x3<f64>, DMatrix<f64>)> {
        if point.z <= 0.0 {
            return None;
        }
        let CameraIntrinsics {
            focals,
            principal_point,
            skew,
        } = self.intrinsics;
        let inv_z = point.z.recip();
        let normalized = point.coords.xy() * inv_z;
        let r2 = normalized.norm_squared();
        let scale = self.distortion.evaluate(r2);
        let distorted = normalized * scale;

        let pixel = Point2::new(
            focals.x * distorted.x + skew * distorted.y + principal_point.x,
            focals.y * distorted.y + principal_point.y,
        );

        // d(pixel)/d(distorted)
        let d_pixel = Matrix2::new(focals.x, skew, 0.0, focals.y);
        // d(normalized)/d(point)
        let d_normalized = Matrix2x3::new(
            inv_z,
            0.0,
            -point.x * inv_z * inv_z,
            0.0,
            inv_z,
            -point.y * inv_z * inv_z,
        );
        let jacobian_point = d_pixel * self.distortion.distort_jacobian(normalized) * d_normalized;

        let mut jacobian_params = DMatrix::zeros(2, self.num_params());
        jacobian_params[(0, 0)] = distorted.x;
        jacobian_params[(1, 1)] = distorted.y;
        jacobian_params[(0, 2)] = 1.0;
        jacobian_params[(1, 3)] = 1.0;
        let mut gradient = vec![0.0; self.distortion.parameters().len()];
        self.distortion.gradient(r2, &mut gradient);
        let undistorted_pixel = d_pixel * normalized;
        for (j, g) in gradient.into_iter().enumerate() {
            jacobian_params[(0, LINEAR_PARAMETERS + j)] = undistorted_pixel.x * g;
            jacobian_params[(1, LINEAR_PARAMETERS + j)] = undistorted_pixel.y * g;
        }

        Some((pixel, jacobian_point, jacobian_params))
    }

    fn params(&self) -> Vec<f64> {
        let CameraIntrinsics {
            focals,
            principal_point,
            ..
        } = self.intrinsics;
        let mut params = vec![focals.x, focals.y, principal_point.x, principal_point.y];
        params.extend_from_slice(self.distortion.parameters());
        params
    }

    fn update_from_params(&mut self, params: &[f64]) -> Result<(), IntrinsicsError> {
        if params.len() != self.num_params() {
            return Err(IntrinsicsError::ParameterCount {
                expected: self.num_params(),
                found: params.len(),
            });
        }
        self.intrinsics.focals.x = params[0];
        self.intrinsics.focals.y = params[1];
        self.intrinsics.principal_point.x = params[2];
        self.intrinsics.principal_point.y = params[3];
        self.distortion
            .parameters_mut()
            .copy_from_slice(&params[LINEAR_PARAMETERS..]);
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn Intrinsics> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use resect_core::nalgebra::{Vector2, Vector3};

    fn camera() -> PinholeRadialK3 {
        Pinhole::new(
            CameraIntrinsics::identity()
                .focals(Vector2::new(800.0, 780.0))
                .principal_point(Point2::new(320.0, 240.0))
                .skew(0.3),
            Radial::new([-0.12, 0.03, -0.002]),
        )
    }

    #[test]
    fn undistort_point_matches_ideal_projection() {
        let camera = camera();
        let point = Point3::new(0.3, -0.2, 1.5);
        let observed = KeyPoint(camera.project(&point).unwrap());
        let ideal = camera.intrinsics.matrix() * point.coords;
        let undistorted = camera.undistort_point(observed);
        assert_relative_eq!(
            undistorted.0,
            Point2::new(ideal.x / ideal.z, ideal.y / ideal.z),
            epsilon = 1e-9
        );
    }

    #[test]
    fn jacobians_match_finite_difference() {
        let camera = camera();
        let point = Point3::new(0.4, 0.1, 2.0);
        let (pixel, jacobian_point, jacobian_params) =
            camera.project_with_jacobians(&point).unwrap();
        assert_relative_eq!(pixel, camera.project(&point).unwrap(), epsilon = 1e-12);

        let h = 1e-6;
        for axis in 0..3 {
            let mut offset = Vector3::zeros();
            offset[axis] = h;
            let numeric = (camera.project(&(point + offset)).unwrap()
                - camera.project(&(point - offset)).unwrap())
                / (2.0 * h);
            assert_relative_eq!(
                numeric,
                jacobian_point.column(axis).into_owned(),
                epsilon = 1e-4
            );
        }

        let params = camera.params();
        for j in 0..params.len() {
            let mut plus = camera;
            let mut minus = camera;
            let mut p = params.clone();
            p[j] += h;
            plus.update_from_params(&p).unwrap();
            p[j] -= 2.0 * h;
            minus.update_from_params(&p).unwrap();
            let numeric =
                (plus.project(&point).unwrap() - minus.project(&point).unwrap()) / (2.0 * h);
            assert_relative_eq!(
                numeric,
                jacobian_params.fixed_slice::<2, 1>(0, j).into_owned(),
                epsilon = 1e-4
            );
        }
    }

    #[test]
    fn points_behind_are_not_projected() {
        assert!(camera().project(&Point3::new(0.0, 0.0, -1.0)).is_none());
        assert!(camera().project_with_jacobians(&Point3::new(0.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn assign_keeps_the_model() {
        let mut target = camera();
        let mut source = camera();
        source.intrinsics.focals.x = 810.0;
        source.distortion.0[0] = -0.1;
        target.assign(&source).unwrap();
        assert_eq!(target, source);

        let plain = PinholeCamera::undistorted(CameraIntrinsics::identity().focal(500.0));
        assert_eq!(
            target.assign(&plain),
            Err(IntrinsicsError::ModelMismatch {
                expected: "radial3",
                found: "pinhole"
            })
        );
        assert_eq!(
            target.update_from_params(&[1.0, 2.0]),
            Err(IntrinsicsError::ParameterCount {
                expected: 7,
                found: 2
            })
        );
    }

    #[test]
    fn validity_and_distortion_flags() {
        assert!(camera().is_valid());
        assert!(camera().has_distortion());
        let flat = PinholeCamera::undistorted(CameraIntrinsics::identity().focal(500.0));
        assert!(!flat.has_distortion());
        let broken = PinholeCamera::undistorted(CameraIntrinsics::identity().focal(0.0));
        assert!(!broken.is_valid());
    }
}
