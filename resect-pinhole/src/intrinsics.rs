use crate::IntrinsicsError;
use core::fmt::Debug;
use resect_core::nalgebra::{DMatrix, Matrix2x3, Matrix3, Point2, Point3};
use resect_core::KeyPoint;

/// The capabilities resection and pose refinement need from a camera model.
///
/// Models outside of the pinhole family report `None` from
/// [`Intrinsics::calibration_matrix`]. Resection then treats the camera as
/// uncalibrated rather than inspecting its concrete type.
pub trait Intrinsics: Debug + Send + Sync {
    /// Short name of the camera model.
    fn model_name(&self) -> &'static str;

    /// False when the parameters cannot describe a real camera.
    fn is_valid(&self) -> bool;

    /// The `K` matrix of a pinhole-family camera.
    fn calibration_matrix(&self) -> Option<Matrix3<f64>>;

    fn has_distortion(&self) -> bool;

    /// Removes lens distortion from a pixel, returning the pixel an ideal pinhole
    /// camera with the same `K` would have observed.
    fn undistort_point(&self, point: KeyPoint) -> KeyPoint;

    /// Projects a point expressed in the camera frame to a pixel.
    ///
    /// Returns `None` for points which are not in front of the camera.
    fn project(&self, point: &Point3<f64>) -> Option<Point2<f64>>;

    /// Projects a point expressed in the camera frame to a pixel, while also retrieving
    /// the Jacobian of the pixel in respect to the point and in respect to
    /// [`Intrinsics::params`] (in that order).
    fn project_with_jacobians(
        &self,
        point: &Point3<f64>,
    ) -> Option<(Point2<f64>, Matrix2x3<f64>, DMatrix<f64>)>;

    /// The parameters refinement is allowed to change, in a model specific order.
    fn params(&self) -> Vec<f64>;

    fn update_from_params(&mut self, params: &[f64]) -> Result<(), IntrinsicsError>;

    fn box_clone(&self) -> Box<dyn Intrinsics>;

    /// Copies the parameters of `other` into `self` without changing what model
    /// `self` is.
    fn assign(&mut self, other: &dyn Intrinsics) -> Result<(), IntrinsicsError> {
        if other.model_name() != self.model_name() {
            return Err(IntrinsicsError::ModelMismatch {
                expected: self.model_name(),
                found: other.model_name(),
            });
        }
        self.update_from_params(&other.params())
    }
}

impl Clone for Box<dyn Intrinsics> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}
