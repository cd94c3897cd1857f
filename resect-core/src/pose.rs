use crate::{CameraPoint, FeatureWorldMatch, ImagePoint, Projective, Skew3, WorldPoint};
use derive_more::{AsMut, AsRef, From, Into};
use nalgebra::{IsometryMatrix3, Matrix4, Point3, Rotation3, Vector3, Vector6};
use sample_consensus::Model;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// This trait is implemented by the poses in this library:
///
/// * [`WorldToCamera`] - Transforms [`WorldPoint`] into [`CameraPoint`]
/// * [`CameraToWorld`] - Transforms [`CameraPoint`] into [`WorldPoint`]
pub trait Pose: From<IsometryMatrix3<f64>> + Clone + Copy {
    type InputPoint: Projective;
    type OutputPoint: Projective;
    type Inverse: Pose;

    /// Retrieve the isometry.
    fn isometry(self) -> IsometryMatrix3<f64>;

    /// Creates a pose with no change in position or orientation.
    fn identity() -> Self {
        IsometryMatrix3::identity().into()
    }

    /// Takes the inverse of the pose.
    fn inverse(self) -> Self::Inverse {
        self.isometry().inverse().into()
    }

    /// Create the pose from rotation and translation.
    fn from_parts(translation: Vector3<f64>, rotation: Rotation3<f64>) -> Self {
        IsometryMatrix3::from_parts(translation.into(), rotation).into()
    }

    /// Retrieve the homogeneous matrix.
    fn homogeneous(self) -> Matrix4<f64> {
        self.isometry().to_homogeneous()
    }

    /// Retrieve the se(3) representation of the pose (translation before rotation).
    fn se3(self) -> Vector6<f64> {
        let isometry = self.isometry();
        let t = isometry.translation.vector;
        let r: Skew3 = isometry.rotation.into();
        Vector6::new(t.x, t.y, t.z, r.x, r.y, r.z)
    }

    /// Transform the given point to an output point.
    fn transform(self, input: Self::InputPoint) -> Self::OutputPoint {
        <Self::OutputPoint as Projective>::from_homogeneous(
            self.homogeneous() * input.homogeneous(),
        )
    }
}

/// The pose of the world relative to the camera.
///
/// This maps [`WorldPoint`] into [`CameraPoint`]: `Xc = R Xw + t`. The
/// optical center of the camera in world coordinates is `-Rᵀ t`, see
/// [`WorldToCamera::center`].
#[derive(Debug, Clone, Copy, PartialEq, AsMut, AsRef, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct WorldToCamera(pub IsometryMatrix3<f64>);

impl WorldToCamera {
    /// Builds the pose of a camera with the given orientation located at `center`.
    pub fn from_rotation_center(rotation: Rotation3<f64>, center: Point3<f64>) -> Self {
        Self::from_parts(-(rotation * center.coords), rotation)
    }

    /// The optical center of the camera in world coordinates.
    pub fn center(&self) -> Point3<f64> {
        let rotation = self.0.rotation;
        Point3::from(-(rotation.transpose() * self.0.translation.vector))
    }

    pub fn rotation(&self) -> Rotation3<f64> {
        self.0.rotation
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.0.translation.vector
    }
}

impl Pose for WorldToCamera {
    type InputPoint = WorldPoint;
    type OutputPoint = CameraPoint;
    type Inverse = CameraToWorld;

    #[inline(always)]
    fn isometry(self) -> IsometryMatrix3<f64> {
        self.into()
    }
}

/// Squared distance on the normalized image plane between the observation and the
/// projection of the world point. Points behind the camera get an infinite residual.
impl<P> Model<FeatureWorldMatch<P>> for WorldToCamera
where
    P: ImagePoint,
{
    #[inline(always)]
    fn residual(&self, data: &FeatureWorldMatch<P>) -> f64 {
        let FeatureWorldMatch(observation, world) = data;
        let camera = self.transform(*world).0;
        let depth = camera.z * camera.w;
        if depth <= 0.0 {
            return f64::INFINITY;
        }
        let projected = camera.xy() / camera.z;
        (projected - observation.image_point().coords).norm_squared()
    }
}

/// The pose of the camera relative to the world.
///
/// This transforms camera points (with depth as `z`) into world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, AsMut, AsRef, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraToWorld(pub IsometryMatrix3<f64>);

impl Pose for CameraToWorld {
    type InputPoint = CameraPoint;
    type OutputPoint = WorldPoint;
    type Inverse = WorldToCamera;

    #[inline(always)]
    fn isometry(self) -> IsometryMatrix3<f64> {
        self.into()
    }
}
