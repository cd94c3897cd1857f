use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::{Matrix3, Rotation3, Unit, Vector3};
use num_traits::Float;
#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A member of the lie algebra so(3), the tangent space of 3d rotations.
///
/// Used by the pose refiner to get three unconstrained variables for the rotational
/// degrees of freedom. Rotations are stored as rotation matrices everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Skew3(pub Vector3<f64>);

impl Skew3 {
    /// Converts the Skew3 to a Rotation3 matrix.
    pub fn rotation(self) -> Rotation3<f64> {
        self.into()
    }

    /// First order exponential map, only valid for tiny rotations.
    pub fn rotation_small(self) -> Rotation3<f64> {
        Rotation3::from_matrix(&(Matrix3::identity() + self.hat()))
    }

    /// This converts the Skew3 into its skew-symmetric matrix form.
    pub fn hat(self) -> Matrix3<f64> {
        self.0.cross_matrix()
    }

    /// This converts the Skew3 into its squared skew-symmetric matrix form efficiently.
    #[rustfmt::skip]
    pub fn hat2(self) -> Matrix3<f64> {
        let w = self.0;
        let w11 = w.x * w.x;
        let w12 = w.x * w.y;
        let w13 = w.x * w.z;
        let w22 = w.y * w.y;
        let w23 = w.y * w.z;
        let w33 = w.z * w.z;
        Matrix3::new(
            -w22 - w33,     w12,           w13,
             w12,          -w11 - w33,     w23,
             w13,           w23,          -w11 - w22,
        )
    }

    /// The left jacobian of SO(3) at this tangent vector.
    ///
    /// `exp(w + dw) ≈ exp(J dw) exp(w)`
    pub fn left_jacobian(self) -> Matrix3<f64> {
        let theta2 = self.0.norm_squared();
        if theta2 <= f64::epsilon() {
            return Matrix3::identity() + 0.5 * self.hat();
        }
        let theta = theta2.sqrt();
        let a = (1.0 - theta.cos()) / theta2;
        let b = (theta - theta.sin()) / (theta2 * theta);
        Matrix3::identity() + a * self.hat() + b * self.hat2()
    }

    /// The jacobian of the output of a rotation in respect to a
    /// left-multiplied perturbation of the rotation itself.
    ///
    /// `y = exp(w) R x`
    ///
    /// `dy/dw = -hat(y)` at `w = 0`
    pub fn jacobian_self(y: Vector3<f64>) -> Matrix3<f64> {
        -y.cross_matrix()
    }
}

/// This is the exponential map.
impl From<Skew3> for Rotation3<f64> {
    fn from(w: Skew3) -> Self {
        // This check is done to avoid the degenerate case where the angle is near zero.
        let theta2 = w.0.norm_squared();
        if theta2 <= f64::epsilon() {
            w.rotation_small()
        } else {
            let theta = theta2.sqrt();
            let axis = Unit::new_unchecked(w.0 / theta);
            Self::from_axis_angle(&axis, theta)
        }
    }
}

/// This is the log map.
impl From<Rotation3<f64>> for Skew3 {
    fn from(r: Rotation3<f64>) -> Self {
        let skew3 = r.scaled_axis();
        let skew3 = if skew3.iter().any(|n| n.is_nan()) {
            Vector3::zeros()
        } else {
            skew3
        };
        Self(skew3)
    }
}
