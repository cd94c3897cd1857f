use core::fmt::Debug;
use num_traits::Float;
use resect_core::nalgebra::{Matrix2, SVector, Vector2};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A radially symmetric lens distortion.
///
/// A normalized point `p` is distorted to `p · f(‖p‖²)`. The function is expressed in
/// terms of the squared radius so polynomial models stay polynomial.
pub trait DistortionFunction: Clone + Debug + Send + Sync + 'static {
    /// Short name used to tell camera models apart.
    const NAME: &'static str;

    fn parameters(&self) -> &[f64];

    fn parameters_mut(&mut self) -> &mut [f64];

    /// Scale factor `f(r²)` applied to a point at squared radius `r2`.
    fn evaluate(&self, r2: f64) -> f64;

    /// Evaluate `f(r²)` together with `df/d(r²)`.
    fn with_derivative(&self, r2: f64) -> (f64, f64);

    /// Gradient of `f(r²)` in respect to each parameter.
    fn gradient(&self, r2: f64, gradient: &mut [f64]);

    /// True when the function leaves every point where it is.
    fn is_identity(&self) -> bool {
        self.parameters().iter().all(|&k| k == 0.0)
    }

    /// Apply distortion to a normalized point.
    fn distort(&self, point: Vector2<f64>) -> Vector2<f64> {
        point * self.evaluate(point.norm_squared())
    }

    /// Jacobian of [`DistortionFunction::distort`] in respect to the normalized point.
    fn distort_jacobian(&self, point: Vector2<f64>) -> Matrix2<f64> {
        let (f, df) = self.with_derivative(point.norm_squared());
        Matrix2::identity() * f + point * point.transpose() * (2.0 * df)
    }

    /// Numerically remove distortion from a normalized point.
    ///
    /// Solves `s · f(s²) = ‖q‖` for the undistorted radius `s` with Newton-Raphson
    /// starting from `s₀ = ‖q‖` and rescales `q` onto it.
    fn undistort(&self, point: Vector2<f64>) -> Vector2<f64> {
        // Maxmimum number of iterations to use in Newton-Raphson inversion.
        const MAX_ITERATIONS: usize = 100;

        let target = point.norm();
        if target == 0.0 || self.is_identity() {
            return point;
        }
        let mut s = target;
        for _ in 0..MAX_ITERATIONS {
            let (f, df) = self.with_derivative(s * s);
            let derivative = f + 2.0 * s * s * df;
            if derivative == 0.0 || !derivative.is_finite() {
                break;
            }
            let delta = (s * f - target) / derivative;
            s -= delta;
            if Float::abs(delta) <= f64::EPSILON * s.abs() {
                break;
            }
        }
        point * (s / target)
    }
}

/// No distortion at all.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Identity;

impl DistortionFunction for Identity {
    const NAME: &'static str = "pinhole";

    fn parameters(&self) -> &[f64] {
        &[]
    }

    fn parameters_mut(&mut self) -> &mut [f64] {
        &mut []
    }

    fn evaluate(&self, _: f64) -> f64 {
        1.0
    }

    fn with_derivative(&self, _: f64) -> (f64, f64) {
        (1.0, 0.0)
    }

    fn gradient(&self, _: f64, _: &mut [f64]) {}

    fn is_identity(&self) -> bool {
        true
    }
}

/// Polynomial radial distortion with `N` coefficients.
///
/// $$
/// f(r^2) = 1 + k_1 r^2 + k_2 r^4 + ⋯ + k_N r^{2N}
/// $$
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Radial<const N: usize>(pub SVector<f64, N>);

impl<const N: usize> Default for Radial<N> {
    fn default() -> Self {
        Self(SVector::zeros())
    }
}

impl<const N: usize> Radial<N> {
    pub fn new(coefficients: [f64; N]) -> Self {
        Self(SVector::from(coefficients))
    }
}

impl<const N: usize> DistortionFunction for Radial<N> {
    const NAME: &'static str = match N {
        1 => "radial1",
        3 => "radial3",
        _ => "radial",
    };

    fn parameters(&self) -> &[f64] {
        self.0.as_slice()
    }

    fn parameters_mut(&mut self) -> &mut [f64] {
        self.0.as_mut_slice()
    }

    fn evaluate(&self, r2: f64) -> f64 {
        self.with_derivative(r2).0
    }

    /// Simultaneously compute value and first derivative with Horner's scheme.
    fn with_derivative(&self, r2: f64) -> (f64, f64) {
        let mut result = 0.0;
        let mut derivative = 0.0;
        for &k in self.0.iter().rev() {
            derivative = derivative * r2 + result;
            result = result * r2 + k;
        }
        // The loop evaluated `k1 + k2 r² + ...`, shift it by one power and add the unit term.
        (1.0 + result * r2, result + derivative * r2)
    }

    fn gradient(&self, r2: f64, gradient: &mut [f64]) {
        let mut factor = r2;
        for g in gradient.iter_mut().take(N) {
            *g = factor;
            factor *= r2;
        }
    }
}
