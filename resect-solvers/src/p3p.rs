// Copyright (c) 2018 Michael Persson
// Adapted to openMVG by Romain Janvier and Pierre Moulon
// Adapted to Rust by Matthieu Pizenberg

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use arrayvec::ArrayVec;
use num_traits::Float;
use resect_core::{
    nalgebra::{Matrix3, Point3, Rotation3, Unit, Vector3},
    sample_consensus::Estimator,
    FeatureWorldMatch, Pose, Projective, WorldToCamera,
};
use resect_pinhole::NormalizedKeyPoint;

type Mat3 = Matrix3<f64>;
type Vec3 = Vector3<f64>;

/// Calibrated three point pose solver.
///
/// Implementation of "Lambda Twist: An Accurate Fast Robust Perspective Three Point (P3P)
/// Solver", Persson, M. and Nordberg, K. ECCV 2018.
///
/// Returns 0 to 4 poses solving `λᵢ yᵢ = R xᵢ + t` where `xᵢ` are world points, `yᵢ` the
/// bearings of the normalized keypoints and `λᵢ` the (positive) depths.
#[derive(Copy, Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct LambdaTwist {
    /// Number of Gauss-Newton iterations used to polish the depths.
    /// Rarely improves after two iterations.
    pub gauss_newton_iterations: usize,
    /// Iterations spent projecting the estimated rotation onto SO(3).
    pub rotation_convergence_iterations: usize,
    /// Convergence threshold of the projection onto SO(3).
    pub rotation_convergence_epsilon: f64,
}

impl LambdaTwist {
    /// Creates a default lambda twist with 5 iterations of Gauss-Newton.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the [`LambdaTwist::gauss_newton_iterations`].
    #[must_use]
    pub fn gauss_newton_iterations(self, gauss_newton_iterations: usize) -> Self {
        Self {
            gauss_newton_iterations,
            ..self
        }
    }

    /// Sets the [`LambdaTwist::rotation_convergence_iterations`].
    #[must_use]
    pub fn rotation_convergence_iterations(self, rotation_convergence_iterations: usize) -> Self {
        Self {
            rotation_convergence_iterations,
            ..self
        }
    }

    /// Sets the [`LambdaTwist::rotation_convergence_epsilon`].
    #[must_use]
    pub fn rotation_convergence_epsilon(self, rotation_convergence_epsilon: f64) -> Self {
        Self {
            rotation_convergence_epsilon,
            ..self
        }
    }

    /// Computes every pose consistent with the three world points and bearings.
    pub fn poses(
        &self,
        world: [Point3<f64>; 3],
        bearings: [Unit<Vec3>; 3],
    ) -> ArrayVec<WorldToCamera, 4> {
        let d12 = world[0] - world[1];
        let d13 = world[0] - world[2];
        let d23 = world[1] - world[2];

        let geometry = Triangle {
            a12: d12.norm_squared(),
            a13: d13.norm_squared(),
            a23: d23.norm_squared(),
            b12: -2.0 * bearings[0].dot(&bearings[1]),
            b13: -2.0 * bearings[2].dot(&bearings[0]),
            b23: -2.0 * bearings[1].dot(&bearings[2]),
        };

        // The world frame built from the point differences, inverted once for all solutions.
        let x_inv = match frame_matrix(d12, d13).try_inverse() {
            Some(x_inv) => x_inv,
            None => return ArrayVec::new(),
        };

        geometry
            .depths()
            .into_iter()
            .map(|lambda| geometry.refine(lambda, self.gauss_newton_iterations))
            .map(|lambda| {
                let ry1 = lambda[0] * bearings[0].into_inner();
                let ry2 = lambda[1] * bearings[1].into_inner();
                let ry3 = lambda[2] * bearings[2].into_inner();
                let rotation = frame_matrix(ry1 - ry2, ry1 - ry3) * x_inv;
                let rotation = Rotation3::from_matrix_eps(
                    &rotation,
                    self.rotation_convergence_epsilon,
                    self.rotation_convergence_iterations,
                    Rotation3::identity(),
                );
                WorldToCamera::from_parts(ry1 - rotation * world[0].coords, rotation)
            })
            .collect()
    }
}

impl Default for LambdaTwist {
    fn default() -> Self {
        Self {
            gauss_newton_iterations: 5,
            rotation_convergence_iterations: 100,
            rotation_convergence_epsilon: 1e-12,
        }
    }
}

impl Estimator<FeatureWorldMatch<NormalizedKeyPoint>> for LambdaTwist {
    type Model = WorldToCamera;
    type ModelIter = ArrayVec<WorldToCamera, 4>;
    const MIN_SAMPLES: usize = 3;

    /// Uses the first three correspondences. Yields nothing if fewer are given or
    /// a world point lies at infinity.
    fn estimate<I>(&self, data: I) -> Self::ModelIter
    where
        I: Iterator<Item = FeatureWorldMatch<NormalizedKeyPoint>> + Clone,
    {
        let samples: ArrayVec<(Point3<f64>, Unit<Vec3>), 3> = data
            .take(3)
            .filter_map(|FeatureWorldMatch(keypoint, world)| {
                Some((world.point()?, keypoint.bearing()))
            })
            .collect();
        match samples.as_slice() {
            &[(w0, b0), (w1, b1), (w2, b2)] => self.poses([w0, w1, w2], [b0, b1, b2]),
            _ => ArrayVec::new(),
        }
    }
}

/// `[d1 | d2 | d1 × d2]`
#[rustfmt::skip]
fn frame_matrix(d1: Vec3, d2: Vec3) -> Mat3 {
    let d3 = d1.cross(&d2);
    Mat3::new(
        d1[0], d2[0], d3[0],
        d1[1], d2[1], d3[1],
        d1[2], d2[2], d3[2],
    )
}

/// Squared side lengths of the world triangle (`aij`) and `-2 cos` of the angles between
/// the bearings (`bij`).
#[derive(Copy, Clone, Debug)]
struct Triangle {
    a12: f64,
    a13: f64,
    a23: f64,
    b12: f64,
    b13: f64,
    b23: f64,
}

impl Triangle {
    /// Candidate depth triplets, between 0 and 4 of them.
    fn depths(&self) -> ArrayVec<Vec3, 4> {
        let Triangle {
            a12,
            a13,
            a23,
            b12,
            b13,
            b23,
        } = *self;
        let c12 = -0.5 * b12;
        let c31 = -0.5 * b13;
        let c23 = -0.5 * b23;
        let blob = c12 * c23 * c31 - 1.0;
        let s12_sqr = 1.0 - c12 * c12;
        let s23_sqr = 1.0 - c23 * c23;
        let s31_sqr = 1.0 - c31 * c31;

        // Cubic of equation (10) in the paper.
        let p3 = a13 * (a23 * s31_sqr - a13 * s23_sqr);
        let p2 = 2.0 * blob * a23 * a13
            + a13 * (2.0 * a12 + a13) * s23_sqr
            + a23 * (a23 - a12) * s31_sqr;
        let p1 = a23 * (a13 - a23) * s12_sqr
            - a12 * a12 * s23_sqr
            - 2.0 * a12 * (blob * a23 + a13 * s23_sqr);
        let p0 = a12 * (a12 * s23_sqr - a23 * s12_sqr);
        let g = cube_root(p2 / p3, p1 / p3, p0 / p3);

        // D0 of the paper, singular by construction.
        #[rustfmt::skip]
        let d0 = Mat3::new(
            a23 * (1.0 - g),  -(a23 * c12),              a23 * c31 * g,
            -(a23 * c12),     a23 - a12 + a13 * g,       -c23 * (a13 * g - a12),
            a23 * c31 * g,    -c23 * (a13 * g - a12),    g * (a13 - a23) - a12,
        );
        let (vectors, values) = eigen_decomposition_singular(d0);
        let ratio = 0.0_f64.max(-values[1] / values[0]).sqrt();

        let mut lambdas = ArrayVec::new();
        for ratio in [ratio, -ratio] {
            // Equation (15) in the paper.
            let w2 = 1.0 / (ratio * vectors.m12 - vectors.m11);
            let w0 = w2 * (vectors.m21 - ratio * vectors.m22);
            let w1 = w2 * (vectors.m31 - ratio * vectors.m32);
            let a = 1.0 / ((a13 - a12) * w1 * w1 - a12 * b13 * w1 - a12);
            let b = a * (a13 * b12 * w1 - a12 * b13 * w0 - 2.0 * w0 * w1 * (a12 - a13));
            let c = a * ((a13 - a12) * w0 * w0 + a13 * b12 * w0 + a13);
            if b * b - 4.0 * c < 0.0 {
                continue;
            }
            let (_, tau1, tau2) = root2real(b, c);
            for tau in [tau1, tau2] {
                if tau <= 0.0 {
                    continue;
                }
                // Equation (16) in the paper.
                let d = a23 / (tau * (b23 + tau) + 1.0);
                if d <= 0.0 {
                    continue;
                }
                let l2 = d.sqrt();
                let l3 = tau * l2;
                let l1 = w0 * l2 + w1 * l3;
                if l1 >= 0.0 {
                    lambdas.push(Vec3::new(l1, l2, l3));
                }
            }
        }
        lambdas
    }

    fn residual(&self, l: &Vec3) -> Vec3 {
        let (l1, l2, l3) = (l.x, l.y, l.z);
        Vec3::new(
            l1 * l1 + l2 * l2 + self.b12 * l1 * l2 - self.a12,
            l1 * l1 + l3 * l3 + self.b13 * l1 * l3 - self.a13,
            l2 * l2 + l3 * l3 + self.b23 * l2 * l3 - self.a23,
        )
    }

    /// Polishes a depth triplet with Gauss-Newton, stopping as soon as a step does not
    /// reduce the L1 norm of the residual.
    fn refine(&self, mut lambda: Vec3, iterations: usize) -> Vec3 {
        let mut residual = self.residual(&lambda);
        for _ in 0..iterations {
            if residual.lp_norm(1) < 1e-10 {
                break;
            }
            let (l1, l2, l3) = (lambda.x, lambda.y, lambda.z);
            let dr1dl1 = 2.0 * l1 + self.b12 * l2;
            let dr1dl2 = 2.0 * l2 + self.b12 * l1;
            let dr2dl1 = 2.0 * l1 + self.b13 * l3;
            let dr2dl3 = 2.0 * l3 + self.b13 * l1;
            let dr3dl2 = 2.0 * l2 + self.b23 * l3;
            let dr3dl3 = 2.0 * l3 + self.b23 * l2;
            let det = 1.0 / (-dr1dl1 * dr2dl3 * dr3dl2 - dr1dl2 * dr2dl1 * dr3dl3);

            // Adjugate of the residual jacobian.
            #[rustfmt::skip]
            let adjugate = Mat3::new(
                -dr2dl3 * dr3dl2, -dr1dl2 * dr3dl3,  dr1dl2 * dr2dl3,
                -dr2dl1 * dr3dl3,  dr1dl1 * dr3dl3, -dr1dl1 * dr2dl3,
                 dr2dl1 * dr3dl2, -dr1dl1 * dr3dl2, -dr1dl2 * dr2dl1,
            );
            let candidate = lambda - det * (adjugate * residual);
            let candidate_residual = self.residual(&candidate);
            if candidate_residual.lp_norm(1) > residual.lp_norm(1) {
                break;
            }
            lambda = candidate;
            residual = candidate_residual;
        }
        lambda
    }
}

/// Real roots of `r² + b r + c = 0`, returned as `(roots_are_real, r1, r2)`.
fn root2real(b: f64, c: f64) -> (bool, f64, f64) {
    let discriminant = b * b - 4.0 * c;
    if discriminant < 0.0 {
        let root = 0.5 * b;
        (false, root, root)
    } else if b < 0.0 {
        let y = Float::sqrt(discriminant);
        (true, 0.5 * (-b + y), 0.5 * (-b - y))
    } else {
        let y = Float::sqrt(discriminant);
        (true, 2.0 * c / (-b + y), 2.0 * c / (-b - y))
    }
}

/// The root of `r³ + b r² + c r + d = 0` with the steepest derivative.
///
/// Newton-Raphson from an initial guess chosen from the stationary points of the cubic:
/// when there are two of them, a second order expansion around the one with the right
/// sign gives the starting point.
#[allow(clippy::many_single_char_names)]
fn cube_root(b: f64, c: f64, d: f64) -> f64 {
    let cubic = |r: f64| ((r + b) * r + c) * r + d;
    let slope = |r: f64| (3.0 * r + 2.0 * b) * r + c;

    let mut r0 = if b * b >= 3.0 * c {
        let v = (b * b - 3.0 * c).sqrt();
        let t1 = (-b - v) / 3.0;
        let k1 = cubic(t1);
        if k1 > 0.0 {
            t1 - (-k1 / (3.0 * t1 + b)).sqrt()
        } else {
            let t2 = (-b + v) / 3.0;
            t2 + (-cubic(t2) / (3.0 * t2 + b)).sqrt()
        }
    } else {
        let r = -b / 3.0;
        if slope(r).abs() < 1e-4 {
            r + 1.0
        } else {
            r
        }
    };

    // At least 7 iterations, at most 50.
    for _ in 0..7 {
        r0 -= cubic(r0) / slope(r0);
    }
    for _ in 0..43 {
        let fx = cubic(r0);
        if fx.abs() <= 1e-13 {
            break;
        }
        r0 -= fx / slope(r0);
    }
    r0
}

/// Eigen decomposition of a symmetric matrix with a zero eigenvalue.
///
/// The eigenvectors are the columns of the first matrix, sorted by decreasing eigenvalue
/// magnitude, the last one being the null vector.
fn eigen_decomposition_singular(x: Mat3) -> (Mat3, Vec3) {
    #[rustfmt::skip]
    let v3 = Vec3::new(
        x[1] * x[5] - x[2] * x[4],
        x[2] * x[3] - x[5] * x[0],
        x[4] * x[0] - x[1] * x[3],
    )
    .normalize();

    let x12_sqr = x.m12 * x.m12;
    let b = -x.m11 - x.m22 - x.m33;
    let c = -x12_sqr - x.m13 * x.m13 - x.m23 * x.m23 + x.m11 * (x.m22 + x.m33) + x.m22 * x.m33;
    let (_, mut e1, mut e2) = root2real(b, c);
    if e1.abs() < e2.abs() {
        core::mem::swap(&mut e1, &mut e2);
    }

    let mx0011 = -x.m11 * x.m22;
    let prec_0 = x.m12 * x.m23 - x.m13 * x.m22;
    let prec_1 = x.m12 * x.m13 - x.m11 * x.m23;
    let eigen_vector = |e: f64| {
        let tmp = 1.0 / (e * (x.m11 + x.m22) + mx0011 - e * e + x12_sqr);
        let a1 = -(e * x.m13 + prec_0) * tmp;
        let a2 = -(e * x.m23 + prec_1) * tmp;
        Vec3::new(a1, a2, 1.0).normalize()
    };

    let vectors = Mat3::from_columns(&[eigen_vector(e1), eigen_vector(e2), v3]);
    (vectors, Vec3::new(e1, e2, 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_root_solves_cubic() {
        // (r - 1)(r - 2)(r + 3) = r³ - 7r + 6
        let r = cube_root(0.0, -7.0, 6.0);
        assert!(((r * r - 7.0) * r + 6.0).abs() < 1e-10);
    }

    #[test]
    fn singular_eigen_decomposition() {
        let u = Vec3::new(1.0, 2.0, 2.0).normalize();
        let v = Vec3::new(2.0, 1.0, -2.0).normalize();
        let m = 3.0 * u * u.transpose() - 1.5 * v * v.transpose();
        let (vectors, values) = eigen_decomposition_singular(m);
        for i in 0..3 {
            let column = vectors.column(i).into_owned();
            assert!((m * column - values[i] * column).norm() < 1e-10);
        }
        assert!((values[0] - 3.0).abs() < 1e-10);
    }
}
