//! # Resect Core
//!
//! Common types shared by every crate of the resection workspace: image keypoints,
//! homogeneous world and camera points, camera poses, 3x4 projection matrices and the
//! tags that describe where a 2D observation came from.
//!
//! The crates built on top of this one work together by speaking these types. A
//! correspondence between an image observation and a point of the reconstruction is a
//! [`FeatureWorldMatch`], a camera pose is a [`WorldToCamera`], and a linear camera is a
//! [`ProjectionMatrix`].
//!
//! ## Resection
//!
//! Given a set of [`FeatureWorldMatch`] we want to recover the pose of the camera which
//! observed them. Three points are enough when the camera calibration is known and six
//! points are enough when it is not:
//!
//! ```text
//!          X1        X2
//!           \       /
//!            \     /
//!        @@@@@a@@@b@@@@@   <- image plane
//!              \ /
//!               O          <- optical center
//! ```
//!
//! The [`ProjectionMatrix`] `P = K [R | t]` maps the homogeneous world point `X` to the
//! homogeneous pixel `x = P X`. It can be decomposed back into the calibration matrix
//! `K` and the [`WorldToCamera`] pose `(R, t)`.

mod describer;
mod image;
mod keypoint;
mod matches;
mod point;
mod pose;
mod projection;
mod so3;

pub use describer::*;
pub use image::*;
pub use keypoint::*;
pub use matches::*;
pub use nalgebra;
pub use point::*;
pub use pose::*;
pub use projection::*;
pub use sample_consensus;
pub use so3::*;
