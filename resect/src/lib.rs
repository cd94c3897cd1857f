//! # Resect
//!
//! Registers a single image into an existing 3d reconstruction from its 2d to 3d
//! correspondences, many of which are wrong.
//!
//! Localization happens in two steps, both driven by a [`Localizer`]:
//!
//! 1. [`Localizer::localize`] runs a robust resection. With a valid pinhole calibration
//!    it draws P3P hypotheses inside AC-RANSAC or LO-RANSAC (see [`RobustEstimator`]).
//!    Without one, it estimates a full projection matrix from six points inside
//!    AC-RANSAC and recovers the calibration by decomposing it. The estimate is only
//!    accepted if its inliers give it strong support.
//! 2. [`Localizer::refine_pose`] minimizes the reprojection error of the inliers with
//!    Levenberg-Marquardt, over the pose and optionally over the intrinsics.
//!
//! The correspondences and everything resection learns from them live in a
//! [`MatchData`] owned by the caller.
//!
//! ```
//! use resect::{DescriberType, ImageSize, KeyPoint, Localizer, MatchData, Pose, RobustEstimator};
//! use resect::{WorldPoint, WorldToCamera};
//!
//! let mut match_data = MatchData::new(
//!     vec![KeyPoint::new(320.0, 240.0)],
//!     vec![WorldPoint::new(0.0, 0.0, 5.0)],
//!     vec![DescriberType::Sift],
//! )
//! .unwrap();
//! let mut pose = WorldToCamera::identity();
//! // One correspondence is never enough.
//! assert!(!Localizer::default().localize(
//!     ImageSize::new(640, 480),
//!     None,
//!     &mut match_data,
//!     &mut pose,
//!     RobustEstimator::AcRansac,
//! ));
//! assert!(match_data.inliers.is_empty());
//! ```

mod error;
mod kernel;
mod localizer;
mod match_data;
mod settings;

pub use error::*;
pub use kernel::*;
pub use localizer::*;
pub use match_data::*;
pub use settings::*;

pub use resect_core::{sample_consensus::*, *};

pub use resect_consensus as consensus;
pub use resect_optimize as optimize;
pub use resect_pinhole as pinhole;
pub use resect_solvers as solvers;
