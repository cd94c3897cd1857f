use crate::{image_normalizer, LocalizeError, LocalizerSettings, MatchData, ResectionKernel};
use core::fmt;
use core::str::FromStr;
use log::*;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use resect_consensus::{has_strong_support, AcRansac, LoRansac, ScoreEvaluator};
use resect_core::nalgebra::Matrix3;
use resect_core::{ImageSize, KeyPoint, ProjectionMatrix, WorldToCamera};
use resect_optimize::{BundleAdjuster, MinimalScene, RefineParameters};
use resect_pinhole::Intrinsics;
use resect_solvers::{LambdaTwist, ResectionSolver, SixPoint};
use std::borrow::Cow;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The robust estimation strategy of a calibrated resection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-serialize", serde(rename_all = "lowercase"))]
pub enum RobustEstimator {
    /// A contrario RANSAC, which also estimates the inlier threshold.
    AcRansac,
    /// LO-RANSAC with a fixed inlier threshold.
    LoRansac,
}

impl Default for RobustEstimator {
    fn default() -> Self {
        Self::AcRansac
    }
}

impl RobustEstimator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AcRansac => "acransac",
            Self::LoRansac => "loransac",
        }
    }
}

impl fmt::Display for RobustEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RobustEstimator {
    type Err = LocalizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "acransac" => Ok(Self::AcRansac),
            "loransac" => Ok(Self::LoRansac),
            _ => Err(LocalizeError::UnknownEstimator(s.to_owned())),
        }
    }
}

/// Localizes single images in a reconstruction and refines their pose.
#[derive(Debug, Clone, Copy, Default)]
pub struct Localizer {
    pub settings: LocalizerSettings,
}

impl Localizer {
    pub fn new(settings: LocalizerSettings) -> Self {
        Self { settings }
    }

    /// Estimates the pose of the camera which observed the correspondences of `match_data`.
    ///
    /// Without valid pinhole intrinsics, a full projection matrix is estimated from six
    /// points with AC-RANSAC on pixels conditioned by the image size, whatever the
    /// `estimator`. With them, observations are undistorted and normalized and a
    /// P3P solver runs inside the requested `estimator`.
    ///
    /// `match_data.inliers` and `match_data.error_max` are always overwritten. On
    /// success, the projection matrix is stored in `match_data` and `pose` is replaced.
    /// Returns `false` when the estimated camera lacks strong support, leaving `pose`
    /// untouched.
    pub fn localize(
        &self,
        image_size: ImageSize,
        intrinsics: Option<&dyn Intrinsics>,
        match_data: &mut MatchData,
        pose: &mut WorldToCamera,
        estimator: RobustEstimator,
    ) -> bool {
        match_data.inliers.clear();
        let precision = if match_data.error_max.is_finite() {
            match_data.error_max * match_data.error_max
        } else {
            f64::INFINITY
        };

        let calibration = intrinsics
            .filter(|intrinsics| intrinsics.is_valid())
            .and_then(|intrinsics| Some((intrinsics, intrinsics.calibration_matrix()?)));
        let (model, min_samples) = match calibration {
            None => (
                self.resect_uncalibrated(image_size, match_data, precision, estimator),
                <SixPoint as ResectionSolver>::MIN_SAMPLES,
            ),
            Some((intrinsics, calibration)) => (
                self.resect_calibrated(intrinsics, calibration, match_data, precision, estimator),
                <LambdaTwist as ResectionSolver>::MIN_SAMPLES,
            ),
        };

        let supported = model.is_some()
            && has_strong_support(
                &match_data.inliers,
                match_data.describer_types(),
                min_samples,
            );
        info!(
            "Robust resection {}: threshold {} px, {} points, {} inliers",
            if supported { "succeeded" } else { "failed" },
            match_data.error_max,
            match_data.len(),
            match_data.inliers.len()
        );

        let model = match model {
            Some(model) if supported => model,
            _ => {
                debug!(
                    "resection lacks strong support with {} inliers for a minimal sample of {}",
                    match_data.inliers.len(),
                    min_samples
                );
                return false;
            }
        };
        let (calibration, estimated) = match model.calibration_and_pose() {
            Some(decomposed) => decomposed,
            None => {
                debug!("cannot decompose projection matrix {:?}", model.0);
                return false;
            }
        };
        trace!("decomposed calibration {:?}", calibration);

        match_data.projection_matrix = model;
        *pose = estimated;
        true
    }

    fn resect_uncalibrated(
        &self,
        image_size: ImageSize,
        match_data: &mut MatchData,
        precision: f64,
        estimator: RobustEstimator,
    ) -> Option<ProjectionMatrix> {
        if estimator != RobustEstimator::AcRansac {
            debug!(
                "no valid calibration, resecting with AC-RANSAC instead of {}",
                estimator
            );
        }
        if image_size.area() <= 0.0 {
            debug!("cannot condition observations of an empty image");
            return None;
        }
        let kernel = ResectionKernel::new(
            SixPoint::new(),
            match_data.points(),
            match_data.world_points(),
            image_normalizer(image_size),
        )?;
        let mut ransac = AcRansac::new(Pcg64::seed_from_u64(self.settings.seed));
        let output = ransac.estimate(&kernel, match_data.max_iterations, precision);
        match_data.error_max = output.error_max;
        match_data.inliers = output.inliers;
        output.model
    }

    fn resect_calibrated(
        &self,
        intrinsics: &dyn Intrinsics,
        calibration: Matrix3<f64>,
        match_data: &mut MatchData,
        precision: f64,
        estimator: RobustEstimator,
    ) -> Option<ProjectionMatrix> {
        let points: Cow<'_, [KeyPoint]> = if intrinsics.has_distortion() {
            Cow::Owned(
                match_data
                    .points()
                    .iter()
                    .map(|&point| intrinsics.undistort_point(point))
                    .collect(),
            )
        } else {
            Cow::Borrowed(match_data.points())
        };
        let normalizer = match calibration.try_inverse() {
            Some(normalizer) => normalizer,
            None => {
                debug!("calibration matrix {:?} is singular", calibration);
                return None;
            }
        };
        let kernel = ResectionKernel::new(
            LambdaTwist::new(),
            &points,
            match_data.world_points(),
            normalizer,
        )?;

        match estimator {
            RobustEstimator::AcRansac => {
                let mut ransac = AcRansac::new(Pcg64::seed_from_u64(self.settings.seed));
                let output = ransac.estimate(&kernel, match_data.max_iterations, precision);
                match_data.error_max = output.error_max;
                match_data.inliers = output.inliers;
                output.model
            }
            RobustEstimator::LoRansac => {
                if match_data.error_max.is_infinite() {
                    match_data.error_max = self.settings.lo_ransac_default_threshold;
                    debug!(
                        "LO-RANSAC needs a threshold, using {} px",
                        match_data.error_max
                    );
                }
                // Pixels to the normalized frame through the horizontal focal length only.
                let scale = kernel.normalizer()[(0, 0)];
                let threshold = match_data.error_max * match_data.error_max * scale * scale;
                let scorer = ScoreEvaluator::new(threshold);
                let mut ransac = LoRansac::with_settings(
                    Pcg64::seed_from_u64(self.settings.seed),
                    self.settings.lo_ransac,
                );
                let (model, inliers) =
                    ransac.estimate(&kernel, &scorer, match_data.max_iterations)?;
                match_data.inliers = inliers;
                Some(model)
            }
        }
    }

    /// Refines `pose`, and optionally `intrinsics`, on the inliers of `match_data`.
    ///
    /// The refinement works on a copy of the intrinsics, whose parameters are copied
    /// back into `intrinsics` on success. Returns `false` when the refinement failed,
    /// in which case neither `pose` nor `intrinsics` changed. Nothing is refined
    /// when both flags are off, which succeeds.
    pub fn refine_pose(
        &self,
        intrinsics: &mut dyn Intrinsics,
        pose: &mut WorldToCamera,
        match_data: &MatchData,
        refine_pose: bool,
        refine_intrinsics: bool,
    ) -> bool {
        let mut mask = RefineParameters::NONE;
        if refine_pose {
            mask |= RefineParameters::POSE;
        }
        if refine_intrinsics {
            mask |= RefineParameters::INTRINSICS;
        }

        let mut scene = MinimalScene::new(
            *pose,
            intrinsics.box_clone(),
            match_data.inlier_matches().collect(),
        );
        let before = scene.rms_reprojection_error();
        if !BundleAdjuster::new(self.settings.bundle_adjuster).adjust(&mut scene, mask) {
            debug!(
                "pose refinement failed on {} inliers",
                match_data.inliers.len()
            );
            return false;
        }
        debug!(
            "pose refinement: rms reprojection error from {} px to {} px",
            before,
            scene.rms_reprojection_error()
        );

        if mask.intrinsics {
            if let Err(e) = intrinsics.assign(&*scene.intrinsics) {
                debug!("cannot update the refined intrinsics: {}", e);
                return false;
            }
        }
        *pose = scene.pose;
        true
    }
}
