//! Nonlinear refinement of a single camera against known world points.
//!
//! A [`MinimalScene`] holds one camera (pose and intrinsics) and the world points it
//! observes. The [`BundleAdjuster`] minimizes the pixel reprojection error of the scene
//! with Levenberg-Marquardt over the blocks selected by a [`RefineParameters`] mask.

mod adjuster;
mod problem;
mod settings;

pub use adjuster::*;
pub use settings::*;

use core::ops::{BitOr, BitOrAssign};
use resect_core::{FeatureWorldMatch, KeyPoint, Pose, Projective, WorldToCamera};
use resect_pinhole::Intrinsics;

/// Which blocks of a [`MinimalScene`] the [`BundleAdjuster`] may change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RefineParameters {
    pub rotation: bool,
    pub translation: bool,
    /// Every parameter reported by [`Intrinsics::params`].
    pub intrinsics: bool,
}

impl RefineParameters {
    pub const NONE: Self = Self {
        rotation: false,
        translation: false,
        intrinsics: false,
    };
    pub const ROTATION: Self = Self {
        rotation: true,
        ..Self::NONE
    };
    pub const TRANSLATION: Self = Self {
        translation: true,
        ..Self::NONE
    };
    pub const INTRINSICS: Self = Self {
        intrinsics: true,
        ..Self::NONE
    };
    pub const POSE: Self = Self {
        rotation: true,
        translation: true,
        intrinsics: false,
    };
    pub const ALL: Self = Self {
        rotation: true,
        translation: true,
        intrinsics: true,
    };

    pub fn is_empty(self) -> bool {
        self == Self::NONE
    }
}

impl BitOr for RefineParameters {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            rotation: self.rotation || rhs.rotation,
            translation: self.translation || rhs.translation,
            intrinsics: self.intrinsics || rhs.intrinsics,
        }
    }
}

impl BitOrAssign for RefineParameters {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

/// One camera, its intrinsics and the landmarks it observes.
///
/// Observations are raw pixels, distortion included.
#[derive(Debug, Clone)]
pub struct MinimalScene {
    pub pose: WorldToCamera,
    pub intrinsics: Box<dyn Intrinsics>,
    pub landmarks: Vec<FeatureWorldMatch<KeyPoint>>,
}

impl MinimalScene {
    pub fn new(
        pose: WorldToCamera,
        intrinsics: Box<dyn Intrinsics>,
        landmarks: Vec<FeatureWorldMatch<KeyPoint>>,
    ) -> Self {
        Self {
            pose,
            intrinsics,
            landmarks,
        }
    }

    /// Root mean square pixel reprojection error, infinite if a landmark cannot be projected.
    pub fn rms_reprojection_error(&self) -> f64 {
        if self.landmarks.is_empty() {
            return 0.0;
        }
        let mut sum = 0.0;
        for &FeatureWorldMatch(KeyPoint(observed), world) in &self.landmarks {
            let projected = self
                .pose
                .transform(world)
                .point()
                .and_then(|camera| self.intrinsics.project(&camera));
            match projected {
                Some(pixel) => sum += (pixel - observed).norm_squared(),
                None => return f64::INFINITY,
            }
        }
        (sum / self.landmarks.len() as f64).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_combine() {
        assert!(RefineParameters::default().is_empty());
        assert_eq!(
            RefineParameters::ROTATION | RefineParameters::TRANSLATION,
            RefineParameters::POSE
        );
        let mut mask = RefineParameters::POSE;
        mask |= RefineParameters::INTRINSICS;
        assert_eq!(mask, RefineParameters::ALL);
    }
}
