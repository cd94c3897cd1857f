use crate::problem::ReprojectionProblem;
use crate::{BundleAdjusterSettings, MinimalScene, RefineParameters};
use levenberg_marquardt::{LevenbergMarquardt, TerminationReason};
use log::*;
use resect_core::nalgebra::{Point2, Point3};
use resect_core::{FeatureWorldMatch, KeyPoint, Projective};

/// Refines a [`MinimalScene`] by minimizing its pixel reprojection error.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundleAdjuster {
    pub settings: BundleAdjusterSettings,
}

impl BundleAdjuster {
    pub fn new(settings: BundleAdjusterSettings) -> Self {
        Self { settings }
    }

    /// Optimizes the blocks of `scene` freed by `mask`.
    ///
    /// Returns `false` when the problem is underdetermined or the optimizer did not
    /// reach a usable solution, in which case `scene` is left as it was. An empty mask
    /// succeeds without running the optimizer.
    pub fn adjust(&self, scene: &mut MinimalScene, mask: RefineParameters) -> bool {
        if mask.is_empty() {
            return true;
        }

        let landmarks: Option<Vec<(Point3<f64>, Point2<f64>)>> = scene
            .landmarks
            .iter()
            .map(|&FeatureWorldMatch(KeyPoint(observed), world)| {
                world.point().map(|world| (world, observed))
            })
            .collect();
        let landmarks = match landmarks {
            Some(landmarks) => landmarks,
            None => {
                debug!("cannot refine a scene with landmarks at infinity");
                return false;
            }
        };

        let problem =
            ReprojectionProblem::new(&landmarks, mask, scene.pose, scene.intrinsics.clone());
        let num_params = problem.num_params();
        let num_residuals = 2 * landmarks.len();
        if num_params > num_residuals {
            debug!(
                "{} parameters cannot be refined with {} residuals",
                num_params, num_residuals
            );
            return false;
        }

        let (problem, report) = LevenbergMarquardt::new()
            .with_patience(self.settings.patience)
            .with_ftol(self.settings.ftol)
            .with_xtol(self.settings.xtol)
            .with_gtol(self.settings.gtol)
            .minimize(problem);
        info!("Levenberg-Marquardt: {:?}", report.termination);
        trace!(
            "{} evaluations, final cost {}",
            report.number_of_evaluations,
            report.objective_function
        );

        if !is_usable(&report.termination) || !report.objective_function.is_finite() {
            debug!("pose refinement failed: {:?}", report.termination);
            return false;
        }

        scene.pose = problem.pose();
        if mask.intrinsics {
            scene.intrinsics = problem.into_intrinsics();
        }
        true
    }
}

/// Whether the optimizer stopped on a solution, as opposed to a failure to evaluate it.
fn is_usable(termination: &TerminationReason) -> bool {
    matches!(
        termination,
        TerminationReason::ResidualsZero
            | TerminationReason::Orthogonal
            | TerminationReason::Converged { .. }
            | TerminationReason::NoImprovementPossible(_)
            | TerminationReason::LostPatience
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usable_terminations() {
        assert!(is_usable(&TerminationReason::Orthogonal));
        assert!(is_usable(&TerminationReason::Converged {
            ftol: true,
            xtol: false
        }));
        assert!(!is_usable(&TerminationReason::Numerical("jacobian")));
        assert!(!is_usable(&TerminationReason::User("residuals")));
        assert!(!is_usable(&TerminationReason::NoParameters));
    }
}
