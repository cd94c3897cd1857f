use crate::LocalizeError;
use resect_core::{DescriberType, FeatureWorldMatch, KeyPoint, ProjectionMatrix, WorldPoint};

/// Default sampling budget of the robust estimators.
pub const DEFAULT_MAX_ITERATIONS: usize = 4096;

/// The correspondences of one image with the reconstruction, and what resection
/// learned from them.
///
/// The correspondences are fixed at construction. Localization overwrites
/// [`MatchData::inliers`] and [`MatchData::error_max`] on every call and
/// [`MatchData::projection_matrix`] when it succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchData {
    points: Vec<KeyPoint>,
    world_points: Vec<WorldPoint>,
    describer_types: Vec<DescriberType>,
    /// Sampling budget of the robust estimators.
    pub max_iterations: usize,
    /// Inlier threshold in pixels, `f64::INFINITY` to let resection pick it.
    pub error_max: f64,
    /// Indices of the correspondences consistent with the estimated camera.
    pub inliers: Vec<usize>,
    pub projection_matrix: ProjectionMatrix,
}

impl MatchData {
    /// Groups parallel sequences of observations, world points and describer types.
    pub fn new(
        points: Vec<KeyPoint>,
        world_points: Vec<WorldPoint>,
        describer_types: Vec<DescriberType>,
    ) -> Result<Self, LocalizeError> {
        if points.len() != world_points.len() || points.len() != describer_types.len() {
            return Err(LocalizeError::MismatchedLengths {
                points: points.len(),
                world_points: world_points.len(),
                describer_types: describer_types.len(),
            });
        }
        Ok(Self {
            points,
            world_points,
            describer_types,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            error_max: f64::INFINITY,
            inliers: Vec::new(),
            projection_matrix: ProjectionMatrix::default(),
        })
    }

    /// Builds the match data from correspondences which all share a describer type.
    pub fn from_matches(
        matches: impl IntoIterator<Item = FeatureWorldMatch<KeyPoint>>,
        describer_type: DescriberType,
    ) -> Self {
        let (points, world_points): (Vec<_>, Vec<_>) = matches
            .into_iter()
            .map(|FeatureWorldMatch(point, world)| (point, world))
            .unzip();
        let describer_types = vec![describer_type; points.len()];
        Self {
            points,
            world_points,
            describer_types,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            error_max: f64::INFINITY,
            inliers: Vec::new(),
            projection_matrix: ProjectionMatrix::default(),
        }
    }

    #[must_use]
    pub fn max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }

    #[must_use]
    pub fn error_max(self, error_max: f64) -> Self {
        Self { error_max, ..self }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Observations in pixels, distortion included.
    pub fn points(&self) -> &[KeyPoint] {
        &self.points
    }

    pub fn world_points(&self) -> &[WorldPoint] {
        &self.world_points
    }

    pub fn describer_types(&self) -> &[DescriberType] {
        &self.describer_types
    }

    /// The correspondence at `index`.
    pub fn feature_world_match(&self, index: usize) -> FeatureWorldMatch<KeyPoint> {
        FeatureWorldMatch(self.points[index], self.world_points[index])
    }

    /// The inlier correspondences.
    pub fn inlier_matches(&self) -> impl Iterator<Item = FeatureWorldMatch<KeyPoint>> + '_ {
        self.inliers
            .iter()
            .map(move |&index| self.feature_world_match(index))
    }
}
