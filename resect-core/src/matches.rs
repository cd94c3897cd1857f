use crate::WorldPoint;

/// Image observation to world point match.
///
/// The observation type `P` decides the coordinate frame of the 2d side: a
/// [`KeyPoint`](crate::KeyPoint) in pixels or a normalized keypoint from a camera model.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct FeatureWorldMatch<P>(pub P, pub WorldPoint);
