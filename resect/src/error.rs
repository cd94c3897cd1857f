use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocalizeError {
    #[error("{points} points, {world_points} world points and {describer_types} describer types")]
    MismatchedLengths {
        points: usize,
        world_points: usize,
        describer_types: usize,
    },
    #[error("unknown robust estimator \"{0}\", expected \"acransac\" or \"loransac\"")]
    UnknownEstimator(String),
}
