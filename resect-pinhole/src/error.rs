use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntrinsicsError {
    #[error("expected {expected} intrinsic parameters, got {found}")]
    ParameterCount { expected: usize, found: usize },
    #[error("cannot assign a {found} camera to a {expected} camera")]
    ModelMismatch {
        expected: &'static str,
        found: &'static str,
    },
}
