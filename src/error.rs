use std::error::Error;
use std::fmt;

/// Error classes surfaced by frame construction and the representation
/// algebra.
///
/// `Configuration` covers everything that is wrong before any numerics run
/// (channel-count mismatches, unsupported parity, unknown frame variants)
/// and is always fatal at construction time. `InvariantViolation` is the
/// defensive class used by test-time checks such as `assert_lorentz`.
/// Numerical degeneracies (lightlike or collinear candidate vectors) are
/// never errors; they are repaired in place and counted in
/// `RegularizationStats`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    Configuration(String),
    InvariantViolation(String),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Configuration(msg) => write!(f, "configuration error: {}", msg),
            FrameError::InvariantViolation(msg) => write!(f, "invariant violation: {}", msg),
        }
    }
}

impl Error for FrameError {}
