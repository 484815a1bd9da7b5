// ─────────────────────────────────────────────────────────────────────
// Chaos Intelligence — Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all Chaos Intelligence failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChaosError {
    /// A candidate function or layer failed the conformance protocol.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// Out-of-domain numeric input (negative index, non-positive step, ...).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Piecewise function exhausted its predicates without a default.
    #[error("no matching branch for input {input}")]
    NoMatchingBranch { input: f64 },

    /// NaN/Inf or integer overflow in a computation.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Host layer received an input of the wrong width.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    /// Host layer was called or queried before `build`.
    #[error("layer `{0}` has not been built")]
    NotBuilt(String),

    /// A recorder was asked for data it never captured.
    #[error("nothing recorded: {0}")]
    NotRecorded(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),
}

pub type ChaosResult<T> = Result<T, ChaosError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = ChaosError::NoMatchingBranch { input: 5.0 };
        assert_eq!(e.to_string(), "no matching branch for input 5");
        let e = ChaosError::ShapeMismatch { expected: 4, got: 3 };
        assert!(e.to_string().contains("expected 4"));
        let e = ChaosError::InvalidParameter("dt must be > 0".into());
        assert!(e.to_string().starts_with("invalid parameter"));
    }
}
