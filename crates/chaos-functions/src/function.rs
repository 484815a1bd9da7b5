// ─────────────────────────────────────────────────────────────────────
// Chaos Intelligence — Deterministic Function Interface
// ─────────────────────────────────────────────────────────────────────

use chaos_types::{ChaosResult, FunctionDescriptor};

/// Trait for chaotic functions.
///
/// Implementations must be reproducible: two forks taken at the same
/// moment return identical outputs for identical inputs, whether the
/// function is deterministic or driven by its own seeded generator.
pub trait DeterministicFunction: Send {
    /// Name, determinism category, output width and capabilities.
    fn descriptor(&self) -> FunctionDescriptor;

    /// Apply the function, advancing any internal state by one step.
    fn evaluate(&mut self, input: &[f64]) -> ChaosResult<Vec<f64>>;

    /// Restore the initial state (and generator seed, if any).
    fn reset(&mut self);

    /// Independent copy at the current state.
    fn fork(&self) -> Box<dyn DeterministicFunction>;
}

impl std::fmt::Debug for dyn DeterministicFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.descriptor())
    }
}

/// Read a single scalar argument, rejecting empty or non-finite input.
pub(crate) fn scalar_arg(name: &str, input: &[f64]) -> ChaosResult<f64> {
    use chaos_types::ChaosError;

    match input {
        [x] if x.is_finite() => Ok(*x),
        [x] => Err(ChaosError::InvalidParameter(format!(
            "{name}: input must be finite, got {x}"
        ))),
        [] => Err(ChaosError::InvalidParameter(format!(
            "{name}: expected one input value, got none"
        ))),
        _ => Err(ChaosError::InvalidParameter(format!(
            "{name}: expected one input value, got {}",
            input.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_arg() {
        assert_eq!(scalar_arg("f", &[2.5]).unwrap(), 2.5);
        assert!(scalar_arg("f", &[]).is_err());
        assert!(scalar_arg("f", &[1.0, 2.0]).is_err());
        assert!(scalar_arg("f", &[f64::NAN]).is_err());
    }
}
