// ─────────────────────────────────────────────────────────────────────
// Chaos Intelligence — Hasse Algorithm
// ─────────────────────────────────────────────────────────────────────
//! The Hasse algorithm (Collatz / Syracuse map) over non-negative
//! integers:
//!
//!   T(n) = n / 2      if n is even
//!   T(n) = 3n + 1     if n is odd
//!
//! A `HasseAlgorithm` of order k evaluates T^k(n). T(0) = 0, so the
//! domain is all n ≥ 0; stopping times are defined for n ≥ 1 only.

use chaos_types::{ChaosError, ChaosResult, Determinism, FunctionDescriptor, HasseConfig};

use crate::function::{scalar_arg, DeterministicFunction};

/// Upper bound on trajectory length before giving up.
pub const MAX_TRAJECTORY: u64 = 1_000_000;

/// Largest integer an `f64` input can carry exactly.
const MAX_EXACT_F64: f64 = 9_007_199_254_740_992.0;

/// One application of the Hasse map.
pub fn hasse_map(n: u64) -> ChaosResult<u64> {
    if n % 2 == 0 {
        return Ok(n / 2);
    }
    n.checked_mul(3)
        .and_then(|v| v.checked_add(1))
        .ok_or_else(|| ChaosError::Numerical(format!("3n + 1 overflows u64 for n = {n}")))
}

fn non_negative(n: i64) -> ChaosResult<u64> {
    u64::try_from(n).map_err(|_| {
        ChaosError::InvalidParameter(format!("hasse input must be >= 0, got {n}"))
    })
}

/// Hasse map of a fixed order with a cursor for input-free evaluation.
#[derive(Debug, Clone)]
pub struct HasseAlgorithm {
    order: u32,
    start: u64,
    cursor: u64,
}

impl HasseAlgorithm {
    pub fn new(order: u32) -> ChaosResult<Self> {
        Self::from_config(&HasseConfig {
            order,
            ..HasseConfig::default()
        })
    }

    pub fn from_config(config: &HasseConfig) -> ChaosResult<Self> {
        if config.order < 1 {
            return Err(ChaosError::InvalidParameter(format!(
                "hasse order must be >= 1, got {}",
                config.order
            )));
        }
        Ok(Self {
            order: config.order,
            start: config.start,
            cursor: config.start,
        })
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// T^order(n). Negative input fails with `InvalidParameter`.
    pub fn evaluate(&self, n: i64) -> ChaosResult<u64> {
        self.apply(non_negative(n)?)
    }

    fn apply(&self, mut n: u64) -> ChaosResult<u64> {
        for _ in 0..self.order {
            n = hasse_map(n)?;
        }
        Ok(n)
    }

    /// Number of map applications needed to reach 1. Requires n ≥ 1.
    pub fn stopping_time(n: i64) -> ChaosResult<u64> {
        Ok(Self::trajectory(n)?.len() as u64 - 1)
    }

    /// Sequence n, T(n), T²(n), ... ending at the first 1.
    pub fn trajectory(n: i64) -> ChaosResult<Vec<u64>> {
        let mut v = non_negative(n)?;
        if v == 0 {
            return Err(ChaosError::InvalidParameter(
                "trajectory undefined for 0 (fixed point of the map)".to_string(),
            ));
        }
        let mut out = vec![v];
        while v != 1 {
            if out.len() as u64 > MAX_TRAJECTORY {
                return Err(ChaosError::Numerical(format!(
                    "trajectory of {n} exceeded {MAX_TRAJECTORY} steps"
                )));
            }
            v = hasse_map(v)?;
            out.push(v);
        }
        Ok(out)
    }
}

impl Default for HasseAlgorithm {
    fn default() -> Self {
        let c = HasseConfig::default();
        Self {
            order: c.order,
            start: c.start,
            cursor: c.start,
        }
    }
}

impl DeterministicFunction for HasseAlgorithm {
    fn descriptor(&self) -> FunctionDescriptor {
        FunctionDescriptor::new("HasseAlgorithm", Determinism::Deterministic, 1)
    }

    /// With no input the internal cursor advances by T^order; with one
    /// integral value the map is applied to it and the cursor is untouched.
    fn evaluate(&mut self, input: &[f64]) -> ChaosResult<Vec<f64>> {
        if input.is_empty() {
            self.cursor = self.apply(self.cursor)?;
            return Ok(vec![self.cursor as f64]);
        }
        let x = scalar_arg("HasseAlgorithm", input)?;
        if x < 0.0 {
            return Err(ChaosError::InvalidParameter(format!(
                "hasse input must be >= 0, got {x}"
            )));
        }
        if x.fract() != 0.0 || x > MAX_EXACT_F64 {
            return Err(ChaosError::InvalidParameter(format!(
                "hasse input must be an exact integer, got {x}"
            )));
        }
        Ok(vec![self.apply(x as u64)? as f64])
    }

    fn reset(&mut self) {
        self.cursor = self.start;
    }

    fn fork(&self) -> Box<dyn DeterministicFunction> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_form_order_one() {
        let h = HasseAlgorithm::default();
        assert_eq!(h.evaluate(0).unwrap(), 0);
        assert_eq!(h.evaluate(1).unwrap(), 4);
        assert_eq!(h.evaluate(2).unwrap(), 1);
        assert_eq!(h.evaluate(5).unwrap(), 16);
        assert_eq!(h.evaluate(10).unwrap(), 5);
    }

    #[test]
    fn test_negative_input_rejected() {
        let h = HasseAlgorithm::default();
        for n in [-1, -2, i64::MIN] {
            assert!(matches!(
                h.evaluate(n),
                Err(ChaosError::InvalidParameter(_))
            ));
        }
        assert!(HasseAlgorithm::stopping_time(-3).is_err());
    }

    #[test]
    fn test_higher_order() {
        // 5 -> 16 -> 8 -> 4
        let h = HasseAlgorithm::new(3).unwrap();
        assert_eq!(h.evaluate(5).unwrap(), 4);
        assert!(HasseAlgorithm::new(0).is_err());
    }

    #[test]
    fn test_stopping_times() {
        assert_eq!(HasseAlgorithm::stopping_time(1).unwrap(), 0);
        assert_eq!(HasseAlgorithm::stopping_time(6).unwrap(), 8);
        assert_eq!(HasseAlgorithm::stopping_time(27).unwrap(), 111);
        assert!(HasseAlgorithm::stopping_time(0).is_err());
    }

    #[test]
    fn test_trajectory() {
        assert_eq!(
            HasseAlgorithm::trajectory(6).unwrap(),
            vec![6, 3, 10, 5, 16, 8, 4, 2, 1]
        );
    }

    #[test]
    fn test_overflow_is_numerical() {
        assert!(matches!(
            hasse_map(u64::MAX),
            Err(ChaosError::Numerical(_))
        ));
    }

    #[test]
    fn test_trait_evaluate_cursor() {
        let mut h = HasseAlgorithm::default();
        assert_eq!(DeterministicFunction::evaluate(&mut h, &[]).unwrap(), vec![82.0]);
        assert_eq!(DeterministicFunction::evaluate(&mut h, &[]).unwrap(), vec![41.0]);
        h.reset();
        assert_eq!(h.cursor(), 27);
    }

    #[test]
    fn test_trait_evaluate_with_input() {
        let mut h = HasseAlgorithm::default();
        assert_eq!(DeterministicFunction::evaluate(&mut h, &[10.0]).unwrap(), vec![5.0]);
        assert_eq!(h.cursor(), 27);
        assert!(DeterministicFunction::evaluate(&mut h, &[-1.0]).is_err());
        assert!(DeterministicFunction::evaluate(&mut h, &[2.5]).is_err());
        assert!(DeterministicFunction::evaluate(&mut h, &[1.0, 2.0]).is_err());
    }
}
