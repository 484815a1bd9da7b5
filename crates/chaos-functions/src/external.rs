// ─────────────────────────────────────────────────────────────────────
// Chaos Intelligence — External Functions
// ─────────────────────────────────────────────────────────────────────
//! Functions assembled from closures. Used by the Python bindings to
//! adapt foreign callables; operations that were never supplied are
//! reported as missing capabilities so the conformance protocol can
//! reject the candidate at binding time.
//!
//! A seeded evaluation receives one `u64` per call, drawn from a
//! generator the function owns. Forks copy the generator, so an entropy
//! function built this way is reproducible from its declared seed.

use std::sync::Arc;

use chaos_types::{Capabilities, ChaosError, ChaosResult, Determinism, FunctionDescriptor};

use crate::function::DeterministicFunction;
use crate::rng::SimpleRng;

type EvaluateFn = Arc<dyn Fn(&[f64]) -> ChaosResult<Vec<f64>> + Send + Sync>;
type SeededFn = Arc<dyn Fn(&[f64], u64) -> ChaosResult<Vec<f64>> + Send + Sync>;
type ResetFn = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct ExternalFunction {
    name: String,
    determinism: Determinism,
    output_dim: usize,
    evaluate_fn: Option<EvaluateFn>,
    seeded_fn: Option<SeededFn>,
    reset_fn: Option<ResetFn>,
    rng: SimpleRng,
}

impl ExternalFunction {
    pub fn new(name: impl Into<String>, determinism: Determinism, output_dim: usize) -> Self {
        Self {
            name: name.into(),
            determinism,
            output_dim,
            evaluate_fn: None,
            seeded_fn: None,
            reset_fn: None,
            rng: SimpleRng::new(seed_of(determinism)),
        }
    }

    pub fn with_evaluate(
        mut self,
        f: impl Fn(&[f64]) -> ChaosResult<Vec<f64>> + Send + Sync + 'static,
    ) -> Self {
        self.evaluate_fn = Some(Arc::new(f));
        self
    }

    /// Evaluation fed a fresh seed from the owned generator on every call.
    pub fn with_seeded_evaluate(
        mut self,
        f: impl Fn(&[f64], u64) -> ChaosResult<Vec<f64>> + Send + Sync + 'static,
    ) -> Self {
        self.seeded_fn = Some(Arc::new(f));
        self
    }

    pub fn with_reset(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.reset_fn = Some(Arc::new(f));
        self
    }
}

fn seed_of(determinism: Determinism) -> u64 {
    match determinism {
        Determinism::Entropy { seed } => seed,
        Determinism::Deterministic => 0,
    }
}

impl std::fmt::Debug for ExternalFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", DeterministicFunction::descriptor(self))
    }
}

impl DeterministicFunction for ExternalFunction {
    fn descriptor(&self) -> FunctionDescriptor {
        FunctionDescriptor::new(self.name.clone(), self.determinism, self.output_dim)
            .with_capabilities(Capabilities {
                evaluate: self.evaluate_fn.is_some() || self.seeded_fn.is_some(),
                reset: self.reset_fn.is_some() || self.seeded_fn.is_some(),
                fork: true,
            })
    }

    fn evaluate(&mut self, input: &[f64]) -> ChaosResult<Vec<f64>> {
        if let Some(f) = &self.seeded_fn {
            let seed = self.rng.next_u64();
            return f(input, seed);
        }
        match &self.evaluate_fn {
            Some(f) => f(input),
            None => Err(ChaosError::ContractViolation(format!(
                "`{}` does not provide an evaluation operation",
                self.name
            ))),
        }
    }

    fn reset(&mut self) {
        self.rng = SimpleRng::new(seed_of(self.determinism));
        if let Some(f) = &self.reset_fn {
            f();
        }
    }

    fn fork(&self) -> Box<dyn DeterministicFunction> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_evaluation() {
        let mut f = ExternalFunction::new("double", Determinism::Deterministic, 1)
            .with_evaluate(|x| Ok(x.iter().map(|v| v * 2.0).collect()));
        assert_eq!(f.evaluate(&[1.5]).unwrap(), vec![3.0]);
        assert!(f.descriptor().capabilities.evaluate);
        assert!(!f.descriptor().capabilities.reset);
    }

    #[test]
    fn test_missing_evaluate() {
        let mut f = ExternalFunction::new("hollow", Determinism::Deterministic, 1);
        assert!(!f.descriptor().capabilities.evaluate);
        assert!(matches!(
            f.evaluate(&[]),
            Err(ChaosError::ContractViolation(_))
        ));
    }

    #[test]
    fn test_seeded_entropy_function_conforms() {
        let noisy = ExternalFunction::new("noisy", Determinism::Entropy { seed: 11 }, 1)
            .with_seeded_evaluate(|_, seed| Ok(vec![(seed >> 11) as f64]));
        let caps = noisy.descriptor().capabilities;
        assert!(caps.evaluate && caps.reset);
        assert!(crate::conformance::check(&noisy, &crate::Probe::new(Vec::new())).passed);

        let mut a = noisy.fork();
        let mut b = noisy.fork();
        let first = a.evaluate(&[]).unwrap();
        assert_eq!(first, b.evaluate(&[]).unwrap());
        assert_ne!(first, a.evaluate(&[]).unwrap());
        a.reset();
        assert_eq!(a.evaluate(&[]).unwrap(), first);
    }
}
