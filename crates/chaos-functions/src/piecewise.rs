// ─────────────────────────────────────────────────────────────────────
// Chaos Intelligence — Piecewise Functions
// ─────────────────────────────────────────────────────────────────────
//! Ordered predicate dispatch: the first branch whose predicate accepts
//! the input supplies the result, otherwise the default does.

use std::sync::Arc;

use chaos_types::{ChaosError, ChaosResult, Determinism, FunctionDescriptor};

use crate::function::{scalar_arg, DeterministicFunction};

pub type Predicate = Arc<dyn Fn(f64) -> bool + Send + Sync>;
pub type SubFunction = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

pub fn less_than(t: f64) -> impl Fn(f64) -> bool + Send + Sync + 'static {
    move |x| x < t
}

pub fn equal_to(t: f64) -> impl Fn(f64) -> bool + Send + Sync + 'static {
    move |x| x == t
}

pub fn at_least(t: f64) -> impl Fn(f64) -> bool + Send + Sync + 'static {
    move |x| x >= t
}

/// Half-open interval [lo, hi).
pub fn within(lo: f64, hi: f64) -> impl Fn(f64) -> bool + Send + Sync + 'static {
    move |x| lo <= x && x < hi
}

#[derive(Clone)]
pub struct CommonPiecewiseFunction {
    name: String,
    branches: Vec<(Predicate, SubFunction)>,
    default: Option<SubFunction>,
}

impl CommonPiecewiseFunction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            branches: Vec::new(),
            default: None,
        }
    }

    /// Append a branch. Branches are tried in insertion order.
    pub fn branch(
        mut self,
        predicate: impl Fn(f64) -> bool + Send + Sync + 'static,
        f: impl Fn(f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        self.branches.push((Arc::new(predicate), Arc::new(f)));
        self
    }

    /// Fallback used when no predicate matches.
    pub fn otherwise(mut self, f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        self.default = Some(Arc::new(f));
        self
    }

    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Index of the first branch accepting `x`.
    pub fn matching_branch(&self, x: f64) -> Option<usize> {
        self.branches.iter().position(|(p, _)| p(x))
    }

    pub fn evaluate(&self, x: f64) -> ChaosResult<f64> {
        match self.matching_branch(x) {
            Some(i) => Ok((self.branches[i].1)(x)),
            None => match &self.default {
                Some(f) => Ok(f(x)),
                None => Err(ChaosError::NoMatchingBranch { input: x }),
            },
        }
    }
}

impl std::fmt::Debug for CommonPiecewiseFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommonPiecewiseFunction")
            .field("name", &self.name)
            .field("branches", &self.branches.len())
            .field("default", &self.default.is_some())
            .finish()
    }
}

impl DeterministicFunction for CommonPiecewiseFunction {
    fn descriptor(&self) -> FunctionDescriptor {
        FunctionDescriptor::new(self.name.clone(), Determinism::Deterministic, 1)
    }

    fn evaluate(&mut self, input: &[f64]) -> ChaosResult<Vec<f64>> {
        let x = scalar_arg(&self.name, input)?;
        Ok(vec![CommonPiecewiseFunction::evaluate(self, x)?])
    }

    fn reset(&mut self) {}

    fn fork(&self) -> Box<dyn DeterministicFunction> {
        Box::new(self.clone())
    }
}
