// ─────────────────────────────────────────────────────────────────────
// Chaos Intelligence — Conformance Protocol
// ─────────────────────────────────────────────────────────────────────
//! Capability check run once when a function is bound to a layer.
//!
//! Checks, in order:
//! 1. required operations (`evaluate`, `fork`) are present
//! 2. declared output dimension is at least 1
//! 3. two forks agree on the probe input (reproducibility)
//! 4. output width matches the declaration and values are finite
//! 5. entropy functions actually vary, and optionally their mean
//!    magnitude lies inside the expected band
//!
//! Only forks are evaluated; the candidate's own state never moves.

use chaos_types::{ChaosError, ChaosResult, Determinism, FunctionDescriptor};

use crate::function::DeterministicFunction;

/// Evaluations used to confirm an entropy function is not constant.
const VARIATION_CYCLES: usize = 8;

/// Expected mean of `|output[0]|` for an entropy function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntropyExpectation {
    pub threshold: f64,
    /// Percent tolerance around `threshold`. Default: 15.
    pub tolerance_pct: f64,
    /// Default: 100.
    pub cycles: usize,
}

impl EntropyExpectation {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            tolerance_pct: 15.0,
            cycles: 100,
        }
    }

    pub fn with_tolerance(mut self, tolerance_pct: f64) -> Self {
        self.tolerance_pct = tolerance_pct;
        self
    }

    pub fn with_cycles(mut self, cycles: usize) -> Self {
        self.cycles = cycles;
        self
    }

    fn band(&self) -> (f64, f64) {
        let t = self.threshold.abs();
        let tol = self.tolerance_pct / 100.0;
        (t * (1.0 - tol), t * (1.0 + tol))
    }
}

/// Input used to probe a candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Probe {
    pub input: Vec<f64>,
    pub entropy: Option<EntropyExpectation>,
}

impl Probe {
    pub fn new(input: Vec<f64>) -> Self {
        Self {
            input,
            entropy: None,
        }
    }

    pub fn with_entropy(mut self, expectation: EntropyExpectation) -> Self {
        self.entropy = Some(expectation);
        self
    }
}

/// Pass/fail outcome with the first failing reason.
#[derive(Debug, Clone, PartialEq)]
pub struct ConformanceReport {
    pub function: String,
    pub passed: bool,
    pub reason: Option<String>,
}

impl ConformanceReport {
    fn pass(function: &str) -> Self {
        Self {
            function: function.to_string(),
            passed: true,
            reason: None,
        }
    }

    fn fail(function: &str, reason: String) -> Self {
        log::warn!("conformance check failed for `{function}`: {reason}");
        Self {
            function: function.to_string(),
            passed: false,
            reason: Some(reason),
        }
    }

    pub fn into_result(self) -> ChaosResult<()> {
        if self.passed {
            return Ok(());
        }
        Err(ChaosError::ContractViolation(format!(
            "`{}`: {}",
            self.function,
            self.reason.unwrap_or_default()
        )))
    }
}

/// Run the conformance protocol against `candidate`.
pub fn check(candidate: &dyn DeterministicFunction, probe: &Probe) -> ConformanceReport {
    let descriptor = candidate.descriptor();
    match run_checks(candidate, &descriptor, probe) {
        Ok(()) => {
            log::debug!("conformance check passed: {descriptor}");
            ConformanceReport::pass(&descriptor.name)
        }
        Err(reason) => ConformanceReport::fail(&descriptor.name, reason),
    }
}

/// `check` mapped to `ContractViolation` on failure.
pub fn ensure(candidate: &dyn DeterministicFunction, probe: &Probe) -> ChaosResult<()> {
    check(candidate, probe).into_result()
}

fn run_checks(
    candidate: &dyn DeterministicFunction,
    descriptor: &FunctionDescriptor,
    probe: &Probe,
) -> Result<(), String> {
    let caps = descriptor.capabilities;
    if !(caps.evaluate && caps.fork) {
        let missing: Vec<&str> = caps
            .missing()
            .into_iter()
            .filter(|op| *op != "reset")
            .collect();
        return Err(format!("missing required operation(s): {}", missing.join(", ")));
    }
    if descriptor.output_dim < 1 {
        return Err("declared output dimension must be >= 1".to_string());
    }

    let mut first = candidate.fork();
    let mut second = candidate.fork();
    let a = first
        .evaluate(&probe.input)
        .map_err(|e| format!("probe evaluation failed: {e}"))?;
    let b = second
        .evaluate(&probe.input)
        .map_err(|e| format!("probe evaluation failed: {e}"))?;

    if a.len() != descriptor.output_dim {
        return Err(format!(
            "declared output dimension {} but produced {}",
            descriptor.output_dim,
            a.len()
        ));
    }
    if a.iter().any(|v| !v.is_finite()) {
        return Err(format!("probe produced non-finite output {a:?}"));
    }
    if a != b {
        let category = match descriptor.determinism {
            Determinism::Deterministic => "deterministic",
            Determinism::Entropy { .. } => "entropy (seeded)",
        };
        return Err(format!(
            "declared {category} but two forks diverged: {a:?} vs {b:?}"
        ));
    }

    if descriptor.determinism.is_entropy() {
        check_entropy(first.as_mut(), &a, probe)?;
    }
    Ok(())
}

fn check_entropy(
    fork: &mut dyn DeterministicFunction,
    first_output: &[f64],
    probe: &Probe,
) -> Result<(), String> {
    let mut varied = false;
    for _ in 0..VARIATION_CYCLES {
        let out = fork
            .evaluate(&probe.input)
            .map_err(|e| format!("entropy evaluation failed: {e}"))?;
        if out != first_output {
            varied = true;
            break;
        }
    }
    if !varied {
        return Err(format!(
            "declared entropy but output stayed constant over {VARIATION_CYCLES} evaluations"
        ));
    }

    let Some(expectation) = probe.entropy else {
        return Ok(());
    };
    if expectation.cycles == 0 {
        return Err("entropy expectation needs at least one cycle".to_string());
    }
    let mut sum = 0.0;
    for _ in 0..expectation.cycles {
        let out = fork
            .evaluate(&probe.input)
            .map_err(|e| format!("entropy evaluation failed: {e}"))?;
        sum += out.first().copied().unwrap_or(0.0).abs();
    }
    let mean = sum / expectation.cycles as f64;
    let (lo, hi) = expectation.band();
    if !(lo..=hi).contains(&mean) {
        return Err(format!(
            "entropy mean {mean:.4} outside [{lo:.4}, {hi:.4}]"
        ));
    }
    Ok(())
}
