// ─────────────────────────────────────────────────────────────────────
// Chaos Intelligence — Lorenz Attractor
// ─────────────────────────────────────────────────────────────────────
//! Classic fourth-order Runge-Kutta integrator for the Lorenz system:
//!
//!   dx/dt = σ (y - x)
//!   dy/dt = x (ρ - z) - y
//!   dz/dt = x y - β z
//!
//! The scheme is fixed (RK4, one stage set per step) so trajectories are
//! bit-for-bit reproducible from the same state, coefficients and dt.

use serde::{Deserialize, Serialize};

use chaos_types::{ChaosError, ChaosResult, Determinism, FunctionDescriptor, LorenzConfig};

use crate::function::DeterministicFunction;
use crate::rng::SimpleRng;

/// Snapshot of the Lorenz system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LorenzState {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Simulation time.
    pub t: f64,
    /// Integration step counter.
    pub step_count: u64,
}

impl LorenzState {
    pub fn new(initial: [f64; 3]) -> Self {
        Self {
            x: initial[0],
            y: initial[1],
            z: initial[2],
            t: 0.0,
            step_count: 0,
        }
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

#[inline]
fn lorenz_derivative(sigma: f64, rho: f64, beta: f64, p: [f64; 3]) -> [f64; 3] {
    let [x, y, z] = p;
    [sigma * (y - x), x * (rho - z) - y, x * y - beta * z]
}

#[inline]
fn axpy(p: [f64; 3], h: f64, k: [f64; 3]) -> [f64; 3] {
    [p[0] + h * k[0], p[1] + h * k[1], p[2] + h * k[2]]
}

/// Stateful Lorenz system advanced one RK4 step per evaluation.
#[derive(Debug, Clone)]
pub struct LorenzAttractor {
    pub sigma: f64,
    pub rho: f64,
    pub beta: f64,
    dt: f64,
    initial: [f64; 3],
    state: LorenzState,
}

impl LorenzAttractor {
    pub fn new(sigma: f64, rho: f64, beta: f64, initial: [f64; 3]) -> Self {
        Self {
            sigma,
            rho,
            beta,
            dt: LorenzConfig::default().dt,
            initial,
            state: LorenzState::new(initial),
        }
    }

    /// Validated construction from configuration.
    pub fn from_config(config: &LorenzConfig) -> ChaosResult<Self> {
        let attractor = Self::new(config.sigma, config.rho, config.beta, config.initial);
        attractor.with_dt(config.dt)
    }

    /// Set the step used by `evaluate`. Fails for `dt <= 0`.
    pub fn with_dt(mut self, dt: f64) -> ChaosResult<Self> {
        check_dt(dt)?;
        self.dt = dt;
        Ok(self)
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn state(&self) -> LorenzState {
        self.state
    }

    /// Time derivative at point `p` under the current coefficients.
    pub fn derivative(&self, p: [f64; 3]) -> [f64; 3] {
        lorenz_derivative(self.sigma, self.rho, self.beta, p)
    }

    /// Advance the state by one RK4 step of size `dt`.
    pub fn step(&mut self, dt: f64) -> ChaosResult<[f64; 3]> {
        check_dt(dt)?;
        let p = self.state.as_array();
        let k1 = self.derivative(p);
        let k2 = self.derivative(axpy(p, 0.5 * dt, k1));
        let k3 = self.derivative(axpy(p, 0.5 * dt, k2));
        let k4 = self.derivative(axpy(p, dt, k3));

        let mut next = [0.0f64; 3];
        for i in 0..3 {
            next[i] = p[i] + dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
        }
        if next.iter().any(|v| !v.is_finite()) {
            log::warn!("lorenz: state diverged at step {}", self.state.step_count);
            return Err(ChaosError::Numerical(format!(
                "lorenz state diverged after {} steps",
                self.state.step_count
            )));
        }

        self.state = LorenzState {
            x: next[0],
            y: next[1],
            z: next[2],
            t: self.state.t + dt,
            step_count: self.state.step_count + 1,
        };
        Ok(next)
    }

    /// Run multiple steps, returning the final point.
    pub fn run(&mut self, dt: f64, n_steps: u64) -> ChaosResult<[f64; 3]> {
        let mut last = self.state.as_array();
        for _ in 0..n_steps {
            last = self.step(dt)?;
        }
        Ok(last)
    }
}

impl Default for LorenzAttractor {
    fn default() -> Self {
        let c = LorenzConfig::default();
        Self::new(c.sigma, c.rho, c.beta, c.initial)
    }
}

fn check_dt(dt: f64) -> ChaosResult<()> {
    if !(dt.is_finite() && dt > 0.0) {
        return Err(ChaosError::InvalidParameter(format!(
            "integration step must be > 0, got {dt}"
        )));
    }
    Ok(())
}

impl DeterministicFunction for LorenzAttractor {
    fn descriptor(&self) -> FunctionDescriptor {
        FunctionDescriptor::new("LorenzAttractor", Determinism::Deterministic, 3)
    }

    /// Input is ignored; each call advances one step of the configured dt.
    fn evaluate(&mut self, _input: &[f64]) -> ChaosResult<Vec<f64>> {
        Ok(self.step(self.dt)?.to_vec())
    }

    fn reset(&mut self) {
        self.state = LorenzState::new(self.initial);
    }

    fn fork(&self) -> Box<dyn DeterministicFunction> {
        Box::new(self.clone())
    }
}

/// Lorenz derivative evaluated at points drawn from an owned generator.
///
/// Each evaluation samples `x ∈ [0, x_max)`, `y ∈ [0, y_max)`,
/// `z ∈ [0, z_max)` and returns `(ẋ, ẏ, ż)`. In single-output mode one
/// component, chosen by the same generator, is returned instead.
#[derive(Debug, Clone)]
pub struct LorenzSampler {
    pub sigma: f64,
    pub rho: f64,
    pub beta: f64,
    bounds: [f64; 3],
    single_output: bool,
    seed: u64,
    rng: SimpleRng,
}

impl LorenzSampler {
    pub fn new(seed: u64, bounds: [f64; 3]) -> ChaosResult<Self> {
        if bounds.iter().any(|b| !(b.is_finite() && *b >= 0.0)) {
            return Err(ChaosError::InvalidParameter(format!(
                "sampling bounds must be finite and >= 0, got {bounds:?}"
            )));
        }
        let c = LorenzConfig::default();
        Ok(Self {
            sigma: c.sigma,
            rho: c.rho,
            beta: c.beta,
            bounds,
            single_output: false,
            seed,
            rng: SimpleRng::new(seed),
        })
    }

    pub fn with_coefficients(mut self, sigma: f64, rho: f64, beta: f64) -> Self {
        self.sigma = sigma;
        self.rho = rho;
        self.beta = beta;
        self
    }

    pub fn single_output(mut self, single: bool) -> Self {
        self.single_output = single;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl DeterministicFunction for LorenzSampler {
    fn descriptor(&self) -> FunctionDescriptor {
        let dim = if self.single_output { 1 } else { 3 };
        FunctionDescriptor::new(
            "LorenzSampler",
            Determinism::Entropy { seed: self.seed },
            dim,
        )
    }

    fn evaluate(&mut self, _input: &[f64]) -> ChaosResult<Vec<f64>> {
        let index = self.rng.below(3);
        let p = [
            self.rng.uniform(0.0, self.bounds[0]),
            self.rng.uniform(0.0, self.bounds[1]),
            self.rng.uniform(0.0, self.bounds[2]),
        ];
        let d = lorenz_derivative(self.sigma, self.rho, self.beta, p);
        if self.single_output {
            Ok(vec![d[index]])
        } else {
            Ok(d.to_vec())
        }
    }

    fn reset(&mut self) {
        self.rng = SimpleRng::new(self.seed);
    }

    fn fork(&self) -> Box<dyn DeterministicFunction> {
        Box::new(self.clone())
    }
}
