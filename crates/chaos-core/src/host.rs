// ─────────────────────────────────────────────────────────────────────
// Chaos Intelligence — Host Layer Capability
// ─────────────────────────────────────────────────────────────────────
//! The external layer abstraction a chaotic layer attaches to.
//!
//! A host owns its parameters and their lifecycle: `build` creates them
//! for a given input width, `call` runs the forward computation.
//! `DenseHost` is the reference implementation, `y = xW + b`.

use chaos_functions::SimpleRng;
use chaos_types::{ChaosError, ChaosResult};

/// Trait for host layers.
pub trait HostLayer: Send {
    fn name(&self) -> &str;

    /// Output width.
    fn units(&self) -> usize;

    /// Create parameters for inputs of width `input_dim`.
    fn build(&mut self, input_dim: usize) -> ChaosResult<()>;

    fn is_built(&self) -> bool;

    /// Forward computation.
    fn call(&mut self, input: &[f64]) -> ChaosResult<Vec<f64>>;

    /// Learned parameters, in declaration order.
    fn weights(&self) -> Vec<&[f64]>;
}

impl<T: HostLayer + ?Sized> HostLayer for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn units(&self) -> usize {
        (**self).units()
    }

    fn build(&mut self, input_dim: usize) -> ChaosResult<()> {
        (**self).build(input_dim)
    }

    fn is_built(&self) -> bool {
        (**self).is_built()
    }

    fn call(&mut self, input: &[f64]) -> ChaosResult<Vec<f64>> {
        (**self).call(input)
    }

    fn weights(&self) -> Vec<&[f64]> {
        (**self).weights()
    }
}

/// Fully connected host layer with seeded Glorot-uniform kernel and
/// zero bias.
#[derive(Debug, Clone)]
pub struct DenseHost {
    name: String,
    units: usize,
    seed: u64,
    input_dim: Option<usize>,
    /// Row-major `[input_dim × units]`.
    kernel: Vec<f64>,
    bias: Vec<f64>,
}

impl DenseHost {
    pub fn new(name: impl Into<String>, units: usize, seed: u64) -> Self {
        Self {
            name: name.into(),
            units,
            seed,
            input_dim: None,
            kernel: Vec::new(),
            bias: Vec::new(),
        }
    }

    /// Pre-built host with explicit parameters.
    pub fn with_weights(
        name: impl Into<String>,
        input_dim: usize,
        kernel: Vec<f64>,
        bias: Vec<f64>,
    ) -> ChaosResult<Self> {
        let units = bias.len();
        if units == 0 {
            return Err(ChaosError::InvalidParameter(
                "dense host needs at least one unit".to_string(),
            ));
        }
        if kernel.len() != input_dim * units {
            return Err(ChaosError::ShapeMismatch {
                expected: input_dim * units,
                got: kernel.len(),
            });
        }
        Ok(Self {
            name: name.into(),
            units,
            seed: 0,
            input_dim: Some(input_dim),
            kernel,
            bias,
        })
    }

    pub fn input_dim(&self) -> Option<usize> {
        self.input_dim
    }
}

impl HostLayer for DenseHost {
    fn name(&self) -> &str {
        &self.name
    }

    fn units(&self) -> usize {
        self.units
    }

    fn build(&mut self, input_dim: usize) -> ChaosResult<()> {
        if let Some(existing) = self.input_dim {
            if existing == input_dim {
                return Ok(());
            }
            return Err(ChaosError::ShapeMismatch {
                expected: existing,
                got: input_dim,
            });
        }
        if input_dim == 0 || self.units == 0 {
            return Err(ChaosError::InvalidParameter(format!(
                "dense host `{}` needs input_dim >= 1 and units >= 1",
                self.name
            )));
        }
        let limit = (6.0 / (input_dim + self.units) as f64).sqrt();
        let mut rng = SimpleRng::new(self.seed);
        self.kernel = (0..input_dim * self.units)
            .map(|_| rng.uniform(-limit, limit))
            .collect();
        self.bias = vec![0.0; self.units];
        self.input_dim = Some(input_dim);
        log::debug!(
            "built dense host `{}`: {input_dim} -> {} units",
            self.name,
            self.units
        );
        Ok(())
    }

    fn is_built(&self) -> bool {
        self.input_dim.is_some()
    }

    fn call(&mut self, input: &[f64]) -> ChaosResult<Vec<f64>> {
        let input_dim = self
            .input_dim
            .ok_or_else(|| ChaosError::NotBuilt(self.name.clone()))?;
        if input.len() != input_dim {
            return Err(ChaosError::ShapeMismatch {
                expected: input_dim,
                got: input.len(),
            });
        }
        let mut out = self.bias.clone();
        for (i, &x) in input.iter().enumerate() {
            let row = &self.kernel[i * self.units..(i + 1) * self.units];
            for (o, &w) in out.iter_mut().zip(row) {
                *o += x * w;
            }
        }
        Ok(out)
    }

    fn weights(&self) -> Vec<&[f64]> {
        if self.input_dim.is_none() {
            return Vec::new();
        }
        vec![self.kernel.as_slice(), self.bias.as_slice()]
    }
}
