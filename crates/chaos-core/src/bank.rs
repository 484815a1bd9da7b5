// ─────────────────────────────────────────────────────────────────────
// Chaos Intelligence — Transform Bank
// ─────────────────────────────────────────────────────────────────────
//! A set of candidate transforms a chaotic layer chooses between. The
//! chaotic value picks the index; by default `floor((v·n) mod n)`, or a
//! bound interpreter when one is supplied.
//!
//! A transform sees the layer input and the host's parameters, in
//! `HostLayer::weights` order (kernel then bias for `DenseHost`).

use std::sync::Arc;

use chaos_types::{ChaosError, ChaosResult};

pub type Transform = Arc<dyn Fn(&[f64], &[&[f64]]) -> Vec<f64> + Send + Sync>;
pub type Interpreter = Arc<dyn Fn(f64, usize) -> usize + Send + Sync>;

#[derive(Clone)]
pub struct TransformBank {
    transforms: Vec<Transform>,
    interpreter: Option<Interpreter>,
}

impl TransformBank {
    /// Fails with `InvalidParameter` when `transforms` is empty.
    pub fn new(transforms: Vec<Transform>) -> ChaosResult<Self> {
        if transforms.is_empty() {
            return Err(ChaosError::InvalidParameter(
                "transform bank must contain at least one transform".to_string(),
            ));
        }
        Ok(Self {
            transforms,
            interpreter: None,
        })
    }

    /// Single transform summing the input, broadcast by the dispatcher.
    pub fn sum() -> Self {
        let sum = Arc::new(|x: &[f64], _: &[&[f64]]| vec![x.iter().sum::<f64>()]) as Transform;
        Self {
            transforms: vec![sum],
            interpreter: None,
        }
    }

    pub fn with_interpreter(
        mut self,
        interpreter: impl Fn(f64, usize) -> usize + Send + Sync + 'static,
    ) -> Self {
        self.interpreter = Some(Arc::new(interpreter));
        self
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Map a chaotic value onto a transform index.
    pub fn select_index(&self, value: f64) -> ChaosResult<usize> {
        let n = self.transforms.len();
        if let Some(interpreter) = &self.interpreter {
            let index = interpreter(value, n);
            if index >= n {
                return Err(ChaosError::InvalidParameter(format!(
                    "interpreter chose index {index} but only {n} transform(s) exist"
                )));
            }
            return Ok(index);
        }
        if !value.is_finite() {
            return Err(ChaosError::Numerical(format!(
                "cannot select a transform from {value}"
            )));
        }
        let nf = n as f64;
        Ok(((value * nf).rem_euclid(nf).floor() as usize).min(n - 1))
    }

    pub fn apply(&self, index: usize, input: &[f64], weights: &[&[f64]]) -> ChaosResult<Vec<f64>> {
        let transform = self.transforms.get(index).ok_or_else(|| {
            ChaosError::InvalidParameter(format!(
                "transform index {index} out of range ({})",
                self.transforms.len()
            ))
        })?;
        Ok(transform(input, weights))
    }
}

impl std::fmt::Debug for TransformBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformBank")
            .field("transforms", &self.transforms.len())
            .field("interpreter", &self.interpreter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three() -> TransformBank {
        TransformBank::new(vec![
            Arc::new(|_: &[f64], _: &[&[f64]]| vec![0.0]) as Transform,
            Arc::new(|_: &[f64], _: &[&[f64]]| vec![1.0]) as Transform,
            Arc::new(|_: &[f64], _: &[&[f64]]| vec![2.0]) as Transform,
        ])
        .unwrap()
    }

    #[test]
    fn test_empty_bank_rejected() {
        assert!(matches!(
            TransformBank::new(Vec::new()),
            Err(ChaosError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_default_index_rule() {
        let bank = three();
        assert_eq!(bank.select_index(0.0).unwrap(), 0);
        assert_eq!(bank.select_index(0.5).unwrap(), 1);
        assert_eq!(bank.select_index(0.9).unwrap(), 2);
        // Integral values wrap to 0.
        assert_eq!(bank.select_index(7.0).unwrap(), 0);
        // Negative values wrap into range.
        assert_eq!(bank.select_index(-0.5).unwrap(), 1);
        assert!(bank.select_index(f64::NAN).is_err());
    }

    #[test]
    fn test_interpreter_overrides_rule() {
        let bank = three().with_interpreter(|v, n| (v.abs() as usize) % n);
        assert_eq!(bank.select_index(5.0).unwrap(), 2);
        let bad = three().with_interpreter(|_, n| n);
        assert!(bad.select_index(0.0).is_err());
    }

    #[test]
    fn test_apply() {
        let bank = three();
        assert_eq!(bank.apply(2, &[], &[]).unwrap(), vec![2.0]);
        assert!(bank.apply(3, &[], &[]).is_err());
        assert_eq!(TransformBank::sum().apply(0, &[1.0, 2.0], &[]).unwrap(), vec![3.0]);
    }

    #[test]
    fn test_transform_reads_weights() {
        let add_bias = Arc::new(|x: &[f64], w: &[&[f64]]| {
            x.iter().zip(w[1]).map(|(v, b)| v + b).collect::<Vec<f64>>()
        }) as Transform;
        let bank = TransformBank::new(vec![add_bias]).unwrap();
        let kernel = [1.0, 0.0, 0.0, 1.0];
        let bias = [0.5, -0.5];
        let out = bank.apply(0, &[1.0, 2.0], &[&kernel, &bias]).unwrap();
        assert_eq!(out, vec![1.5, 1.5]);
    }
}
