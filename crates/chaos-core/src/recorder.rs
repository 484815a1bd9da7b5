// ─────────────────────────────────────────────────────────────────────
// Chaos Intelligence — Recording and Graph Assimilation
// ─────────────────────────────────────────────────────────────────────
//! Captures what flows through host layers.
//!
//! `Recorder` wraps a single host and records its inputs and outputs,
//! either every call (`Collect`) or only the latest (`Single`).
//! `GraphAssimilator` wraps every layer of a `Sequential` model and
//! hands the recorders back as plain layers on `revert`.

use std::str::FromStr;
use std::sync::Arc;

use chaos_types::{ChaosError, ChaosResult};
use serde::{Deserialize, Serialize};

use crate::host::HostLayer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    /// Append every call.
    #[default]
    Collect,
    /// Keep only the latest call.
    Single,
}

impl FromStr for SaveMode {
    type Err = ChaosError;

    /// Case-insensitive `collect` / `single`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "collect" => Ok(SaveMode::Collect),
            "single" => Ok(SaveMode::Single),
            other => Err(ChaosError::InvalidParameter(format!(
                "save modes are `collect` and `single`, got `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub inputs: Vec<Vec<f64>>,
    pub outputs: Vec<Vec<f64>>,
}

impl Trace {
    fn push(&mut self, mode: SaveMode, input: &[f64], output: &[f64]) {
        if mode == SaveMode::Single {
            self.inputs.clear();
            self.outputs.clear();
        }
        self.inputs.push(input.to_vec());
        self.outputs.push(output.to_vec());
    }
}

/// Host wrapper recording every forward pass.
#[derive(Debug)]
pub struct Recorder<H: HostLayer> {
    inner: H,
    mode: SaveMode,
    trace: Trace,
}

impl<H: HostLayer> Recorder<H> {
    pub fn new(inner: H, mode: SaveMode) -> Self {
        Self {
            inner,
            mode,
            trace: Trace::default(),
        }
    }

    pub fn mode(&self) -> SaveMode {
        self.mode
    }

    /// Recorded data; fails if no input or no output was captured.
    pub fn retrieve(&self) -> ChaosResult<&Trace> {
        if self.trace.inputs.is_empty() {
            return Err(ChaosError::NotRecorded(format!(
                "no input recorded for `{}`",
                self.inner.name()
            )));
        }
        if self.trace.outputs.is_empty() {
            return Err(ChaosError::NotRecorded(format!(
                "no output recorded for `{}`",
                self.inner.name()
            )));
        }
        Ok(&self.trace)
    }

    pub fn clear(&mut self) {
        self.trace = Trace::default();
    }

    /// Drop the recording and return the wrapped host.
    pub fn into_inner(self) -> H {
        self.inner
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }
}

impl<H: HostLayer> HostLayer for Recorder<H> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn units(&self) -> usize {
        self.inner.units()
    }

    fn build(&mut self, input_dim: usize) -> ChaosResult<()> {
        self.inner.build(input_dim)
    }

    fn is_built(&self) -> bool {
        self.inner.is_built()
    }

    fn call(&mut self, input: &[f64]) -> ChaosResult<Vec<f64>> {
        let output = self.inner.call(input)?;
        self.trace.push(self.mode, input, &output);
        Ok(output)
    }

    fn weights(&self) -> Vec<&[f64]> {
        self.inner.weights()
    }
}

/// Ordered stack of host layers.
#[derive(Default)]
pub struct Sequential {
    name: String,
    layers: Vec<Box<dyn HostLayer>>,
}

impl Sequential {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layers: Vec::new(),
        }
    }

    pub fn push(mut self, layer: impl HostLayer + 'static) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[Box<dyn HostLayer>] {
        &self.layers
    }

    pub fn into_layers(self) -> Vec<Box<dyn HostLayer>> {
        self.layers
    }
}

impl HostLayer for Sequential {
    fn name(&self) -> &str {
        &self.name
    }

    fn units(&self) -> usize {
        self.layers.last().map_or(0, |l| l.units())
    }

    /// Build every layer in order, chaining widths.
    fn build(&mut self, input_dim: usize) -> ChaosResult<()> {
        let mut width = input_dim;
        for layer in &mut self.layers {
            layer.build(width)?;
            width = layer.units();
        }
        Ok(())
    }

    fn is_built(&self) -> bool {
        self.layers.iter().all(|l| l.is_built())
    }

    fn call(&mut self, input: &[f64]) -> ChaosResult<Vec<f64>> {
        let mut x = input.to_vec();
        for layer in &mut self.layers {
            if !layer.is_built() {
                layer.build(x.len())?;
            }
            x = layer.call(&x)?;
        }
        Ok(x)
    }

    fn weights(&self) -> Vec<&[f64]> {
        self.layers.iter().flat_map(|l| l.weights()).collect()
    }
}

/// Recorded data of one layer of an assimilated model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub name: String,
    pub position: usize,
    pub trace: Trace,
}

type Interpreter = Arc<dyn Fn(&[f64]) -> Vec<f64> + Send + Sync>;

/// Processed `(inputs, outputs)` per layer.
pub type ProcessedMap = Vec<(Vec<Vec<f64>>, Vec<Vec<f64>>)>;

/// Records every layer of a `Sequential` model.
pub struct GraphAssimilator {
    name: String,
    recorders: Vec<Recorder<Box<dyn HostLayer>>>,
    interpreter: Option<Interpreter>,
}

impl GraphAssimilator {
    pub fn assimilate(model: Sequential, mode: SaveMode) -> Self {
        let name = model.name.clone();
        let recorders = model
            .into_layers()
            .into_iter()
            .map(|layer| Recorder::new(layer, mode))
            .collect();
        Self {
            name,
            recorders,
            interpreter: None,
        }
    }

    /// Forward pass through every recorded layer.
    pub fn call(&mut self, input: &[f64]) -> ChaosResult<Vec<f64>> {
        let mut x = input.to_vec();
        for recorder in &mut self.recorders {
            if !recorder.is_built() {
                recorder.build(x.len())?;
            }
            x = recorder.call(&x)?;
        }
        Ok(x)
    }

    pub fn retrieve(&self) -> ChaosResult<Vec<LayerRecord>> {
        self.recorders
            .iter()
            .enumerate()
            .map(|(position, r)| {
                Ok(LayerRecord {
                    name: r.name().to_string(),
                    position,
                    trace: r.retrieve()?.clone(),
                })
            })
            .collect()
    }

    pub fn set_interpreter(&mut self, f: impl Fn(&[f64]) -> Vec<f64> + Send + Sync + 'static) {
        self.interpreter = Some(Arc::new(f));
    }

    pub fn clear_interpreter(&mut self) {
        self.interpreter = None;
    }

    /// Recorded data with the interpreter applied to every vector.
    pub fn process_map(&self) -> ChaosResult<ProcessedMap> {
        let interpret = |v: &Vec<f64>| match &self.interpreter {
            Some(f) => f(v),
            None => v.clone(),
        };
        Ok(self
            .retrieve()?
            .into_iter()
            .map(|record| {
                (
                    record.trace.inputs.iter().map(interpret).collect(),
                    record.trace.outputs.iter().map(interpret).collect(),
                )
            })
            .collect())
    }

    /// Unwrap every recorder and return the bare model.
    pub fn revert(self) -> Sequential {
        Sequential {
            name: self.name,
            layers: self
                .recorders
                .into_iter()
                .map(Recorder::into_inner)
                .collect(),
        }
    }
}
