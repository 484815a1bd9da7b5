// ─────────────────────────────────────────────────────────────────────
// Chaos Intelligence — PyO3 FFI Bindings
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
// No #![deny(unsafe_code)]: the PyO3 macros expand to unsafe blocks.
//! Python-callable wrappers around the chaotic functions and layers.
//!
//! # FFI Safety
//!
//! - GIL acquired via `Python::with_gil` before every Python callback.
//! - Python exceptions inside a bound callable surface as
//!   `InvalidParameter` on the Rust side and `ValueError` in Python.
//! - Layers are held behind `SharedLayer`, so calls from several Python
//!   threads are serialised. The GIL is released before that lock is
//!   taken; a bound Python callable reacquires it inside the lock.
//!
//! Usage from Python:
//! ```python
//! from chaos_intelligence import CoreLayer, LorenzAttractor
//!
//! layer = CoreLayer(units=4, function="lorenz", mode="blind_override")
//! out = layer(input=[0.1, 0.2, 0.3])
//! ```

use pyo3::exceptions::{PyLookupError, PyRuntimeError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use chaos_core::{
    CoreLayer, DenseHost, LayerVariant, OverrideMode, Selection, SharedLayer,
};
use chaos_functions::conformance::{self, Probe};
use chaos_functions::{
    DeterministicFunction, ExternalFunction, HasseAlgorithm, LorenzAttractor, LorenzSampler,
};
use chaos_types::{ChaosConfig, ChaosError, ChaosResult, Determinism};

fn to_py_err(e: ChaosError) -> PyErr {
    match e {
        ChaosError::ContractViolation(_) => PyTypeError::new_err(e.to_string()),
        ChaosError::NoMatchingBranch { .. } => PyLookupError::new_err(e.to_string()),
        ChaosError::InvalidParameter(_)
        | ChaosError::Config(_)
        | ChaosError::ShapeMismatch { .. } => PyValueError::new_err(e.to_string()),
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

/// Adapt a Python callable `f(list[float]) -> list[float]`.
///
/// With a seed the function is declared entropy-based and the callable is
/// invoked as `f(input, seed)`, where `seed` is a fresh integer from the
/// function's own generator.
fn python_function(
    callable: PyObject,
    name: String,
    output_dim: usize,
    seed: Option<u64>,
) -> ExternalFunction {
    match seed {
        None => ExternalFunction::new(name, Determinism::Deterministic, output_dim)
            .with_evaluate(move |input| call_python(&callable, input, None)),
        Some(seed) => ExternalFunction::new(name, Determinism::Entropy { seed }, output_dim)
            .with_seeded_evaluate(move |input, draw| call_python(&callable, input, Some(draw))),
    }
}

fn call_python(callable: &PyObject, input: &[f64], draw: Option<u64>) -> ChaosResult<Vec<f64>> {
    Python::with_gil(|py| {
        let result = match draw {
            None => callable.call1(py, (input.to_vec(),)),
            Some(draw) => callable.call1(py, (input.to_vec(), draw)),
        }
        .map_err(|e| ChaosError::InvalidParameter(format!("python callable failed: {e}")))?;
        result.extract::<Vec<f64>>(py).map_err(|e| {
            ChaosError::ContractViolation(format!("python callable must return floats: {e}"))
        })
    })
}

// ─── PyChaosConfig ──────────────────────────────────────────────────

/// Python-visible configuration.
#[pyclass(name = "ChaosConfig")]
#[derive(Clone)]
struct PyChaosConfig {
    inner: ChaosConfig,
}

#[pymethods]
impl PyChaosConfig {
    #[new]
    #[pyo3(signature = (
        sigma = 10.0,
        rho = 28.0,
        beta = 2.666_666_666_666_666_5,
        dt = 0.01,
        order = 1,
        units = 32,
        seed = 0x5EED,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        sigma: f64,
        rho: f64,
        beta: f64,
        dt: f64,
        order: u32,
        units: usize,
        seed: u64,
    ) -> PyResult<Self> {
        let mut config = ChaosConfig::default();
        config.lorenz.sigma = sigma;
        config.lorenz.rho = rho;
        config.lorenz.beta = beta;
        config.lorenz.dt = dt;
        config.hasse.order = order;
        config.layer.units = units;
        config.layer.seed = seed;
        config.validate().map_err(to_py_err)?;
        Ok(Self { inner: config })
    }

    /// Construct from JSON string.
    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        let config = ChaosConfig::from_json(json).map_err(to_py_err)?;
        config.validate().map_err(to_py_err)?;
        Ok(Self { inner: config })
    }

    fn to_json(&self) -> PyResult<String> {
        self.inner.to_json().map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        format!(
            "ChaosConfig(sigma={}, rho={}, beta={:.4}, dt={}, order={}, units={})",
            self.inner.lorenz.sigma,
            self.inner.lorenz.rho,
            self.inner.lorenz.beta,
            self.inner.lorenz.dt,
            self.inner.hasse.order,
            self.inner.layer.units
        )
    }
}

// ─── PyLorenzAttractor ──────────────────────────────────────────────

#[pyclass(name = "LorenzAttractor")]
struct PyLorenzAttractor {
    inner: LorenzAttractor,
}

#[pymethods]
impl PyLorenzAttractor {
    #[new]
    #[pyo3(signature = (
        sigma = 10.0,
        rho = 28.0,
        beta = 2.666_666_666_666_666_5,
        initial = (1.0, 1.0, 1.0),
    ))]
    fn new(sigma: f64, rho: f64, beta: f64, initial: (f64, f64, f64)) -> Self {
        Self {
            inner: LorenzAttractor::new(sigma, rho, beta, [initial.0, initial.1, initial.2]),
        }
    }

    #[staticmethod]
    fn from_config(config: &PyChaosConfig) -> PyResult<Self> {
        let inner = LorenzAttractor::from_config(&config.inner.lorenz).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    fn step(&mut self, dt: f64) -> PyResult<(f64, f64, f64)> {
        let p = self.inner.step(dt).map_err(to_py_err)?;
        Ok((p[0], p[1], p[2]))
    }

    fn run(&mut self, dt: f64, n_steps: u64) -> PyResult<(f64, f64, f64)> {
        let p = self.inner.run(dt, n_steps).map_err(to_py_err)?;
        Ok((p[0], p[1], p[2]))
    }

    fn reset(&mut self) {
        DeterministicFunction::reset(&mut self.inner);
    }

    fn state<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let s = self.inner.state();
        let dict = PyDict::new(py);
        dict.set_item("x", s.x)?;
        dict.set_item("y", s.y)?;
        dict.set_item("z", s.z)?;
        dict.set_item("t", s.t)?;
        dict.set_item("step_count", s.step_count)?;
        Ok(dict)
    }

    fn __repr__(&self) -> String {
        let s = self.inner.state();
        format!(
            "LorenzAttractor(sigma={}, rho={}, beta={:.4}, state=({:.4}, {:.4}, {:.4}))",
            self.inner.sigma, self.inner.rho, self.inner.beta, s.x, s.y, s.z
        )
    }
}

// ─── PyHasseAlgorithm ───────────────────────────────────────────────

#[pyclass(name = "HasseAlgorithm")]
struct PyHasseAlgorithm {
    inner: HasseAlgorithm,
}

#[pymethods]
impl PyHasseAlgorithm {
    #[new]
    #[pyo3(signature = (order = 1))]
    fn new(order: u32) -> PyResult<Self> {
        let inner = HasseAlgorithm::new(order).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    fn evaluate(&self, n: i64) -> PyResult<u64> {
        self.inner.evaluate(n).map_err(to_py_err)
    }

    #[staticmethod]
    fn stopping_time(n: i64) -> PyResult<u64> {
        HasseAlgorithm::stopping_time(n).map_err(to_py_err)
    }

    #[staticmethod]
    fn trajectory(n: i64) -> PyResult<Vec<u64>> {
        HasseAlgorithm::trajectory(n).map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        format!("HasseAlgorithm(order={})", self.inner.order())
    }
}

// ─── PyCoreLayer ────────────────────────────────────────────────────

fn parse_variant(s: &str) -> PyResult<LayerVariant> {
    match s.to_ascii_lowercase().as_str() {
        "core" => Ok(LayerVariant::Core),
        "no_blind_override" => Ok(LayerVariant::NoBlindOverride),
        "universal" => Ok(LayerVariant::Universal),
        other => Err(PyValueError::new_err(format!("unknown layer variant `{other}`"))),
    }
}

fn parse_selection(s: &str, weight: f64) -> PyResult<Selection> {
    match s.to_ascii_lowercase().as_str() {
        "pass_through" => Ok(Selection::PassThrough),
        "blind_override" | "override" => Ok(Selection::Override),
        "blend" => Ok(Selection::Blend(weight)),
        other => Err(PyValueError::new_err(format!("unknown override mode `{other}`"))),
    }
}

fn fixed_mode(selection: Selection) -> OverrideMode {
    match selection {
        Selection::PassThrough => OverrideMode::PassThrough,
        Selection::Override => OverrideMode::BlindOverride,
        Selection::Blend(w) => OverrideMode::Blend(w),
    }
}

/// Chaotic layer over a dense host.
#[pyclass(name = "CoreLayer")]
struct PyCoreLayer {
    inner: SharedLayer<DenseHost>,
}

#[pymethods]
impl PyCoreLayer {
    /// `function` is "lorenz", "hasse", "lorenz_sampler", or a callable
    /// taking and returning a list of floats. A callable that draws
    /// random numbers declares `entropy_seed`.
    #[new]
    #[pyo3(signature = (
        units = 32,
        function = None,
        mode = "blind_override",
        variant = "core",
        weight = 0.5,
        seed = 0x5EED,
        function_args = None,
        output_dim = 1,
        entropy_seed = None,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        py: Python<'_>,
        units: usize,
        function: Option<PyObject>,
        mode: &str,
        variant: &str,
        weight: f64,
        seed: u64,
        function_args: Option<Vec<f64>>,
        output_dim: usize,
        entropy_seed: Option<u64>,
    ) -> PyResult<Self> {
        let bound: Box<dyn DeterministicFunction> = match function {
            None => Box::new(LorenzAttractor::default()),
            Some(obj) => {
                if let Ok(name) = obj.extract::<String>(py) {
                    match name.as_str() {
                        "lorenz" => Box::new(LorenzAttractor::default()),
                        "hasse" => Box::new(HasseAlgorithm::default()),
                        "lorenz_sampler" => Box::new(
                            LorenzSampler::new(seed, [10.0, 10.0, 10.0]).map_err(to_py_err)?,
                        ),
                        other => {
                            return Err(PyValueError::new_err(format!(
                                "unknown function `{other}`"
                            )))
                        }
                    }
                } else {
                    Box::new(python_function(
                        obj,
                        "python".to_string(),
                        output_dim,
                        entropy_seed,
                    ))
                }
            }
        };
        let selection = parse_selection(mode, weight)?;
        let layer = CoreLayer::builder(DenseHost::new("chaos_layer", units, seed), bound)
            .variant(parse_variant(variant)?)
            .mode(fixed_mode(selection))
            .seed(seed)
            .function_args(function_args.unwrap_or_default())
            .build()
            .map_err(to_py_err)?;
        Ok(Self {
            inner: SharedLayer::new(layer),
        })
    }

    #[pyo3(signature = (input, mode = None, weight = 0.5))]
    fn __call__(
        &self,
        py: Python<'_>,
        input: Vec<f64>,
        mode: Option<&str>,
        weight: f64,
    ) -> PyResult<Vec<f64>> {
        let selection = mode.map(|m| parse_selection(m, weight)).transpose()?;
        let layer = &self.inner;
        py.allow_threads(|| match selection {
            None => layer.call(&input),
            Some(selection) => layer.call_with(&input, selection),
        })
        .map_err(to_py_err)
    }

    #[getter]
    fn calls(&self, py: Python<'_>) -> u64 {
        let layer = &self.inner;
        py.allow_threads(|| layer.calls())
    }

    fn history<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let layer = &self.inner;
        let h = py.allow_threads(|| layer.with(|l| l.history().clone()));
        let dict = PyDict::new(py);
        dict.set_item("calls", h.calls)?;
        dict.set_item("function_args", h.function_args)?;
        dict.set_item("last_input", h.last_input)?;
        dict.set_item("last_entropy", h.last_entropy)?;
        dict.set_item("last_chaos", h.last_chaos)?;
        dict.set_item("last_branch", h.last_branch)?;
        Ok(dict)
    }

    fn reset(&self, py: Python<'_>) {
        let layer = &self.inner;
        py.allow_threads(|| layer.with(|l| l.reset()));
    }

    fn __repr__(&self, py: Python<'_>) -> String {
        let layer = &self.inner;
        py.allow_threads(|| layer.with(|l| l.to_string()))
    }
}

/// Run the conformance protocol against a Python callable.
///
/// With `seed` the callable is checked as an entropy function and is
/// called as `f(input, seed)`. Returns `(passed, reason)`.
#[pyfunction]
#[pyo3(signature = (callable, output_dim = 1, probe = None, seed = None))]
fn check_function(
    callable: PyObject,
    output_dim: usize,
    probe: Option<Vec<f64>>,
    seed: Option<u64>,
) -> (bool, Option<String>) {
    let f = python_function(callable, "python".to_string(), output_dim, seed);
    let report = conformance::check(&f, &Probe::new(probe.unwrap_or_default()));
    (report.passed, report.reason)
}

// ─── Module ─────────────────────────────────────────────────────────

#[pymodule]
fn chaos_intelligence(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyChaosConfig>()?;
    m.add_class::<PyLorenzAttractor>()?;
    m.add_class::<PyHasseAlgorithm>()?;
    m.add_class::<PyCoreLayer>()?;
    m.add_function(wrap_pyfunction!(check_function, m)?)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
