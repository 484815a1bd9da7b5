// ─────────────────────────────────────────────────────────────────────
// Chaos Intelligence — Chaotic Layer
// ─────────────────────────────────────────────────────────────────────
//! Composes a host layer's forward computation with a bound chaotic
//! function.
//!
//! One generic wrapper covers the three variants:
//! - `Core`: override mode fixed at binding.
//! - `NoBlindOverride`: fixed mode, blind override refused.
//! - `Universal`: toggle mode, selection chosen per call.
//!
//! Each invocation evaluates the bound function exactly once, in every
//! mode, so stateful functions advance in lock-step with the host's
//! call order.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use chaos_functions::conformance::{self, EntropyExpectation, Probe};
use chaos_functions::{DeterministicFunction, SimpleRng};
use chaos_types::{ChaosError, ChaosResult, FunctionDescriptor, LayerConfig};

use crate::bank::TransformBank;
use crate::dispatch::{OverrideDispatcher, OverrideMode, Selection};
use crate::host::HostLayer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerVariant {
    Core,
    NoBlindOverride,
    Universal,
}

impl fmt::Display for LayerVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LayerVariant::Core => "Core",
            LayerVariant::NoBlindOverride => "NoBlindOverride",
            LayerVariant::Universal => "Universal",
        };
        f.write_str(s)
    }
}

/// Record of the most recent invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerHistory {
    pub calls: u64,
    /// Arguments passed to the bound function on every call.
    pub function_args: Vec<f64>,
    pub last_input: Vec<f64>,
    pub last_entropy: Option<f64>,
    pub last_chaos: Vec<f64>,
    pub last_branch: Option<usize>,
    pub last_selection: Option<Selection>,
}

/// Chaotic layer over host `H`.
pub struct CoreLayer<H: HostLayer> {
    host: H,
    function: Box<dyn DeterministicFunction>,
    descriptor: FunctionDescriptor,
    dispatcher: OverrideDispatcher,
    variant: LayerVariant,
    bank: Option<TransformBank>,
    seed: u64,
    rng: SimpleRng,
    history: LayerHistory,
}

impl<H: HostLayer> CoreLayer<H> {
    pub fn builder(host: H, function: Box<dyn DeterministicFunction>) -> CoreLayerBuilder<H> {
        CoreLayerBuilder::new(host, function)
    }

    /// Bind `function` to `host` with default seed and no transform bank.
    pub fn bind(
        host: H,
        function: Box<dyn DeterministicFunction>,
        variant: LayerVariant,
        mode: OverrideMode,
    ) -> ChaosResult<Self> {
        Self::builder(host, function)
            .variant(variant)
            .mode(mode)
            .build()
    }

    /// Forward pass under the layer's fixed (or default) selection.
    pub fn call(&mut self, input: &[f64]) -> ChaosResult<Vec<f64>> {
        self.invoke(input, None)
    }

    /// Forward pass with an explicit selection. `Universal` only.
    pub fn call_with(&mut self, input: &[f64], selection: Selection) -> ChaosResult<Vec<f64>> {
        if self.variant != LayerVariant::Universal {
            return Err(ChaosError::InvalidParameter(format!(
                "{} layer `{}` has a fixed override mode",
                self.variant,
                self.host.name()
            )));
        }
        self.invoke(input, Some(selection))
    }

    /// History is recorded as soon as the function has stepped, so a call
    /// that later fails in the bank or the dispatcher still counts.
    fn invoke(&mut self, input: &[f64], toggle: Option<Selection>) -> ChaosResult<Vec<f64>> {
        let selection = self.dispatcher.select(toggle)?;

        if !self.host.is_built() {
            self.host.build(input.len())?;
        }
        let host_out = self.host.call(input)?;

        let chaos = self.function.evaluate(&self.history.function_args)?;
        let entropy = self.rng.next_f64();

        self.history.calls += 1;
        self.history.last_input = input.to_vec();
        self.history.last_entropy = Some(entropy);
        self.history.last_chaos = chaos;
        self.history.last_branch = None;
        self.history.last_selection = Some(selection);

        let deterministic = match &self.bank {
            Some(bank) => {
                let value = self.history.last_chaos.first().copied().unwrap_or(0.0);
                let index = bank.select_index(value)?;
                self.history.last_branch = Some(index);
                bank.apply(index, input, &self.host.weights())?
            }
            None => self.history.last_chaos.clone(),
        };

        log::debug!(
            "layer `{}` call {}: {selection:?}, branch {:?}",
            self.host.name(),
            self.history.calls,
            self.history.last_branch
        );
        OverrideDispatcher::combine(selection, host_out, &deterministic)
    }

    /// Draw from the layer's entropy generator outside a forward pass.
    pub fn use_rand(&mut self) -> f64 {
        self.rng.next_f64()
    }

    /// Delegate parameter creation to the host.
    pub fn build(&mut self, input_dim: usize) -> ChaosResult<()> {
        self.host.build(input_dim)
    }

    /// Restore the function, generator and history; host weights stay.
    pub fn reset(&mut self) {
        self.function.reset();
        self.rng = SimpleRng::new(self.seed);
        let args = std::mem::take(&mut self.history.function_args);
        self.history = LayerHistory {
            function_args: args,
            ..LayerHistory::default()
        };
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn function(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    pub fn mode(&self) -> OverrideMode {
        self.dispatcher.mode()
    }

    pub fn variant(&self) -> LayerVariant {
        self.variant
    }

    pub fn history(&self) -> &LayerHistory {
        &self.history
    }

    /// Number of candidate transforms (1 without a bank).
    pub fn function_count(&self) -> usize {
        self.bank.as_ref().map_or(1, TransformBank::len)
    }
}

impl<H: HostLayer> fmt::Display for CoreLayer<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Chaos {} Layer [{}]: {} unit(s), {} function(s)",
            self.variant,
            self.host.name(),
            self.host.units(),
            self.function_count()
        )
    }
}

impl<H: HostLayer> fmt::Debug for CoreLayer<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreLayer")
            .field("host", &self.host.name())
            .field("function", &self.descriptor.name)
            .field("variant", &self.variant)
            .field("mode", &self.dispatcher.mode())
            .field("calls", &self.history.calls)
            .finish()
    }
}

/// A chaotic layer stacks like any other host.
impl<H: HostLayer> HostLayer for CoreLayer<H> {
    fn name(&self) -> &str {
        self.host.name()
    }

    fn units(&self) -> usize {
        self.host.units()
    }

    fn build(&mut self, input_dim: usize) -> ChaosResult<()> {
        self.host.build(input_dim)
    }

    fn is_built(&self) -> bool {
        self.host.is_built()
    }

    fn call(&mut self, input: &[f64]) -> ChaosResult<Vec<f64>> {
        CoreLayer::call(self, input)
    }

    fn weights(&self) -> Vec<&[f64]> {
        self.host.weights()
    }
}

/// Binding options for a `CoreLayer`.
pub struct CoreLayerBuilder<H: HostLayer> {
    host: H,
    function: Box<dyn DeterministicFunction>,
    variant: LayerVariant,
    mode: OverrideMode,
    bank: Option<TransformBank>,
    seed: u64,
    function_args: Vec<f64>,
    entropy: Option<EntropyExpectation>,
}

impl<H: HostLayer> CoreLayerBuilder<H> {
    pub fn new(host: H, function: Box<dyn DeterministicFunction>) -> Self {
        let defaults = LayerConfig::default();
        Self {
            host,
            function,
            variant: LayerVariant::Core,
            mode: OverrideMode::from_config(defaults.mode),
            bank: None,
            seed: defaults.seed,
            function_args: Vec::new(),
            entropy: None,
        }
    }

    pub fn variant(mut self, variant: LayerVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn mode(mut self, mode: OverrideMode) -> Self {
        self.mode = mode;
        self
    }

    /// Mode and seed from configuration.
    pub fn config(mut self, config: &LayerConfig) -> Self {
        self.mode = OverrideMode::from_config(config.mode);
        self.seed = config.seed;
        self
    }

    pub fn bank(mut self, bank: TransformBank) -> Self {
        self.bank = Some(bank);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Arguments passed to the function on every call; also the
    /// conformance probe input.
    pub fn function_args(mut self, args: Vec<f64>) -> Self {
        self.function_args = args;
        self
    }

    pub fn entropy_expectation(mut self, expectation: EntropyExpectation) -> Self {
        self.entropy = Some(expectation);
        self
    }

    /// Run the conformance protocol and assemble the layer.
    pub fn build(self) -> ChaosResult<CoreLayer<H>> {
        let probe = Probe {
            input: self.function_args.clone(),
            entropy: self.entropy,
        };
        conformance::ensure(self.function.as_ref(), &probe)?;
        self.assemble()
    }

    /// Assemble without re-running conformance.
    pub(crate) fn assemble(self) -> ChaosResult<CoreLayer<H>> {
        let mode = resolve_mode(self.variant, self.mode)?;
        let dispatcher = OverrideDispatcher::new(mode)?;
        let descriptor = self.function.descriptor();
        log::info!(
            "bound {} to `{}` as {} layer ({mode:?})",
            descriptor.name,
            self.host.name(),
            self.variant
        );
        Ok(CoreLayer {
            host: self.host,
            function: self.function,
            descriptor,
            dispatcher,
            variant: self.variant,
            bank: self.bank,
            seed: self.seed,
            rng: SimpleRng::new(self.seed),
            history: LayerHistory {
                function_args: self.function_args,
                ..LayerHistory::default()
            },
        })
    }
}

fn resolve_mode(variant: LayerVariant, mode: OverrideMode) -> ChaosResult<OverrideMode> {
    match variant {
        LayerVariant::Universal => Ok(mode.into_toggle()),
        _ if mode.is_toggle() => Err(ChaosError::InvalidParameter(format!(
            "{variant} layer cannot use a toggle mode; use the Universal variant"
        ))),
        LayerVariant::NoBlindOverride if mode.can_override() => Err(
            ChaosError::InvalidParameter("blind override is disabled for this variant".to_string()),
        ),
        _ => Ok(mode),
    }
}

/// Creates layers from one host constructor and one prototype function.
///
/// The prototype passes conformance once, when the factory is created;
/// each layer receives its own fork.
pub struct LayerFactory<H, F>
where
    H: HostLayer,
    F: FnMut(usize) -> H,
{
    make_host: F,
    prototype: Box<dyn DeterministicFunction>,
    variant: LayerVariant,
    mode: OverrideMode,
    seed: u64,
    function_args: Vec<f64>,
    bank: Option<TransformBank>,
    created: usize,
}

impl<H, F> LayerFactory<H, F>
where
    H: HostLayer,
    F: FnMut(usize) -> H,
{
    pub fn new(
        make_host: F,
        prototype: &dyn DeterministicFunction,
        variant: LayerVariant,
        mode: OverrideMode,
    ) -> ChaosResult<Self> {
        Self::with_args(make_host, prototype, variant, mode, Vec::new())
    }

    pub fn with_args(
        make_host: F,
        prototype: &dyn DeterministicFunction,
        variant: LayerVariant,
        mode: OverrideMode,
        function_args: Vec<f64>,
    ) -> ChaosResult<Self> {
        conformance::ensure(prototype, &Probe::new(function_args.clone()))?;
        resolve_mode(variant, mode)?;
        Ok(Self {
            make_host,
            prototype: prototype.fork(),
            variant,
            mode,
            seed: LayerConfig::default().seed,
            function_args,
            bank: None,
            created: 0,
        })
    }

    /// Base seed; layer `i` uses `seed + i`.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Every created layer gets a clone of `bank`.
    pub fn bank(mut self, bank: TransformBank) -> Self {
        self.bank = Some(bank);
        self
    }

    /// Re-check the prototype against an entropy expectation.
    pub fn entropy_expectation(self, expectation: EntropyExpectation) -> ChaosResult<Self> {
        let probe = Probe::new(self.function_args.clone()).with_entropy(expectation);
        conformance::ensure(self.prototype.as_ref(), &probe)?;
        Ok(self)
    }

    pub fn create(&mut self) -> ChaosResult<CoreLayer<H>> {
        let index = self.created;
        let host = (self.make_host)(index);
        let mut builder = CoreLayerBuilder::new(host, self.prototype.fork())
            .variant(self.variant)
            .mode(self.mode)
            .seed(self.seed.wrapping_add(index as u64))
            .function_args(self.function_args.clone());
        if let Some(bank) = &self.bank {
            builder = builder.bank(bank.clone());
        }
        let layer = builder.assemble()?;
        self.created += 1;
        Ok(layer)
    }
}

/// Retrofit `count` hosts built by `make_host` with forks of `prototype`.
pub fn retrofit<H, F>(
    count: usize,
    make_host: F,
    prototype: &dyn DeterministicFunction,
    variant: LayerVariant,
    mode: OverrideMode,
) -> ChaosResult<Vec<CoreLayer<H>>>
where
    H: HostLayer,
    F: FnMut(usize) -> H,
{
    let mut factory = LayerFactory::new(make_host, prototype, variant, mode)?;
    (0..count).map(|_| factory.create()).collect()
}

/// Layer shared across threads; invocations are serialised.
pub struct SharedLayer<H: HostLayer> {
    inner: Arc<Mutex<CoreLayer<H>>>,
}

impl<H: HostLayer> Clone for SharedLayer<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: HostLayer> SharedLayer<H> {
    pub fn new(layer: CoreLayer<H>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(layer)),
        }
    }

    pub fn call(&self, input: &[f64]) -> ChaosResult<Vec<f64>> {
        self.inner.lock().call(input)
    }

    pub fn call_with(&self, input: &[f64], selection: Selection) -> ChaosResult<Vec<f64>> {
        self.inner.lock().call_with(input, selection)
    }

    pub fn calls(&self) -> u64 {
        self.inner.lock().history().calls
    }

    /// Run `f` with exclusive access to the layer.
    pub fn with<R>(&self, f: impl FnOnce(&mut CoreLayer<H>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

#[cfg(test)]
mod tests {
    use chaos_functions::{
        CommonPiecewiseFunction, ExternalFunction, HasseAlgorithm, LorenzAttractor,
        LorenzSampler,
    };
    use chaos_types::{Determinism, ModeConfig};

    use super::*;
    use crate::bank::Transform;
    use crate::host::DenseHost;

    fn identity_host(width: usize) -> DenseHost {
        let mut kernel = vec![0.0; width * width];
        for i in 0..width {
            kernel[i * width + i] = 1.0;
        }
        DenseHost::with_weights("identity", width, kernel, vec![0.0; width]).unwrap()
    }

    fn lorenz() -> Box<dyn DeterministicFunction> {
        Box::new(LorenzAttractor::default())
    }

    #[test]
    fn test_blind_override_returns_lorenz_state() {
        let mut reference = LorenzAttractor::default();
        let mut layer = CoreLayer::bind(
            identity_host(3),
            lorenz(),
            LayerVariant::Core,
            OverrideMode::BlindOverride,
        )
        .unwrap();
        for input in [[1.0, 2.0, 3.0], [-5.0, 0.0, 1e6]] {
            let out = layer.call(&input).unwrap();
            assert_eq!(out, reference.step(0.01).unwrap().to_vec());
        }
    }

    #[test]
    fn test_pass_through_advances_function() {
        let mut layer = CoreLayer::bind(
            identity_host(2),
            lorenz(),
            LayerVariant::Core,
            OverrideMode::PassThrough,
        )
        .unwrap();
        let out = layer.call(&[0.25, -0.75]).unwrap();
        assert_eq!(out, vec![0.25, -0.75]);
        assert_eq!(layer.history().calls, 1);

        let mut reference = LorenzAttractor::default();
        let expected = reference.step(0.01).unwrap().to_vec();
        assert_eq!(layer.history().last_chaos, expected);

        layer.call(&[0.0, 0.0]).unwrap();
        let expected = reference.step(0.01).unwrap().to_vec();
        assert_eq!(layer.history().last_chaos, expected);
    }

    #[test]
    fn test_blend_mode() {
        let hasse = Box::new(HasseAlgorithm::default());
        let mut layer = CoreLayer::bind(
            identity_host(2),
            hasse,
            LayerVariant::Core,
            OverrideMode::Blend(0.5),
        )
        .unwrap();
        // Hasse cursor 27 -> 82
        let out = layer.call(&[2.0, 4.0]).unwrap();
        assert_eq!(out, vec![42.0, 43.0]);
    }

    #[test]
    fn test_host_built_lazily() {
        let host = DenseHost::new("dense", 4, 1);
        let mut layer =
            CoreLayer::bind(host, lorenz(), LayerVariant::Core, OverrideMode::PassThrough).unwrap();
        assert!(!layer.host().is_built());
        let out = layer.call(&[1.0, 2.0]).unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(layer.host().input_dim(), Some(2));
        assert_eq!(layer.weights().len(), 2);
    }

    #[test]
    fn test_override_fitted_to_host_width() {
        let host = DenseHost::new("wide", 5, 1);
        let mut layer =
            CoreLayer::bind(host, lorenz(), LayerVariant::Core, OverrideMode::BlindOverride)
                .unwrap();
        let out = layer.call(&[1.0]).unwrap();
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], out[3]);
        assert_eq!(out[1], out[4]);
    }

    #[test]
    fn test_no_blind_override_rejects_override() {
        let err = CoreLayer::bind(
            identity_host(1),
            lorenz(),
            LayerVariant::NoBlindOverride,
            OverrideMode::BlindOverride,
        )
        .unwrap_err();
        assert!(matches!(err, ChaosError::InvalidParameter(_)));

        let mut layer = CoreLayer::bind(
            identity_host(1),
            lorenz(),
            LayerVariant::NoBlindOverride,
            OverrideMode::Blend(0.0),
        )
        .unwrap();
        assert_eq!(layer.call(&[3.0]).unwrap(), vec![3.0]);
        assert!(layer.call_with(&[3.0], Selection::Override).is_err());
    }

    #[test]
    fn test_fixed_variants_reject_toggle_mode() {
        let err = CoreLayer::bind(
            identity_host(1),
            lorenz(),
            LayerVariant::Core,
            OverrideMode::Toggle(Selection::PassThrough),
        )
        .unwrap_err();
        assert!(matches!(err, ChaosError::InvalidParameter(_)));
    }

    #[test]
    fn test_core_rejects_call_with() {
        let mut layer = CoreLayer::bind(
            identity_host(1),
            lorenz(),
            LayerVariant::Core,
            OverrideMode::PassThrough,
        )
        .unwrap();
        assert!(layer.call_with(&[1.0], Selection::Override).is_err());
        assert_eq!(layer.history().calls, 0);
    }

    #[test]
    fn test_universal_toggles_per_call() {
        let mut layer = CoreLayer::bind(
            identity_host(1),
            Box::new(HasseAlgorithm::default()),
            LayerVariant::Universal,
            OverrideMode::PassThrough,
        )
        .unwrap();
        assert!(layer.mode().is_toggle());
        // 27 -> 82 -> 41 -> 124
        assert_eq!(layer.call(&[1.0]).unwrap(), vec![1.0]);
        assert_eq!(layer.call_with(&[1.0], Selection::Override).unwrap(), vec![41.0]);
        assert_eq!(layer.call_with(&[0.0], Selection::Blend(0.5)).unwrap(), vec![62.0]);
        assert_eq!(layer.history().last_selection, Some(Selection::Blend(0.5)));
    }

    #[test]
    fn test_conformance_runs_at_binding() {
        let hollow = ExternalFunction::new("hollow", Determinism::Deterministic, 1);
        let err = CoreLayer::bind(
            identity_host(1),
            Box::new(hollow),
            LayerVariant::Core,
            OverrideMode::BlindOverride,
        )
        .unwrap_err();
        assert!(matches!(err, ChaosError::ContractViolation(_)));
    }

    #[test]
    fn test_function_args_feed_piecewise() {
        let f = CommonPiecewiseFunction::new("split")
            .branch(|x| x < 0.0, |x| x * 10.0)
            .branch(|x| x == 0.0, |_| 1.0);
        let err = CoreLayer::builder(identity_host(1), Box::new(f.clone()))
            .function_args(vec![5.0])
            .build()
            .unwrap_err();
        assert!(matches!(err, ChaosError::ContractViolation(_)));

        let mut layer = CoreLayer::builder(identity_host(1), Box::new(f))
            .function_args(vec![-1.0])
            .build()
            .unwrap();
        assert_eq!(layer.call(&[9.0]).unwrap(), vec![-10.0]);
    }

    #[test]
    fn test_transform_bank_selection() {
        let bank = TransformBank::new(vec![
            Arc::new(|x: &[f64], _: &[&[f64]]| x.iter().map(|v| v + 100.0).collect::<Vec<f64>>())
                as Transform,
            Arc::new(|x: &[f64], _: &[&[f64]]| x.iter().map(|v| -v).collect::<Vec<f64>>())
                as Transform,
        ])
        .unwrap();
        // Constant 0.75 selects floor(1.5 mod 2) = 1.
        let constant = ExternalFunction::new("constant", Determinism::Deterministic, 1)
            .with_evaluate(|_| Ok(vec![0.75]));
        let mut layer = CoreLayer::builder(identity_host(2), Box::new(constant))
            .bank(bank)
            .build()
            .unwrap();
        assert_eq!(layer.call(&[1.0, 2.0]).unwrap(), vec![-1.0, -2.0]);
        assert_eq!(layer.history().last_branch, Some(1));
        assert_eq!(layer.function_count(), 2);
    }

    #[test]
    fn test_entropy_recorded_and_reproducible() {
        let make = || {
            CoreLayer::builder(identity_host(1), lorenz())
                .seed(77)
                .mode(OverrideMode::PassThrough)
                .build()
                .unwrap()
        };
        let mut a = make();
        let mut b = make();
        a.call(&[1.0]).unwrap();
        b.call(&[1.0]).unwrap();
        assert!(a.history().last_entropy.is_some());
        assert_eq!(a.history().last_entropy, b.history().last_entropy);
        assert_eq!(a.use_rand(), b.use_rand());
    }

    #[test]
    fn test_reset_replays() {
        let mut layer = CoreLayer::bind(
            identity_host(3),
            lorenz(),
            LayerVariant::Core,
            OverrideMode::BlindOverride,
        )
        .unwrap();
        let first = layer.call(&[0.0; 3]).unwrap();
        layer.call(&[0.0; 3]).unwrap();
        layer.reset();
        assert_eq!(layer.history().calls, 0);
        assert_eq!(layer.call(&[0.0; 3]).unwrap(), first);
    }

    #[test]
    fn test_config_mode() {
        let mut config = LayerConfig::default();
        config.mode = ModeConfig::PassThrough;
        let mut layer = CoreLayer::builder(identity_host(1), lorenz())
            .config(&config)
            .build()
            .unwrap();
        assert_eq!(layer.call(&[2.0]).unwrap(), vec![2.0]);
    }

    #[test]
    fn test_display() {
        let layer = CoreLayer::bind(
            DenseHost::new("chaos_1",
            32,
            1),
            lorenz(),
            LayerVariant::Core,
            OverrideMode::BlindOverride,
        )
        .unwrap();
        assert_eq!(
            layer.to_string(),
            "Chaos Core Layer [chaos_1]: 32 unit(s), 1 function(s)"
        );
    }

    #[test]
    fn test_retrofit_forks_prototype() {
        let prototype = LorenzAttractor::default();
        let mut layers = retrofit(
            3,
            |i| DenseHost::new(format!("dense_{i}"), 3, i as u64),
            &prototype,
            LayerVariant::Core,
            OverrideMode::BlindOverride,
        )
        .unwrap();
        assert_eq!(layers.len(), 3);
        let a = layers[0].call(&[1.0]).unwrap();
        let b = layers[1].call(&[1.0]).unwrap();
        layers[1].call(&[1.0]).unwrap();
        let c = layers[2].call(&[1.0]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(prototype.state().step_count, 0);
        assert_eq!(layers[2].host().name(), "dense_2");
    }

    #[test]
    fn test_factory_rejects_bad_prototype() {
        let hollow = ExternalFunction::new("hollow", Determinism::Deterministic, 1);
        let result = LayerFactory::new(
            |_| identity_host(1),
            &hollow,
            LayerVariant::Core,
            OverrideMode::BlindOverride,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_entropy_function_with_expectation() {
        let sampler = LorenzSampler::new(3, [0.0, 1.0, 0.0]).unwrap();
        let layer = CoreLayer::builder(identity_host(3), Box::new(sampler))
            .entropy_expectation(EntropyExpectation::new(5.0).with_cycles(2000))
            .build();
        assert!(layer.is_ok());
    }

    #[test]
    fn test_shared_layer_serialises_calls() {
        let layer = CoreLayer::bind(
            identity_host(1),
            lorenz(),
            LayerVariant::Core,
            OverrideMode::PassThrough,
        )
        .unwrap();
        let shared = SharedLayer::new(layer);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let s = shared.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        s.call(&[1.0]).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(shared.calls(), 100);
        let steps = shared.with(|l| {
            let mut reference = LorenzAttractor::default();
            let expected = reference.run(0.01, 100).unwrap().to_vec();
            l.history().last_chaos == expected
        });
        assert!(steps);
    }

    #[test]
    fn test_failed_combine_still_records_step() {
        let empty = Arc::new(|_: &[f64], _: &[&[f64]]| Vec::new()) as Transform;
        let mut layer = CoreLayer::builder(identity_host(3), lorenz())
            .mode(OverrideMode::BlindOverride)
            .bank(TransformBank::new(vec![empty]).unwrap())
            .build()
            .unwrap();
        let mut reference = LorenzAttractor::default();

        let err = layer.call(&[1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, ChaosError::ContractViolation(_)));
        let history = layer.history();
        assert_eq!(history.calls, 1);
        assert!(history.last_entropy.is_some());
        assert_eq!(history.last_branch, Some(0));
        assert_eq!(history.last_chaos, reference.step(0.01).unwrap().to_vec());

        assert!(layer.call(&[1.0, 0.0, 0.0]).is_err());
        assert_eq!(layer.history().calls, 2);
        assert_eq!(layer.history().last_chaos, reference.step(0.01).unwrap().to_vec());
    }

    #[test]
    fn test_no_blind_override_rejects_full_weight_blend() {
        let err = CoreLayer::bind(
            identity_host(1),
            lorenz(),
            LayerVariant::NoBlindOverride,
            OverrideMode::Blend(1.0),
        )
        .unwrap_err();
        assert!(matches!(err, ChaosError::InvalidParameter(_)));

        let partial = CoreLayer::bind(
            identity_host(1),
            lorenz(),
            LayerVariant::NoBlindOverride,
            OverrideMode::Blend(0.9),
        );
        assert!(partial.is_ok());
    }

    #[test]
    fn test_bank_transform_sees_host_weights() {
        let host = DenseHost::with_weights("biased", 1, vec![1.0], vec![0.25]).unwrap();
        let add_bias = Arc::new(|x: &[f64], w: &[&[f64]]| vec![x[0] + w[1][0]]) as Transform;
        let mut layer = CoreLayer::builder(host, lorenz())
            .mode(OverrideMode::BlindOverride)
            .bank(TransformBank::new(vec![add_bias]).unwrap())
            .build()
            .unwrap();
        assert_eq!(layer.call(&[2.0]).unwrap(), vec![2.25]);
    }

    #[test]
    fn test_factory_layers_carry_bank() {
        let double = Arc::new(|x: &[f64], _: &[&[f64]]| vec![x[0] * 2.0]) as Transform;
        let prototype = HasseAlgorithm::default();
        let mut factory = LayerFactory::new(
            |_| identity_host(1),
            &prototype,
            LayerVariant::Core,
            OverrideMode::BlindOverride,
        )
        .unwrap()
        .bank(TransformBank::new(vec![double]).unwrap());
        for _ in 0..2 {
            let mut layer = factory.create().unwrap();
            assert_eq!(layer.call(&[3.0]).unwrap(), vec![6.0]);
            assert_eq!(layer.history().last_branch, Some(0));
        }
    }

    #[test]
    fn test_factory_entropy_expectation() {
        let sampler = LorenzSampler::new(3, [0.0, 1.0, 0.0]).unwrap();
        let factory = || {
            LayerFactory::new(
                |_| identity_host(3),
                &sampler,
                LayerVariant::Core,
                OverrideMode::PassThrough,
            )
            .unwrap()
        };
        let met = factory().entropy_expectation(EntropyExpectation::new(5.0).with_cycles(2000));
        assert!(met.is_ok());
        let missed = factory().entropy_expectation(EntropyExpectation::new(500.0));
        assert!(matches!(missed, Err(ChaosError::ContractViolation(_))));
    }

    #[test]
    fn test_shared_call_with_outer_lock_released() {
        // `outer` is taken inside evaluation, the way a bound callable
        // takes an interpreter lock; callers release it before calling.
        let outer = Arc::new(Mutex::new(()));
        let (inside_tx, inside_rx) = std::sync::mpsc::channel();
        let taken_inside = Arc::clone(&outer);
        let f = ExternalFunction::new("locking", Determinism::Deterministic, 1).with_evaluate(
            move |_| {
                let _ = inside_tx.send(());
                let _held = taken_inside.lock();
                Ok(vec![1.0])
            },
        );
        let layer = CoreLayer::bind(
            identity_host(1),
            Box::new(f),
            LayerVariant::Core,
            OverrideMode::BlindOverride,
        )
        .unwrap();
        while inside_rx.try_recv().is_ok() {}
        let shared = SharedLayer::new(layer);

        let mut guard = outer.lock();
        let background = {
            let s = shared.clone();
            std::thread::spawn(move || s.call(&[0.0]).unwrap())
        };
        inside_rx.recv().unwrap();
        let out = parking_lot::MutexGuard::unlocked(&mut guard, || shared.call(&[0.0])).unwrap();
        drop(guard);

        assert_eq!(out, vec![1.0]);
        assert_eq!(background.join().unwrap(), vec![1.0]);
        assert_eq!(shared.calls(), 2);
    }
}
