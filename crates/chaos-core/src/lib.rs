// ─────────────────────────────────────────────────────────────────────
// Chaos Intelligence — Layer Core
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Chaotic layers: a host layer's forward pass combined with the output
//! of a bound deterministic function.
//!
//! # Invariants
//!
//! 1. **Conformance once, at binding**: a function is admitted through
//!    the conformance protocol when it is bound (or when a factory is
//!    created). Invocations never re-check it.
//!
//! 2. **One step per invocation**: the bound function is evaluated
//!    exactly once per call in every override mode, pass-through
//!    included.
//!
//! 3. **Fixed modes stay fixed**: `Core` and `NoBlindOverride` layers
//!    reject per-call selections; `NoBlindOverride` refuses blind
//!    override at binding.
//!
//! 4. **Host owns its parameters**: the layer builds the host on first
//!    call and never touches its weights directly.

pub mod bank;
pub mod dispatch;
pub mod host;
pub mod layer;
pub mod recorder;

pub use bank::TransformBank;
pub use dispatch::{OverrideDispatcher, OverrideMode, Selection};
pub use host::{DenseHost, HostLayer};
pub use layer::{
    retrofit, CoreLayer, CoreLayerBuilder, LayerFactory, LayerHistory, LayerVariant, SharedLayer,
};
pub use recorder::{GraphAssimilator, LayerRecord, Recorder, SaveMode, Sequential, Trace};
