// ─────────────────────────────────────────────────────────────────────
// Chaos Intelligence — Deterministic Functions
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Deterministic and entropy-based chaotic functions.
//!
//! Every function implements [`DeterministicFunction`]: one evaluation
//! operation over a small numeric vector, a reset to the initial state,
//! and a fork that yields an independent copy at the current state.
//!
//! - `LorenzAttractor`: RK4 integration of the Lorenz system
//! - `LorenzSampler`: Lorenz derivative at generator-sampled points
//! - `HasseAlgorithm`: the Hasse (Collatz) map of a given order
//! - `CommonPiecewiseFunction`: first-match predicate dispatch
//! - `ExternalFunction`: closures assembled into a function
//!
//! Candidates are admitted through [`conformance::check`], which reads
//! the published [`FunctionDescriptor`](chaos_types::FunctionDescriptor)
//! and probes forks of the candidate, never the candidate itself.

pub mod conformance;
pub mod external;
pub mod function;
pub mod hasse;
pub mod lorenz;
pub mod piecewise;
pub mod rng;

pub use conformance::{ConformanceReport, EntropyExpectation, Probe};
pub use external::ExternalFunction;
pub use function::DeterministicFunction;
pub use hasse::HasseAlgorithm;
pub use lorenz::{LorenzAttractor, LorenzSampler, LorenzState};
pub use piecewise::CommonPiecewiseFunction;
pub use rng::SimpleRng;
