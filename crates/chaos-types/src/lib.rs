// ─────────────────────────────────────────────────────────────────────
// Chaos Intelligence — Kernel Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Type definitions, configuration, and error hierarchy shared by the
//! chaotic function library and the layer wrapper.

pub mod config;
pub mod descriptor;
pub mod error;

pub use config::{ChaosConfig, HasseConfig, LayerConfig, LorenzConfig, ModeConfig};
pub use descriptor::{Capabilities, Determinism, FunctionDescriptor};
pub use error::{ChaosError, ChaosResult};
