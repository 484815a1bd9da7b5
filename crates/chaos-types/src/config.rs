// ─────────────────────────────────────────────────────────────────────
// Chaos Intelligence — Kernel Configuration
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{ChaosError, ChaosResult};

/// Lorenz system coefficients, step size and initial state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LorenzConfig {
    /// σ. Default: 10.
    pub sigma: f64,
    /// ρ. Default: 28.
    pub rho: f64,
    /// β. Default: 8/3.
    pub beta: f64,
    /// RK4 step size used by `evaluate`. Default: 0.01.
    pub dt: f64,
    /// Initial (x, y, z). Default: (1, 1, 1).
    pub initial: [f64; 3],
}

impl Default for LorenzConfig {
    fn default() -> Self {
        Self {
            sigma: 10.0,
            rho: 28.0,
            beta: 8.0 / 3.0,
            dt: 0.01,
            initial: [1.0, 1.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HasseConfig {
    /// Number of map applications per evaluation. Default: 1.
    pub order: u32,
    /// Cursor used when evaluated without input. Default: 27.
    pub start: u64,
}

impl Default for HasseConfig {
    fn default() -> Self {
        Self { order: 1, start: 27 }
    }
}

/// Serializable form of a layer's override policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModeConfig {
    PassThrough,
    BlindOverride,
    Blend { weight: f64 },
    Toggle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Output width of the reference dense host. Default: 32.
    pub units: usize,
    /// Override policy. Default: blind override.
    pub mode: ModeConfig,
    /// Seed for the layer's entropy generator and host initialisation.
    pub seed: u64,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            units: 32,
            mode: ModeConfig::BlindOverride,
            seed: 0x5EED,
        }
    }
}

/// Runtime configuration for the chaotic functions and layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaosConfig {
    pub lorenz: LorenzConfig,
    pub hasse: HasseConfig,
    pub layer: LayerConfig,
}

impl ChaosConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> ChaosResult<()> {
        let l = &self.lorenz;
        for (name, value) in [("sigma", l.sigma), ("rho", l.rho), ("beta", l.beta)] {
            if !value.is_finite() {
                return Err(ChaosError::Config(format!(
                    "lorenz.{name} must be finite, got {value}"
                )));
            }
        }
        if !(l.dt.is_finite() && l.dt > 0.0) {
            return Err(ChaosError::Config(format!(
                "lorenz.dt must be > 0, got {}",
                l.dt
            )));
        }
        if l.initial.iter().any(|v| !v.is_finite()) {
            return Err(ChaosError::Config(
                "lorenz.initial must contain finite values".to_string(),
            ));
        }
        if self.hasse.order < 1 {
            return Err(ChaosError::Config(format!(
                "hasse.order must be >= 1, got {}",
                self.hasse.order
            )));
        }
        if self.layer.units < 1 {
            return Err(ChaosError::Config(format!(
                "layer.units must be >= 1, got {}",
                self.layer.units
            )));
        }
        if let ModeConfig::Blend { weight } = self.layer.mode {
            if !(0.0..=1.0).contains(&weight) {
                return Err(ChaosError::Config(format!(
                    "layer.mode.weight must be in [0, 1], got {weight}"
                )));
            }
        }
        Ok(())
    }

    /// Load from JSON string. Missing sections fall back to defaults.
    pub fn from_json(json: &str) -> ChaosResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ChaosError::Config(format!("JSON parse error: {e}")))?;
        log::debug!("loaded chaos config: {config:?}");
        Ok(config)
    }

    pub fn to_json(&self) -> ChaosResult<String> {
        serde_json::to_string(self)
            .map_err(|e| ChaosError::Config(format!("JSON encode error: {e}")))
    }
}
