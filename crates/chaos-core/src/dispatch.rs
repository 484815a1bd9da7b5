// ─────────────────────────────────────────────────────────────────────
// Chaos Intelligence — Override Dispatcher
// ─────────────────────────────────────────────────────────────────────
//! Decides a layer's final output from the host output and the
//! deterministic output.
//!
//! The mode is fixed when the dispatcher is created. Only `Toggle`
//! accepts a per-call `Selection`; every other mode rejects one.

use chaos_types::{ChaosError, ChaosResult, ModeConfig};

/// Per-invocation choice made under a toggle-able mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection {
    /// Host output only.
    PassThrough,
    /// Deterministic output only.
    Override,
    /// `(1 - w)·host + w·deterministic`.
    Blend(f64),
}

impl Selection {
    pub fn discards_host(&self) -> bool {
        match *self {
            Selection::PassThrough => false,
            Selection::Override => true,
            Selection::Blend(w) => w >= 1.0,
        }
    }
}

/// Override policy of a layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverrideMode {
    PassThrough,
    BlindOverride,
    Blend(f64),
    /// Per-call selection, falling back to the contained default.
    Toggle(Selection),
}

impl OverrideMode {
    pub fn from_config(config: ModeConfig) -> Self {
        match config {
            ModeConfig::PassThrough => OverrideMode::PassThrough,
            ModeConfig::BlindOverride => OverrideMode::BlindOverride,
            ModeConfig::Blend { weight } => OverrideMode::Blend(weight),
            ModeConfig::Toggle => OverrideMode::Toggle(Selection::PassThrough),
        }
    }

    /// Selection a fixed mode always makes.
    pub fn as_selection(&self) -> Selection {
        match *self {
            OverrideMode::PassThrough => Selection::PassThrough,
            OverrideMode::BlindOverride => Selection::Override,
            OverrideMode::Blend(w) => Selection::Blend(w),
            OverrideMode::Toggle(default) => default,
        }
    }

    /// Toggle mode whose default is this mode's selection.
    pub fn into_toggle(self) -> Self {
        OverrideMode::Toggle(self.as_selection())
    }

    pub fn is_toggle(&self) -> bool {
        matches!(self, OverrideMode::Toggle(_))
    }

    /// True when the mode can emit the deterministic output alone. A blend
    /// at weight 1 discards the host output, so it counts.
    pub fn can_override(&self) -> bool {
        self.as_selection().discards_host()
    }
}

fn check_weight(w: f64) -> ChaosResult<()> {
    if !(0.0..=1.0).contains(&w) {
        return Err(ChaosError::InvalidParameter(format!(
            "blend weight must be in [0, 1], got {w}"
        )));
    }
    Ok(())
}

/// Tile `values` cyclically to length `len`.
pub fn fit_to(values: &[f64], len: usize) -> ChaosResult<Vec<f64>> {
    if len == 0 {
        return Ok(Vec::new());
    }
    if values.is_empty() {
        return Err(ChaosError::ContractViolation(format!(
            "deterministic output is empty but host output has {len} value(s)"
        )));
    }
    Ok(values.iter().copied().cycle().take(len).collect())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverrideDispatcher {
    mode: OverrideMode,
}

impl OverrideDispatcher {
    pub fn new(mode: OverrideMode) -> ChaosResult<Self> {
        if let Selection::Blend(w) = mode.as_selection() {
            check_weight(w)?;
        }
        Ok(Self { mode })
    }

    pub fn mode(&self) -> OverrideMode {
        self.mode
    }

    /// Resolve the effective selection for one invocation.
    pub fn select(&self, toggle: Option<Selection>) -> ChaosResult<Selection> {
        match (self.mode, toggle) {
            (OverrideMode::Toggle(_), Some(selection)) => {
                if let Selection::Blend(w) = selection {
                    check_weight(w)?;
                }
                Ok(selection)
            }
            (mode, None) => Ok(mode.as_selection()),
            (mode, Some(_)) => Err(ChaosError::InvalidParameter(format!(
                "override mode {mode:?} is fixed; per-call selection requires a toggle mode"
            ))),
        }
    }

    /// Combine host and deterministic outputs under `selection`.
    pub fn combine(
        selection: Selection,
        host: Vec<f64>,
        deterministic: &[f64],
    ) -> ChaosResult<Vec<f64>> {
        match selection {
            Selection::PassThrough => Ok(host),
            Selection::Override => fit_to(deterministic, host.len()),
            Selection::Blend(w) => {
                check_weight(w)?;
                let det = fit_to(deterministic, host.len())?;
                Ok(host
                    .iter()
                    .zip(&det)
                    .map(|(h, d)| (1.0 - w) * h + w * d)
                    .collect())
            }
        }
    }

    /// `select` followed by `combine`.
    pub fn dispatch(
        &self,
        host: Vec<f64>,
        deterministic: &[f64],
        toggle: Option<Selection>,
    ) -> ChaosResult<(Selection, Vec<f64>)> {
        let selection = self.select(toggle)?;
        log::debug!("dispatch: {selection:?} over {} value(s)", host.len());
        let out = Self::combine(selection, host, deterministic)?;
        Ok((selection, out))
    }
}
