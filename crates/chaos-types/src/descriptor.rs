// ─────────────────────────────────────────────────────────────────────
// Chaos Intelligence — Function Descriptors
// ─────────────────────────────────────────────────────────────────────
//! Introspectable metadata every chaotic function publishes. The
//! conformance protocol reads these instead of probing the candidate
//! with reflection.

use serde::{Deserialize, Serialize};

/// Determinism category declared by a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Determinism {
    /// Pure function of input and internal state.
    Deterministic,
    /// Function of input plus an owned generator seeded with `seed`.
    Entropy { seed: u64 },
}

impl Determinism {
    pub fn is_entropy(&self) -> bool {
        matches!(self, Determinism::Entropy { .. })
    }
}

/// Operations a function actually provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub evaluate: bool,
    pub reset: bool,
    pub fork: bool,
}

impl Capabilities {
    /// Everything a native implementation offers.
    pub const FULL: Capabilities = Capabilities {
        evaluate: true,
        reset: true,
        fork: true,
    };

    /// Names of the missing operations, in declaration order.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if !self.evaluate {
            out.push("evaluate");
        }
        if !self.reset {
            out.push("reset");
        }
        if !self.fork {
            out.push("fork");
        }
        out
    }
}

/// Metadata describing a chaotic function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub determinism: Determinism,
    /// Length of every vector returned by `evaluate`.
    pub output_dim: usize,
    pub capabilities: Capabilities,
}

impl FunctionDescriptor {
    pub fn new(name: impl Into<String>, determinism: Determinism, output_dim: usize) -> Self {
        Self {
            name: name.into(),
            determinism,
            output_dim,
            capabilities: Capabilities::FULL,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

impl std::fmt::Display for FunctionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let category = match self.determinism {
            Determinism::Deterministic => "deterministic".to_string(),
            Determinism::Entropy { seed } => format!("entropy(seed={seed})"),
        };
        write!(
            f,
            "Deterministic Function [{}]: {category}, dim={}",
            self.name, self.output_dim
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_capabilities() {
        let caps = Capabilities {
            evaluate: false,
            reset: true,
            fork: false,
        };
        assert_eq!(caps.missing(), vec!["evaluate", "fork"]);
        assert!(Capabilities::FULL.missing().is_empty());
    }

    #[test]
    fn test_descriptor_display() {
        let d = FunctionDescriptor::new("lorenz", Determinism::Deterministic, 3);
        assert_eq!(
            d.to_string(),
            "Deterministic Function [lorenz]: deterministic, dim=3"
        );
        let d = FunctionDescriptor::new("sampler", Determinism::Entropy { seed: 7 }, 1);
        assert!(d.to_string().contains("entropy(seed=7)"));
        assert!(d.determinism.is_entropy());
    }
}
