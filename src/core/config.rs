//! Engine tuning configuration.
//!
//! Loading configuration from a file or environment is out of scope (spec
//! §1 scopes out "configuration loading" as an external-collaborator
//! concern) — this module only exposes `EngineConfig::default()` plus
//! in-process overrides, unlike the teacher crate's `Config::load()`, which
//! reads TOML and environment variables for a network-facing server.

use crate::core::error::{Error, Result};

/// Rehash watermarks for `graph_optimize`/`vector_optimize` (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RehashConfig {
    /// Grow the table while `entries >= grow_factor * buckets`.
    pub grow_factor: u64,
    /// Stop growing once `entries < grow_stop_factor * buckets`.
    pub grow_stop_factor: u64,
    /// Shrink the table while `buckets >= 2 && entries < shrink_factor * buckets`.
    pub shrink_factor: u64,
    /// Floor for the post-resize `optimize` countdown.
    pub min_optimize: i64,
    /// `optimize` countdown set after a resize is aborted by a simulated
    /// allocation failure, to retry later rather than thrash.
    pub retry_optimize: i64,
}

impl Default for RehashConfig {
    fn default() -> Self {
        Self {
            grow_factor: 256,
            grow_stop_factor: 64,
            shrink_factor: 16,
            min_optimize: 256,
            retry_optimize: 1024,
        }
    }
}

/// Defaults for [`crate::power_iteration::power_iteration`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerIterationConfig {
    /// Maximum number of iterations absent an explicit override.
    pub num_iterations: u32,
    /// Convergence tolerance; `0.0` disables the early-stop check.
    pub tolerance: f64,
}

impl Default for PowerIterationConfig {
    fn default() -> Self {
        Self {
            num_iterations: 100,
            tolerance: 0.0,
        }
    }
}

/// Defaults for [`crate::pareto::pareto_stability`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParetoConfig {
    /// Sweep weight update base. `0.0` means additive (`w += 1`); any other
    /// value means multiplicative (`w *= base`).
    pub base: f64,
}

impl Default for ParetoConfig {
    fn default() -> Self {
        Self { base: 0.0 }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Default `eps` for newly constructed containers.
    pub default_eps: f32,
    /// Rehash watermarks.
    pub rehash: RehashConfig,
    /// Power iteration defaults.
    pub power_iteration: PowerIterationConfig,
    /// Pareto stability defaults.
    pub pareto: ParetoConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_eps: 1e-6,
            rehash: RehashConfig::default(),
            power_iteration: PowerIterationConfig::default(),
            pareto: ParetoConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validate the configuration's internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.default_eps < 0.0 {
            return Err(Error::invalid_argument("default_eps must be >= 0"));
        }
        let r = &self.rehash;
        if r.grow_factor <= r.grow_stop_factor {
            return Err(Error::invalid_argument(
                "rehash.grow_factor must exceed grow_stop_factor",
            ));
        }
        if r.grow_stop_factor <= r.shrink_factor {
            return Err(Error::invalid_argument(
                "rehash.grow_stop_factor must exceed shrink_factor",
            ));
        }
        if r.min_optimize <= 0 || r.retry_optimize <= 0 {
            return Err(Error::invalid_argument(
                "rehash.min_optimize and retry_optimize must be positive",
            ));
        }
        Ok(())
    }
}
