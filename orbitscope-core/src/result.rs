use serde::{Deserialize, Serialize};

use crate::complex::Complex;

/// How an orbit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    /// `|z|` exceeded the escape radius (or, for fixed-count families,
    /// the orbit settled into a stable regime).
    Escaped,
    /// The orbit converged. `root` indexes the family's root list, or the
    /// automatically detected roots once the pass has resolved them.
    Converged { root: Option<u32> },
    /// Neither escaped nor converged within `max_iterations`, or the
    /// iteration failed numerically.
    Interior,
}

/// Orbit accumulators gathered only by the advanced-statistics pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitStats {
    /// Mean step length `|zₙ − zₙ₋₁|`.
    pub average_distance: f64,
    /// Mean of `arg zₙ`, normalized to `[0, 1)`.
    pub average_angle: f64,
    /// Mean turning angle between consecutive steps, normalized to `[0, 1]`.
    pub curvature: f64,
    /// Mean of `½ + ½·sin(density · arg zₙ)`.
    pub stripe: f64,
    /// Closest approach to the orbit trap.
    pub trap_distance: f64,
    /// Closest approach to a Gaussian integer.
    pub gaussian_distance: f64,
}

/// Everything the colorizer needs to know about one pixel.
///
/// Produced once by the orbit evaluator and read-only afterwards; every
/// floating-point field is finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationResult {
    pub classification: Classification,
    /// Iterations performed before the orbit was classified.
    pub iterations: u32,
    /// Continuous extension of `iterations`, always `>= 0`.
    pub smooth_iterations: f64,
    pub final_z: Complex,
    /// Lyapunov exponent, zero for families that do not track it.
    pub lyapunov: f64,
    pub stats: Option<OrbitStats>,
}

impl IterationResult {
    /// A result for a point known to be interior without iterating.
    pub fn interior(iterations: u32, final_z: Complex) -> Self {
        Self {
            classification: Classification::Interior,
            iterations,
            smooth_iterations: iterations as f64,
            final_z,
            lyapunov: 0.0,
            stats: None,
        }
    }

    #[inline]
    pub fn is_interior(&self) -> bool {
        matches!(self.classification, Classification::Interior)
    }

    #[inline]
    pub fn is_escaped(&self) -> bool {
        matches!(self.classification, Classification::Escaped)
    }

    /// Root index for converged pixels.
    #[inline]
    pub fn root(&self) -> Option<u32> {
        match self.classification {
            Classification::Converged { root } => root,
            _ => None,
        }
    }
}
