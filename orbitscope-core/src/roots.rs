use tracing::debug;

use crate::complex::Complex;
use crate::params::FractalParameters;
use crate::result::{Classification, IterationResult};

/// Floor for the merge distance between two detected roots.
const MIN_MERGE_DISTANCE: f64 = 1e-6;

/// Roots discovered from converged orbits, indexed in first-seen order.
///
/// Used by families whose roots are not known up front. Two converged
/// iterates closer than the merge distance belong to the same root.
#[derive(Debug, Clone, Default)]
pub struct RootRegistry {
    roots: Vec<Complex>,
    merge_distance: f64,
}

impl RootRegistry {
    pub fn new(merge_distance: f64) -> Self {
        Self {
            roots: Vec::new(),
            merge_distance: merge_distance.max(MIN_MERGE_DISTANCE),
        }
    }

    /// A registry matched to the convergence test of `params`.
    ///
    /// An orbit stops once its step drops below `root_tolerance`, which for
    /// a simple root leaves it within roughly `√root_tolerance` of the root.
    pub fn for_params(params: &FractalParameters) -> Self {
        Self::new(params.root_tolerance.sqrt())
    }

    /// Index of the root at `z`, registering it if no known root is close.
    pub fn register(&mut self, z: Complex) -> u32 {
        if let Some(i) = self
            .roots
            .iter()
            .position(|r| (*r - z).norm() < self.merge_distance)
        {
            return i as u32;
        }
        self.roots.push(z);
        let index = (self.roots.len() - 1) as u32;
        debug!(index, re = z.re, im = z.im, "Detected new root");
        index
    }

    /// Assign root indices to converged results that do not carry one yet.
    ///
    /// Results are visited in iterator order, so walking a buffer in scan
    /// order yields the same indices regardless of how it was computed.
    pub fn resolve<'a, I>(&mut self, results: I) -> usize
    where
        I: IntoIterator<Item = &'a mut IterationResult>,
    {
        let mut resolved = 0;
        for result in results {
            if let Classification::Converged { root: None } = result.classification {
                if result.final_z.is_finite() {
                    let root = self.register(result.final_z);
                    result.classification = Classification::Converged { root: Some(root) };
                    resolved += 1;
                }
            }
        }
        resolved
    }

    pub fn roots(&self) -> &[Complex] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
