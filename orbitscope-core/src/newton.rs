use std::f64::consts::TAU;

use crate::bounds::Bounds;
use crate::complex::Complex;
use crate::error::CoreError;
use crate::formula::{FormulaKind, FractalFormula, RootDetection, Step, StepStatus};
use crate::params::FractalParameters;

/// Converged iterates farther than this from every known root are left
/// without a root index.
const ROOT_MATCH_DISTANCE: f64 = 1e-3;

/// One Newton–Raphson step `z − f(z)/f'(z)`, classified against `tolerance`.
#[inline]
fn newton_step(z: Complex, f: Complex, df: Complex, tolerance: f64) -> (Complex, StepStatus) {
    if df.norm_sq() == 0.0 {
        return (z, StepStatus::Failed);
    }
    let next = z - f / df;
    if !next.is_finite() {
        return (z, StepStatus::Failed);
    }
    if (next - z).norm() < tolerance {
        (next, StepStatus::Converged { root: None })
    } else {
        (next, StepStatus::Continue)
    }
}

/// Fractional convergence count `n − log₂(ln|Δz| / ln(tolerance))`,
/// clamped to `[n − 1, n]`.
///
/// Quadratic convergence squares the step length every iteration, so the
/// ratio of logarithms measures how far past the tolerance the last step
/// overshot.
pub fn convergence_smoothing(n: u32, z: Complex, previous: Complex, tolerance: f64) -> f64 {
    let n = n as f64;
    let step = (z - previous).norm();
    let ratio = step.ln() / tolerance.ln();
    let nu = n - ratio.log2();
    if nu.is_nan() {
        return n;
    }
    nu.clamp((n - 1.0).max(0.0), n)
}

/// Newton–Raphson on `zᵖ − 1`, whose roots are the `p`-th roots of unity.
#[derive(Debug, Clone)]
pub struct NewtonRaphson {
    params: FractalParameters,
    degree: u32,
    roots: Vec<Complex>,
}

impl NewtonRaphson {
    pub const NAME: &'static str = "NewtonRaphson";
    /// Highest polynomial degree; one root is stored per degree.
    pub const MAX_DEGREE: u32 = 64;

    /// Degrees outside `1..=MAX_DEGREE` are clamped into `2..=MAX_DEGREE`.
    pub fn new(params: FractalParameters) -> Self {
        let degree = (params.power.round().min(Self::MAX_DEGREE as f64) as u32).max(2);
        let roots = (0..degree)
            .map(|k| Complex::from_polar(1.0, TAU * k as f64 / degree as f64))
            .collect();
        Self {
            params,
            degree,
            roots,
        }
    }

    pub fn default_parameters() -> FractalParameters {
        FractalParameters::default()
            .with_power(3.0)
            .with_max_iterations(64)
    }

    pub fn check_parameters(params: &FractalParameters) -> crate::Result<()> {
        if params.power.round() > Self::MAX_DEGREE as f64 {
            return Err(CoreError::InvalidParameter {
                name: "power",
                reason: format!(
                    "{} (polynomial degree must be <= {})",
                    params.power,
                    Self::MAX_DEGREE
                ),
            });
        }
        Ok(())
    }

    pub fn degree(&self) -> u32 {
        self.degree
    }

    fn nearest_root(&self, z: Complex) -> Option<u32> {
        self.roots
            .iter()
            .enumerate()
            .map(|(i, r)| (i, (z - *r).norm()))
            .filter(|&(_, d)| d < ROOT_MATCH_DISTANCE)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i as u32)
    }
}

impl Default for NewtonRaphson {
    fn default() -> Self {
        Self::new(Self::default_parameters())
    }
}

impl FractalFormula for NewtonRaphson {
    fn family_name(&self) -> &'static str {
        Self::NAME
    }

    fn params(&self) -> &FractalParameters {
        &self.params
    }

    fn default_bounds(&self) -> Bounds {
        Bounds::from_corners(-2.0, -1.5, 2.0, 1.5)
    }

    fn kind(&self) -> FormulaKind {
        FormulaKind::Convergent
    }

    fn start(&self, point: Complex) -> (Complex, Complex) {
        (point, Complex::ZERO)
    }

    fn iterate(&self, _n: u32, z: Complex, _c: Complex) -> Step {
        let zp1 = z.powi(self.degree - 1);
        let f = zp1 * z - Complex::ONE;
        let df = zp1 * self.degree as f64;
        let (next, status) = newton_step(z, f, df, self.params.root_tolerance);
        let status = match status {
            StepStatus::Converged { .. } => StepStatus::Converged {
                root: self.nearest_root(next),
            },
            other => other,
        };
        Step::new(next, status)
    }

    fn derivative(&self, z: Complex) -> Option<Complex> {
        Some(z.powi(self.degree - 1) * self.degree as f64)
    }

    fn root_detection(&self) -> RootDetection {
        RootDetection::Known(self.roots.clone())
    }

    fn smooth_iterations(&self, n: u32, z: Complex, previous: Complex) -> f64 {
        convergence_smoothing(n, z, previous, self.params.root_tolerance)
    }
}

/// Newton–Raphson on `sin z`. The roots `kπ` are not enumerated up front;
/// they are detected from the converged orbits.
#[derive(Debug, Clone)]
pub struct NewtonSine {
    params: FractalParameters,
}

impl NewtonSine {
    pub const NAME: &'static str = "NewtonSine";

    pub fn new(params: FractalParameters) -> Self {
        Self { params }
    }

    pub fn default_parameters() -> FractalParameters {
        FractalParameters::default().with_max_iterations(64)
    }
}

impl Default for NewtonSine {
    fn default() -> Self {
        Self::new(Self::default_parameters())
    }
}

impl FractalFormula for NewtonSine {
    fn family_name(&self) -> &'static str {
        Self::NAME
    }

    fn params(&self) -> &FractalParameters {
        &self.params
    }

    fn default_bounds(&self) -> Bounds {
        Bounds::from_corners(-4.0, -3.0, 4.0, 3.0)
    }

    fn kind(&self) -> FormulaKind {
        FormulaKind::Convergent
    }

    fn start(&self, point: Complex) -> (Complex, Complex) {
        (point, Complex::ZERO)
    }

    fn iterate(&self, _n: u32, z: Complex, _c: Complex) -> Step {
        let (next, status) = newton_step(z, z.sin(), z.cos(), self.params.root_tolerance);
        Step::new(next, status)
    }

    fn derivative(&self, z: Complex) -> Option<Complex> {
        Some(z.cos())
    }

    fn root_detection(&self) -> RootDetection {
        RootDetection::Automatic
    }

    fn smooth_iterations(&self, n: u32, z: Complex, previous: Complex) -> f64 {
        convergence_smoothing(n, z, previous, self.params.root_tolerance)
    }
}
