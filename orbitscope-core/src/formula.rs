use std::fmt::Debug;
use std::sync::Arc;

use tracing::debug;

use crate::bounds::Bounds;
use crate::burning_ship::{BurningShip, Tricorn};
use crate::complex::Complex;
use crate::error::CoreError;
use crate::julia::Julia;
use crate::lyapunov::Lyapunov;
use crate::mandelbrot::Mandelbrot;
use crate::newton::{NewtonRaphson, NewtonSine};
use crate::params::FractalParameters;

/// What drives a family's iteration loop to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormulaKind {
    /// Classified by escaping the bailout radius.
    Divergent,
    /// Classified by converging to a root.
    Convergent,
    /// Always runs exactly `max_iterations` steps.
    FixedIterations,
}

/// How a convergent family identifies the root an orbit settled on.
#[derive(Debug, Clone, PartialEq)]
pub enum RootDetection {
    None,
    /// The roots are known in closed form; `iterate` reports the index.
    Known(Vec<Complex>),
    /// Roots are discovered from the converged orbits after the pass.
    Automatic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepStatus {
    Continue,
    Diverged,
    Converged { root: Option<u32> },
    /// The step could not be evaluated (zero derivative, non-finite iterate).
    Failed,
}

/// One application of a family's map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub z: Complex,
    pub status: StepStatus,
    /// Contribution to the Lyapunov exponent; zero for families that do
    /// not track it.
    pub exponent_term: f64,
}

impl Step {
    #[inline]
    pub fn new(z: Complex, status: StepStatus) -> Self {
        Self {
            z,
            status,
            exponent_term: 0.0,
        }
    }

    /// Classify an escape-time iterate against the bailout radius.
    #[inline]
    pub fn escape(z: Complex, params: &FractalParameters) -> Self {
        let norm_sq = z.norm_sq();
        let status = if norm_sq > params.escape_radius_sq() {
            StepStatus::Diverged
        } else if norm_sq.is_nan() {
            StepStatus::Failed
        } else {
            StepStatus::Continue
        };
        Self::new(z, status)
    }
}

/// A fractal family.
///
/// Implementations own their [`FractalParameters`]. The orbit evaluator is
/// generic over this trait so concrete families get a statically dispatched
/// inner loop, while the registry hands out `Arc<dyn FractalFormula>` for
/// families chosen by name at run time.
pub trait FractalFormula: Debug + Send + Sync {
    /// Stable identifier used by the registry and by saved parameter files.
    fn family_name(&self) -> &'static str;

    fn params(&self) -> &FractalParameters;

    fn default_bounds(&self) -> Bounds;

    fn kind(&self) -> FormulaKind {
        FormulaKind::Divergent
    }

    fn uses_fixed_iteration_count(&self) -> bool {
        self.kind() == FormulaKind::FixedIterations
    }

    /// Initial iterate and constant for a point of the plane.
    ///
    /// Parameter-space families start at `z₀ = 0` with `c = point`;
    /// dynamic-space families start at `z₀ = point` with a fixed `c`.
    fn start(&self, point: Complex) -> (Complex, Complex) {
        (Complex::ZERO, point)
    }

    /// Apply the map once. `n` is the zero-based index of this step.
    fn iterate(&self, n: u32, z: Complex, c: Complex) -> Step;

    /// Derivative of the function whose roots a Newton-style family seeks.
    fn derivative(&self, _z: Complex) -> Option<Complex> {
        None
    }

    fn root_detection(&self) -> RootDetection {
        RootDetection::None
    }

    /// Continuous iteration count for an orbit classified after `n` steps
    /// with final iterate `z` and the iterate before it `previous`.
    fn smooth_iterations(&self, n: u32, z: Complex, _previous: Complex) -> f64 {
        escape_smoothing(n, z, self.params().power)
    }

    /// Closed-form interior test that lets the cheap pass skip iterating.
    fn is_known_interior(&self, _c: Complex) -> bool {
        false
    }

    /// Whether [`FractalParameters::dual_parameter`] feeds the iteration.
    fn uses_dual_parameter(&self) -> bool {
        false
    }

    /// Name of the family forming a parameter/dynamic pair with this one.
    fn dual_family(&self) -> Option<&'static str> {
        None
    }
}

/// Normalized iteration count `n + 1 − ln(ln|z|) / ln(power)`.
///
/// Clamped to `>= 0`; falls back to `n` whenever the logarithms are not
/// defined (`|z| <= 1`, `power <= 1`, overflowed iterates).
pub fn escape_smoothing(n: u32, z: Complex, power: f64) -> f64 {
    let log_zn = z.norm().ln();
    if log_zn <= 0.0 || power <= 1.0 {
        return n as f64;
    }
    let nu = n as f64 + 1.0 - log_zn.ln() / power.ln();
    if nu.is_finite() {
        nu.max(0.0)
    } else {
        n as f64
    }
}

/// Shared handle to a family chosen at run time.
pub type FormulaRef = Arc<dyn FractalFormula>;

/// A registered fractal family.
pub struct FamilyEntry {
    pub name: &'static str,
    pub default_parameters: fn() -> FractalParameters,
    /// Family-specific range checks on top of [`FractalParameters::validate`].
    check: fn(&FractalParameters) -> crate::Result<()>,
    construct: fn(FractalParameters) -> FormulaRef,
}

fn no_extra_checks(_: &FractalParameters) -> crate::Result<()> {
    Ok(())
}

static FAMILIES: &[FamilyEntry] = &[
    FamilyEntry {
        name: Mandelbrot::NAME,
        default_parameters: FractalParameters::default,
        check: no_extra_checks,
        construct: |p| -> FormulaRef { Arc::new(Mandelbrot::new(p)) },
    },
    FamilyEntry {
        name: Julia::NAME,
        default_parameters: FractalParameters::default,
        check: no_extra_checks,
        construct: |p| -> FormulaRef { Arc::new(Julia::new(p)) },
    },
    FamilyEntry {
        name: BurningShip::NAME,
        default_parameters: FractalParameters::default,
        check: no_extra_checks,
        construct: |p| -> FormulaRef { Arc::new(BurningShip::new(p)) },
    },
    FamilyEntry {
        name: Tricorn::NAME,
        default_parameters: FractalParameters::default,
        check: no_extra_checks,
        construct: |p| -> FormulaRef { Arc::new(Tricorn::new(p)) },
    },
    FamilyEntry {
        name: NewtonRaphson::NAME,
        default_parameters: NewtonRaphson::default_parameters,
        check: NewtonRaphson::check_parameters,
        construct: |p| -> FormulaRef { Arc::new(NewtonRaphson::new(p)) },
    },
    FamilyEntry {
        name: NewtonSine::NAME,
        default_parameters: NewtonSine::default_parameters,
        check: no_extra_checks,
        construct: |p| -> FormulaRef { Arc::new(NewtonSine::new(p)) },
    },
    FamilyEntry {
        name: Lyapunov::NAME,
        default_parameters: Lyapunov::default_parameters,
        check: no_extra_checks,
        construct: |p| -> FormulaRef { Arc::new(Lyapunov::new(p)) },
    },
];

/// All registered families, in menu order.
pub fn families() -> &'static [FamilyEntry] {
    FAMILIES
}

pub fn family_names() -> impl Iterator<Item = &'static str> {
    FAMILIES.iter().map(|f| f.name)
}

fn lookup(name: &str) -> crate::Result<&'static FamilyEntry> {
    FAMILIES
        .iter()
        .find(|f| f.name == name)
        .ok_or_else(|| CoreError::UnsupportedFractal(name.to_string()))
}

/// Validate `params` for the family registered as `name`.
pub fn check_parameters(name: &str, params: &FractalParameters) -> crate::Result<()> {
    let entry = lookup(name)?;
    params.validate()?;
    (entry.check)(params)
}

/// Instantiate a family by name with the given parameters.
pub fn create(name: &str, params: FractalParameters) -> crate::Result<FormulaRef> {
    let entry = lookup(name)?;
    params.validate()?;
    (entry.check)(&params)?;
    debug!(family = entry.name, max_iterations = params.max_iterations, "Creating formula");
    Ok((entry.construct)(params))
}

/// Instantiate a family by name with its default parameters.
pub fn create_default(name: &str) -> crate::Result<FormulaRef> {
    let entry = lookup(name)?;
    Ok((entry.construct)((entry.default_parameters)()))
}

/// The dual of `formula`, with `point` as its dual parameter.
///
/// Switching from a parameter-space family to its dynamic-space partner
/// makes the chosen point the Julia constant. Every other parameter carries
/// over unchanged.
pub fn dual_of(formula: &dyn FractalFormula, point: Complex) -> crate::Result<FormulaRef> {
    let dual = formula
        .dual_family()
        .ok_or(CoreError::NoDualFractal(formula.family_name()))?;
    let params = formula.params().clone().with_dual_parameter(point);
    create(dual, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_family_round_trips_by_name() {
        for name in family_names() {
            let f = create_default(name).unwrap();
            assert_eq!(f.family_name(), name);
            assert!(f.params().validate().is_ok());
        }
    }

    #[test]
    fn unknown_family_is_unsupported() {
        let err = create_default("Mandelbulb").unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedFractal(ref n) if n == "Mandelbulb"));
    }

    #[test]
    fn create_validates_parameters() {
        let mut params = FractalParameters::default();
        params.stripe_density = 0.0;
        assert!(create("Mandelbrot", params).is_err());
    }

    #[test]
    fn create_rejects_oversized_newton_degree() {
        let params = NewtonRaphson::default_parameters().with_power(1e12);
        let err = create("NewtonRaphson", params).unwrap_err();
        assert!(matches!(err, CoreError::InvalidParameter { name: "power", .. }));

        let params = NewtonRaphson::default_parameters().with_power(NewtonRaphson::MAX_DEGREE as f64);
        assert!(create("NewtonRaphson", params).is_ok());
        // Other families keep accepting large exponents.
        assert!(create("Mandelbrot", FractalParameters::default().with_power(1e12)).is_ok());
    }

    #[test]
    fn dual_pair_swaps_families() {
        let m = create_default("Mandelbrot").unwrap();
        let j = dual_of(m.as_ref(), Complex::new(0.285, 0.01)).unwrap();
        assert_eq!(j.family_name(), "Julia");
        assert_eq!(j.params().dual_parameter, Complex::new(0.285, 0.01));
        let back = dual_of(j.as_ref(), Complex::ZERO).unwrap();
        assert_eq!(back.family_name(), "Mandelbrot");
    }

    #[test]
    fn families_without_dual_refuse() {
        let n = create_default("NewtonRaphson").unwrap();
        assert!(dual_of(n.as_ref(), Complex::ZERO).is_err());
    }

    #[test]
    fn smoothing_never_negative() {
        assert!(escape_smoothing(0, Complex::new(1e6, 0.0), 2.0) >= 0.0);
        assert_eq!(escape_smoothing(3, Complex::new(0.5, 0.0), 2.0), 3.0);
        assert_eq!(escape_smoothing(3, Complex::new(f64::INFINITY, 0.0), 2.0), 3.0);
    }

    #[test]
    fn smoothing_is_continuous_at_band_edges() {
        // Escaping at step n with |z| = R gives the same value as escaping
        // one step later at |z| = R² (quadratic map, R = 4).
        let a = escape_smoothing(5, Complex::new(4.0, 0.0), 2.0);
        let b = escape_smoothing(6, Complex::new(16.0, 0.0), 2.0);
        assert!((a - b).abs() < 1e-12);
    }
}
