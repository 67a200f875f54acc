use crate::bounds::Bounds;
use crate::complex::Complex;
use crate::formula::{FormulaKind, FractalFormula, Step, StepStatus};
use crate::params::FractalParameters;

/// Exponent terms are floored here so a superstable step (`r(1 − 2x) = 0`)
/// does not drag the mean to `−∞`.
const MIN_EXPONENT_TERM: f64 = -30.0;

/// Lyapunov fractal of the forced logistic map `x' = r·x·(1 − x)`.
///
/// The plane coordinate supplies the two growth rates: `A = Re c` and
/// `B = Im c`. Step `n` uses the rate named by letter `n mod len` of
/// [`FractalParameters::lyapunov_sequence`]. The orbit always runs the full
/// `max_iterations`; the evaluator classifies the pixel from the mean of the
/// exponent terms.
#[derive(Debug, Clone)]
pub struct Lyapunov {
    params: FractalParameters,
    /// `true` for `A`, `false` for `B`.
    sequence: Vec<bool>,
}

impl Lyapunov {
    pub const NAME: &'static str = "Lyapunov";

    pub fn new(params: FractalParameters) -> Self {
        let sequence: Vec<bool> = params.lyapunov_sequence.chars().map(|ch| ch == 'A').collect();
        let sequence = if sequence.is_empty() { vec![true] } else { sequence };
        Self { params, sequence }
    }

    pub fn default_parameters() -> FractalParameters {
        FractalParameters::default().with_max_iterations(200)
    }

    #[inline]
    fn rate(&self, n: u32, c: Complex) -> f64 {
        if self.sequence[n as usize % self.sequence.len()] {
            c.re
        } else {
            c.im
        }
    }
}

impl Default for Lyapunov {
    fn default() -> Self {
        Self::new(Self::default_parameters())
    }
}

impl FractalFormula for Lyapunov {
    fn family_name(&self) -> &'static str {
        Self::NAME
    }

    fn params(&self) -> &FractalParameters {
        &self.params
    }

    fn default_bounds(&self) -> Bounds {
        Bounds::from_corners(2.0, 2.0, 4.0, 4.0)
    }

    fn kind(&self) -> FormulaKind {
        FormulaKind::FixedIterations
    }

    fn start(&self, point: Complex) -> (Complex, Complex) {
        (Complex::new(0.5, 0.0), point)
    }

    fn iterate(&self, n: u32, z: Complex, c: Complex) -> Step {
        let r = self.rate(n, c);
        let x = z.re;
        let next = r * x * (1.0 - x);
        if !next.is_finite() {
            return Step::new(z, StepStatus::Failed);
        }
        let term = (r * (1.0 - 2.0 * x)).abs().ln().max(MIN_EXPONENT_TERM);
        Step {
            z: Complex::new(next, 0.0),
            status: StepStatus::Continue,
            exponent_term: term,
        }
    }

    fn smooth_iterations(&self, n: u32, _z: Complex, _previous: Complex) -> f64 {
        n as f64
    }
}
