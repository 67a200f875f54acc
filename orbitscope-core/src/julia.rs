use crate::bounds::Bounds;
use crate::complex::Complex;
use crate::formula::{FractalFormula, Step};
use crate::mandelbrot::power_step;
use crate::params::FractalParameters;

/// A Julia set: `z_{n+1} = z_nᵖ + c`, where `c` is the fixed
/// [`dual_parameter`](FractalParameters::dual_parameter) and `z₀` is the
/// point on the complex plane.
#[derive(Debug, Clone)]
pub struct Julia {
    params: FractalParameters,
}

impl Julia {
    pub const NAME: &'static str = "Julia";

    pub fn new(params: FractalParameters) -> Self {
        Self { params }
    }

    /// The constant `c` defining this Julia set.
    pub fn c(&self) -> Complex {
        self.params.dual_parameter
    }
}

impl Default for Julia {
    fn default() -> Self {
        Self::new(FractalParameters::default())
    }
}

impl FractalFormula for Julia {
    fn family_name(&self) -> &'static str {
        Self::NAME
    }

    fn params(&self) -> &FractalParameters {
        &self.params
    }

    fn default_bounds(&self) -> Bounds {
        Bounds::from_corners(-2.0, -1.5, 2.0, 1.5)
    }

    fn start(&self, point: Complex) -> (Complex, Complex) {
        (point, self.params.dual_parameter)
    }

    #[inline]
    fn iterate(&self, _n: u32, z: Complex, c: Complex) -> Step {
        Step::escape(power_step(z, c, self.params.power), &self.params)
    }

    fn uses_dual_parameter(&self) -> bool {
        true
    }

    fn dual_family(&self) -> Option<&'static str> {
        Some(crate::mandelbrot::Mandelbrot::NAME)
    }
}
