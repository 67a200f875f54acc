use crate::bounds::Bounds;
use crate::complex::Complex;
use crate::formula::{FractalFormula, Step};
use crate::mandelbrot::power_step;
use crate::params::FractalParameters;

/// Burning Ship: `z_{n+1} = (|Re zₙ| + i|Im zₙ|)ᵖ + c`.
#[derive(Debug, Clone)]
pub struct BurningShip {
    params: FractalParameters,
}

impl BurningShip {
    pub const NAME: &'static str = "BurningShip";

    pub fn new(params: FractalParameters) -> Self {
        Self { params }
    }
}

impl FractalFormula for BurningShip {
    fn family_name(&self) -> &'static str {
        Self::NAME
    }

    fn params(&self) -> &FractalParameters {
        &self.params
    }

    fn default_bounds(&self) -> Bounds {
        Bounds::from_corners(-2.5, -2.0, 1.5, 1.0)
    }

    #[inline]
    fn iterate(&self, _n: u32, z: Complex, c: Complex) -> Step {
        let folded = Complex::new(z.re.abs(), z.im.abs());
        Step::escape(power_step(folded, c, self.params.power), &self.params)
    }
}

/// Tricorn (Mandelbar): `z_{n+1} = conj(zₙ)ᵖ + c`.
#[derive(Debug, Clone)]
pub struct Tricorn {
    params: FractalParameters,
}

impl Tricorn {
    pub const NAME: &'static str = "Tricorn";

    pub fn new(params: FractalParameters) -> Self {
        Self { params }
    }
}

impl FractalFormula for Tricorn {
    fn family_name(&self) -> &'static str {
        Self::NAME
    }

    fn params(&self) -> &FractalParameters {
        &self.params
    }

    fn default_bounds(&self) -> Bounds {
        Bounds::from_corners(-2.5, -2.0, 1.5, 2.0)
    }

    #[inline]
    fn iterate(&self, _n: u32, z: Complex, c: Complex) -> Step {
        Step::escape(power_step(z.conj(), c, self.params.power), &self.params)
    }
}
