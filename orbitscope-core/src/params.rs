use serde::{Deserialize, Serialize};

use crate::complex::Complex;
use crate::error::CoreError;

/// Geometry an orbit is measured against for orbit-trap coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrapShape {
    /// Distance to a single point.
    #[default]
    Point,
    /// Distance to a circle of `radius` around the centre.
    Circle,
    /// Distance to the horizontal and vertical lines through the centre.
    Cross,
    /// Distance to the horizontal line through the centre.
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitTrap {
    pub shape: TrapShape,
    pub center: Complex,
    pub radius: f64,
}

impl OrbitTrap {
    #[inline]
    pub fn distance(&self, z: Complex) -> f64 {
        let d = z - self.center;
        match self.shape {
            TrapShape::Point => d.norm(),
            TrapShape::Circle => (d.norm() - self.radius).abs(),
            TrapShape::Cross => d.re.abs().min(d.im.abs()),
            TrapShape::Line => d.im.abs(),
        }
    }
}

impl Default for OrbitTrap {
    fn default() -> Self {
        Self {
            shape: TrapShape::Point,
            center: Complex::ZERO,
            radius: 0.5,
        }
    }
}

/// Per-family tunables.
///
/// Owned by the active formula instance and replaced wholesale when the
/// family changes. The cached `escape_radius_sq` is recomputed on
/// deserialization so saved parameter files always stay consistent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FractalParameters {
    /// Universal iteration bound; reaching it classifies the pixel interior.
    pub max_iterations: u32,

    /// Bailout radius: the orbit has escaped once `|z|` exceeds it.
    pub escape_radius: f64,

    #[serde(skip)]
    escape_radius_sq: f64,

    /// Exponent of the iterated map (`z^power + c` for escape families,
    /// the polynomial degree for Newton families).
    pub power: f64,

    /// The "other" point of a dual pair, e.g. the Julia constant.
    pub dual_parameter: Complex,

    /// Convergence test: `|z − previous| < root_tolerance`.
    pub root_tolerance: f64,

    pub trap: OrbitTrap,

    /// Angular frequency of the stripe-average accumulator.
    pub stripe_density: f64,

    /// Lyapunov forcing sequence over the letters `A` and `B`.
    pub lyapunov_sequence: String,
}

impl<'de> Deserialize<'de> for FractalParameters {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            max_iterations: u32,
            escape_radius: f64,
            power: f64,
            dual_parameter: Complex,
            root_tolerance: f64,
            trap: OrbitTrap,
            stripe_density: f64,
            lyapunov_sequence: String,
        }
        let raw = Raw::deserialize(deserializer)?;
        let params = FractalParameters {
            max_iterations: raw.max_iterations,
            escape_radius: raw.escape_radius,
            escape_radius_sq: raw.escape_radius * raw.escape_radius,
            power: raw.power,
            dual_parameter: raw.dual_parameter,
            root_tolerance: raw.root_tolerance,
            trap: raw.trap,
            stripe_density: raw.stripe_density,
            lyapunov_sequence: raw.lyapunov_sequence,
        };
        params.validate().map_err(serde::de::Error::custom)?;
        Ok(params)
    }
}

impl FractalParameters {
    pub const DEFAULT_MAX_ITERATIONS: u32 = 256;
    pub const DEFAULT_ESCAPE_RADIUS: f64 = 4.0;
    pub const DEFAULT_POWER: f64 = 2.0;
    pub const DEFAULT_ROOT_TOLERANCE: f64 = 1e-6;
    pub const DEFAULT_STRIPE_DENSITY: f64 = 5.0;
    pub const DEFAULT_LYAPUNOV_SEQUENCE: &'static str = "AB";

    pub fn new(max_iterations: u32, escape_radius: f64) -> crate::Result<Self> {
        let params = Self {
            max_iterations,
            escape_radius,
            escape_radius_sq: escape_radius * escape_radius,
            ..Self::default()
        };
        params.validate()?;
        Ok(params)
    }

    /// Check every field against its documented range.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_iterations < 1 {
            return Err(CoreError::InvalidMaxIterations(self.max_iterations));
        }
        if self.escape_radius <= 0.0 || !self.escape_radius.is_finite() {
            return Err(CoreError::InvalidEscapeRadius(self.escape_radius));
        }
        if !self.power.is_finite() || self.power < 1.0 {
            return Err(invalid("power", format!("{} (must be finite and >= 1)", self.power)));
        }
        if !self.dual_parameter.is_finite() {
            return Err(invalid("dual_parameter", "must be finite".into()));
        }
        if self.root_tolerance <= 0.0 || !self.root_tolerance.is_finite() {
            return Err(invalid(
                "root_tolerance",
                format!("{} (must be > 0.0)", self.root_tolerance),
            ));
        }
        if !self.trap.center.is_finite() || !self.trap.radius.is_finite() || self.trap.radius < 0.0 {
            return Err(invalid("trap", "center and radius must be finite, radius >= 0".into()));
        }
        if self.stripe_density <= 0.0 || !self.stripe_density.is_finite() {
            return Err(invalid(
                "stripe_density",
                format!("{} (must be > 0.0)", self.stripe_density),
            ));
        }
        if self.lyapunov_sequence.is_empty()
            || !self.lyapunov_sequence.chars().all(|ch| ch == 'A' || ch == 'B')
        {
            return Err(invalid(
                "lyapunov_sequence",
                format!("{:?} (must be a non-empty run of A and B)", self.lyapunov_sequence),
            ));
        }
        Ok(())
    }

    /// Pre-computed squared escape radius for the inner loop.
    #[inline]
    pub fn escape_radius_sq(&self) -> f64 {
        self.escape_radius_sq
    }

    /// Update the escape radius and recompute the cached square.
    pub fn set_escape_radius(&mut self, r: f64) {
        self.escape_radius = r;
        self.escape_radius_sq = r * r;
    }

    /// Return a copy with a different `max_iterations` value.
    pub fn with_max_iterations(self, max_iterations: u32) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }

    pub fn with_power(self, power: f64) -> Self {
        Self { power, ..self }
    }

    pub fn with_dual_parameter(self, dual_parameter: Complex) -> Self {
        Self {
            dual_parameter,
            ..self
        }
    }
}

fn invalid(name: &'static str, reason: String) -> CoreError {
    CoreError::InvalidParameter { name, reason }
}

impl Default for FractalParameters {
    fn default() -> Self {
        Self {
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            escape_radius: Self::DEFAULT_ESCAPE_RADIUS,
            escape_radius_sq: Self::DEFAULT_ESCAPE_RADIUS * Self::DEFAULT_ESCAPE_RADIUS,
            power: Self::DEFAULT_POWER,
            dual_parameter: Complex::new(-0.7, 0.27015),
            root_tolerance: Self::DEFAULT_ROOT_TOLERANCE,
            trap: OrbitTrap::default(),
            stripe_density: Self::DEFAULT_STRIPE_DENSITY,
            lyapunov_sequence: Self::DEFAULT_LYAPUNOV_SEQUENCE.to_string(),
        }
    }
}
