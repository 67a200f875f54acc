pub mod bounds;
pub mod burning_ship;
pub mod complex;
pub mod error;
pub mod evaluator;
pub mod formula;
pub mod julia;
pub mod lyapunov;
pub mod mandelbrot;
pub mod newton;
pub mod params;
pub mod result;
pub mod roots;
pub mod zoom;

// Re-export primary types for convenience.
pub use bounds::{Bounds, ScreenSize};
pub use burning_ship::{BurningShip, Tricorn};
pub use complex::Complex;
pub use error::CoreError;
pub use evaluator::{EvaluationOptions, OrbitEvaluator};
pub use formula::{
    FamilyEntry, FormulaKind, FormulaRef, FractalFormula, RootDetection, Step, StepStatus,
};
pub use julia::Julia;
pub use lyapunov::Lyapunov;
pub use mandelbrot::Mandelbrot;
pub use newton::{NewtonRaphson, NewtonSine};
pub use params::{FractalParameters, OrbitTrap, TrapShape};
pub use result::{Classification, IterationResult, OrbitStats};
pub use roots::RootRegistry;
pub use zoom::ZoomStack;

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
