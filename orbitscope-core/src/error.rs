use thiserror::Error;

/// Errors originating from the core fractal engine.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid max iterations: {0} (must be >= 1)")]
    InvalidMaxIterations(u32),

    #[error("invalid escape radius: {0} (must be > 0.0)")]
    InvalidEscapeRadius(f64),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("invalid bounds: {reason}")]
    InvalidBounds { reason: String },

    #[error("invalid screen size: {width}×{height}")]
    InvalidScreenSize { width: u32, height: u32 },

    #[error("unsupported fractal family: {0}")]
    UnsupportedFractal(String),

    #[error("family {0} has no dual fractal")]
    NoDualFractal(&'static str),

    #[error("zoom stack must contain at least the root bounds")]
    EmptyZoomStack,
}
