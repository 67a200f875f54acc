use std::path::PathBuf;

use thiserror::Error;

/// A compute pass stopped early because its cancellation token was set.
///
/// Not a failure: the buffer holds every block finished before the token
/// was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("computation interrupted after {blocks_done} of {blocks_total} blocks")]
pub struct Interrupted {
    pub blocks_done: usize,
    pub blocks_total: usize,
}

/// Errors originating from the compute and coloring pipeline.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid image dimensions: {width}×{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("buffer is {found_width}×{found_height}, expected {width}×{height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        found_width: u32,
        found_height: u32,
    },

    #[error("a computation is already in progress")]
    Busy,

    #[error("failed to spawn compute thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("compute thread exited without reporting a result")]
    WorkerLost,

    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PNG encoding failed: {0}")]
    Png(#[from] png::EncodingError),

    #[error(transparent)]
    Core(#[from] orbitscope_core::CoreError),
}
