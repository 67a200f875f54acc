pub mod block;
pub mod buffer;
pub mod color_map;
pub mod colorizer;
pub mod controller;
pub mod error;
pub mod export;
pub mod filter;
pub mod iteration_buffer;
pub mod scheduler;

pub use block::Block;
pub use buffer::RenderBuffer;
pub use color_map::{BuiltinMap, ColorMap};
pub use colorizer::{
    ClipRange, ColorPlan, ColoringMethod, ColoringParameters, Colorizer, MapSettings, ScalingMode,
};
pub use controller::{ControllerState, IteratorController, ProgressSink, DEFAULT_NR_OF_BLOCKS};
pub use error::{Interrupted, RenderError};
pub use export::{encode_png, export_png, ExportMetadata};
pub use filter::Filter;
pub use iteration_buffer::{Cell, IterationBuffer};
pub use scheduler::{default_thread_count, ComputeCancel, ComputeStats, Scheduler};

/// Convenience result type for the render crate.
pub type Result<T> = std::result::Result<T, RenderError>;
