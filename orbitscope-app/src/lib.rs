pub mod commands;
pub mod error;
pub mod io_worker;
pub mod parameters;
pub mod preferences;
pub mod snapshot;
pub mod zoom_stack;

pub use error::SessionError;
pub use io_worker::{IoRequest, IoResponse, IoWorker};
pub use parameters::ParametersFile;
pub use preferences::Preferences;
pub use snapshot::Snapshot;
pub use zoom_stack::{format_zoom_stack, load_zoom_stack, parse_zoom_stack, save_zoom_stack};

/// Convenience result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
