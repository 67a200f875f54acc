use std::path::PathBuf;

use thiserror::Error;

use orbitscope_core::CoreError;
use orbitscope_render::RenderError;

/// Errors raised while loading, saving or applying a session.
///
/// A failed load never touches the session it was meant to replace.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("unsupported fractal family: {0}")]
    UnsupportedFractal(String),

    #[error("zoom stack line {line}, field {field}: invalid number `{value}`")]
    ZoomEntry {
        line: usize,
        field: usize,
        value: String,
    },

    #[error("zoom stack line {line}: {source}")]
    ZoomBounds {
        line: usize,
        #[source]
        source: CoreError,
    },

    #[error("malformed file: {0}")]
    Format(String),

    #[error("failed to spawn I/O worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl SessionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse {
            line: e.line(),
            column: e.column(),
            message: e.to_string(),
        }
    }
}
