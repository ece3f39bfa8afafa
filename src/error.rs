//! Error types for item construction, state files and the engine service.
//!
//! Geometric rejections are not errors: `validate_placement` and `place_item`
//! answer with a plain `bool`, see [`crate::engine::PlacementRejection`].

use std::path::PathBuf;

use thiserror::Error;

/// Validation error for item and container data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid weight: {0}")]
    InvalidWeight(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type alias for state file operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors raised while reading or writing engine state.
#[derive(Debug, Error)]
pub enum StateError {
    /// The state file does not exist.
    #[error("state file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Reading or writing the state file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state document could not be decoded: malformed JSON, an unknown item
    /// type tag, or item/container data that fails validation.
    #[error("corrupt state: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// The document decoded but describes an impossible container.
    #[error("invalid state: {0}")]
    Invalid(#[from] ValidationError),
}

impl StateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::Io { path, source }
        }
    }

    /// I/O problems are recoverable (reported as a failed operation);
    /// everything else means the state document itself is broken.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Io { .. })
    }
}

/// Errors returned by the [`crate::service::PackingService`] handle.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The engine worker has stopped and no longer accepts commands.
    #[error("packing engine worker is not running")]
    Unavailable,

    #[error(transparent)]
    State(#[from] StateError),
}
