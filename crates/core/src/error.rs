//! Error types for configuration and view management

use crate::view::ViewId;
use docshell_render::RenderError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating settings
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("malformed settings: {0}")]
    Parse(String),

    #[error("environment variable {name} has invalid value {value:?}")]
    Env { name: String, value: String },

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(error: toml::de::Error) -> Self {
        ConfigError::Parse(error.message().to_string())
    }
}

/// Errors raised by the workspace when opening or addressing views
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("no open view with id {0}")]
    UnknownView(ViewId),

    #[error("no view can open {}: {reason}", path.display())]
    Unsupported { path: PathBuf, reason: String },

    #[error("background worker is stopped")]
    WorkerStopped,

    #[error("failed to start background worker: {0}")]
    Spawn(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Result type for view operations
pub type ViewResult<T> = Result<T, ViewError>;
