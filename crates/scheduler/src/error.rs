//! Errors reported by the background I/O worker

use std::path::{Path, PathBuf};
use thiserror::Error;

/// A failed work item
///
/// Every variant carries the target it was raised for, so a failure can be
/// routed and displayed without the original request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IoError {
    #[error("{}: file not found", .target.display())]
    NotFound { target: PathBuf },

    #[error("{}: permission denied", .target.display())]
    PermissionDenied { target: PathBuf },

    #[error("{}: not valid UTF-8 text ({message})", .target.display())]
    Encoding { target: PathBuf, message: String },

    #[error("{}: {message}", .target.display())]
    Other { target: PathBuf, message: String },

    #[error("{}: worker fault: {message}", .target.display())]
    WorkerFault { target: PathBuf, message: String },
}

impl IoError {
    /// Classify a `std::io::Error` raised while touching `target`
    pub fn from_io(target: &Path, error: std::io::Error) -> Self {
        let target = target.to_path_buf();
        match error.kind() {
            std::io::ErrorKind::NotFound => IoError::NotFound { target },
            std::io::ErrorKind::PermissionDenied => IoError::PermissionDenied { target },
            std::io::ErrorKind::InvalidData => IoError::Encoding {
                target,
                message: error.to_string(),
            },
            _ => IoError::Other {
                target,
                message: error.to_string(),
            },
        }
    }

    /// Target identifier the failure belongs to
    pub fn target(&self) -> &Path {
        match self {
            IoError::NotFound { target }
            | IoError::PermissionDenied { target }
            | IoError::Encoding { target, .. }
            | IoError::Other { target, .. }
            | IoError::WorkerFault { target, .. } => target,
        }
    }
}
