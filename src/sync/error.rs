use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::db::DbError;
use crate::download::DownloadError;
use crate::manifest::ManifestError;
use crate::remote::RemoteError;

/// Failures that abort a whole sync pass or the session's current
/// operation. Per-project trouble inside a pass is collected in the
/// report instead.
#[derive(Error, Debug, Diagnostic)]
pub enum SyncError {
    #[error("A sync is already running")]
    #[diagnostic(code(taalsync::sync::already_running))]
    AlreadyRunning,

    #[error("Sync cancelled")]
    #[diagnostic(code(taalsync::sync::cancelled))]
    Cancelled,

    #[error("No manifest staged for import")]
    #[diagnostic(code(taalsync::sync::nothing_staged))]
    NothingStaged,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] DbError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Download(#[from] DownloadError),

    #[error("File error at {path}: {source}")]
    #[diagnostic(code(taalsync::sync::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Cancellation can surface wrapped in a download error; normalize it
    /// so callers only have to match one variant.
    pub(crate) fn normalize(self) -> Self {
        match self {
            Self::Download(DownloadError::Cancelled) => Self::Cancelled,
            other => other,
        }
    }
}
