use miette::Diagnostic;
use thiserror::Error;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Failure classes for the remote store, grouped by how they are handled
/// rather than by transport detail.
#[derive(Error, Debug, Diagnostic)]
pub enum RemoteError {
    #[error("Network error: {message}")]
    #[diagnostic(code(taalsync::remote::network))]
    Network { message: String },

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(taalsync::remote::auth),
        help("Check TAALSYNC_TOKEN or re-run authentication")
    )]
    Auth { message: String },

    #[error("Rate limited by remote store: {message}")]
    #[diagnostic(code(taalsync::remote::quota))]
    Quota { message: String },

    #[error("Remote {entity} not found: {id}")]
    #[diagnostic(code(taalsync::remote::not_found))]
    NotFound { entity: String, id: String },

    #[error("Permission denied: {message}")]
    #[diagnostic(code(taalsync::remote::permission))]
    Permission { message: String },

    #[error("Unexpected response from remote store: {message}")]
    #[diagnostic(code(taalsync::remote::protocol))]
    Protocol { message: String },
}

impl RemoteError {
    /// Transient failures worth retrying with backoff. Auth is handled
    /// separately (single refresh-and-retry), everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Quota { .. })
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}
