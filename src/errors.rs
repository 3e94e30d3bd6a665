//! ConfigMap Source Error Hierarchy
//!
//! Errors are grouped by the stage that produced them: construction of the
//! backend client, calls against the backend, snapshot encoding, and the
//! terminal outcomes of a watch stream.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Backend client could not be built; replayed on every call of a
    /// deferred-mode source
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    /// GET or WATCH-open against the backend failed
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Snapshot could not be serialized
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The backend stream ended or failed after it was opened
    #[error(transparent)]
    StreamTerminated(#[from] StreamTerminated),

    /// The consumer stopped the watcher
    #[error("Watcher was stopped")]
    Cancelled,

    /// Settings loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// True when the error is the clean cancellation signal of a stopped watcher.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// True when no further `ChangeSet` can follow this error on the same watcher.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Error::Cancelled | Error::StreamTerminated(_))
    }
}

/// Construction-time failures. `Clone` so a deferred-mode source can hand the
/// same error to every caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstructionError {
    /// Resolved resource name or namespace is not acceptable to the backend
    #[error("Invalid source identity: {0}")]
    InvalidIdentity(String),

    /// Source settings rejected, e.g. a zero watch buffer
    #[error("Invalid source settings: {0}")]
    InvalidSettings(String),

    /// Auth config file missing or unreadable
    #[error("Failed to load auth config at {path}: {reason}")]
    AuthConfig { path: String, reason: String },

    /// Backend factory refused to build a client
    #[error("Failed to create backend client: {0}")]
    Client(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("ConfigMap {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    /// Backend endpoint could not be reached
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Backend rejected or failed the request
    #[error("Backend request failed: {0}")]
    Request(String),

    /// Error pushed through an open change stream
    #[error("Watch stream error: {0}")]
    Stream(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("Error reading source: {0}")]
    Json(String),
}

impl From<serde_json::Error> for EncodeError {
    fn from(e: serde_json::Error) -> Self {
        EncodeError::Json(e.to_string())
    }
}

/// Why a watch stream stopped producing events, cancellation aside.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamTerminated {
    #[error("Watch stream ended")]
    EndOfStream,

    #[error("Watch stream failed: {0}")]
    Backend(BackendError),

    #[error("Watch event could not be encoded: {0}")]
    Encode(EncodeError),
}
