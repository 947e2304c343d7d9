use std::path::PathBuf;

use thiserror::Error;

/// A single candidate record could not be turned into an account.
/// Always absorbed by the collector.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("candidate has no profile link")]
    MissingLink,

    #[error("malformed identity: {0:?}")]
    Malformed(String),

    #[error("link does not point at an account: {0:?}")]
    NonIdentity(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited while loading {url}")]
    RateLimited { url: String },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("no page loaded in this session")]
    NoPage,

    #[error("invalid url {0:?}")]
    InvalidUrl(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SessionError {
    /// Fatal errors end the whole run. Everything else only costs the
    /// current target.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::Auth(_) | SessionError::RateLimited { .. } | SessionError::InvalidUrl(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("target {target} is unavailable (no list content rendered)")]
    TargetUnavailable { target: String },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("stopped by signal")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error on {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("could not move checkpoint into place at {path:?}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("target {0:?} cannot be used as a checkpoint key")]
    InvalidKey(String),
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistenceError::Io { path: path.into(), source }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        PersistenceError::Csv { path: path.into(), source }
    }
}

/// Run-level failure. `main` reports it and exits non-zero.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("input list {path:?} unusable: {reason}")]
    Input { path: PathBuf, reason: String },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("{0} is unavailable")]
    Unavailable(String),

    #[error("run cancelled")]
    Cancelled,
}

impl From<CollectError> for RunError {
    fn from(err: CollectError) -> Self {
        match err {
            CollectError::Session(e) => RunError::Session(e),
            CollectError::Cancelled => RunError::Cancelled,
            CollectError::TargetUnavailable { target } => RunError::Unavailable(target),
        }
    }
}

pub type Result<T, E = RunError> = core::result::Result<T, E>;
