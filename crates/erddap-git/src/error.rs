//! Error types for erddap-git

use std::path::PathBuf;

/// Result type for erddap-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in erddap-git operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Branch '{name}' not found locally or on origin")]
    BranchNotFound { name: String },

    #[error("Remote '{name}' not found")]
    RemoteNotFound { name: String },

    #[error("Invalid branch name: {name}")]
    InvalidBranchName { name: String },

    #[error("HEAD is detached in {path}; check out a branch before pulling")]
    DetachedHead { path: PathBuf },

    #[error("{path} is empty and no repository URL was given to clone")]
    MissingRepoUrl { path: PathBuf },

    #[error("Pull failed: {message}")]
    PullFailed { message: String },

    #[error("Cannot fast-forward: {message}")]
    CannotFastForward { message: String },
}
