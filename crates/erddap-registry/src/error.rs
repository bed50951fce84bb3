//! Error types for erddap-registry

use std::path::PathBuf;

/// Result type for erddap-registry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in erddap-registry operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unexpected root element <{found}> in {path}, expected <erddapDatasets>")]
    UnexpectedRoot { path: PathBuf, found: String },

    #[error("Dataset without datasetID in {path}")]
    MissingDatasetId { path: PathBuf },

    #[error("Duplicate dataset '{id}' in {path}")]
    DuplicateDataset { id: String, path: PathBuf },

    #[error("Dataset '{id}' in {path} defines '{name}' both as an attribute and as an element")]
    AttributeConflict {
        id: String,
        name: String,
        path: PathBuf,
    },

    #[error("Invalid fragment pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("Cannot render {location}: {message}")]
    Render { location: String, message: String },

    #[error("Registry was not loaded from a source and cannot be reloaded")]
    NoSource,

    #[error(transparent)]
    Fs(#[from] erddap_fs::Error),
}

impl Error {
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn render(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Render {
            location: location.into(),
            message: message.into(),
        }
    }
}
