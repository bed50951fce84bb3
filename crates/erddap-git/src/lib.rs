//! Datasets repository sync
//!
//! Materializes the fragment directory from a remote git repository and
//! advances it to the tip of a branch before the registry is reloaded.

pub mod error;
pub mod repo;

pub use error::{Error, Result};
pub use repo::{DEFAULT_REMOTE, DatasetsRepo, PullOutcome};
