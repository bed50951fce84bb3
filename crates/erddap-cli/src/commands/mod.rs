//! Command implementations for erddap-cli

pub mod diff;
pub mod save;
pub mod sync;

pub use diff::run_diff;
pub use save::run_save;
pub use sync::{SyncOptions, run_sync};
