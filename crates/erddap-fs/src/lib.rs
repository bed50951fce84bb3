//! Filesystem primitives for the ERDDAP dataset registry
//!
//! Provides normalized paths, scoped reads, atomic writes and the
//! empty marker files the server watches for forced reloads.

pub mod checksum;
pub mod error;
pub mod io;
pub mod path;

pub use error::{Error, Result};
pub use path::{NormalizedPath, validate_file_name};
