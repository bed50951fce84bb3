//! Dataset registry engine for ERDDAP deployments
//!
//! Loads datasets.xml or a merged set of fragment files into an ordered
//! registry, diffs registry snapshots per dataset, overlays secrets onto a
//! render-only copy, and renders the registry back to a stable document.

pub mod diff;
pub mod error;
pub mod live;
pub mod loader;
pub mod model;
pub mod parser;
pub mod render;
pub mod secrets;
pub mod value;

pub use diff::{Change, DatasetDiff, DiffStatus, FieldDiff, RegistryDiff, diff};
pub use error::{Error, Result};
pub use live::{LiveRegistry, Reload};
pub use loader::{LoadReport, Warning};
pub use model::{Dataset, Registry, Source};
pub use render::{render, render_to_string, write};
pub use secrets::{SECRET_PREFIX, SecretReport, Secrets, merge_secrets, secrets_from_vars};
pub use value::{Attributes, Block, Fields, Number, Value};
