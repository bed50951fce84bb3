//! Live registry handle
//!
//! Reloading never mutates a registry that someone may be diffing. Each load
//! produces a new immutable snapshot which is swapped in atomically; readers
//! keep whatever snapshot they already hold.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::diff::{RegistryDiff, diff};
use crate::loader::{self, LoadReport};
use crate::model::{Registry, Source};
use crate::{Error, Result};

/// The outcome of a reload: both snapshots and what the load read.
#[derive(Debug, Clone)]
pub struct Reload {
    pub before: Arc<Registry>,
    pub after: Arc<Registry>,
    pub report: LoadReport,
}

impl Reload {
    /// Compare the snapshot replaced by this reload with the new one.
    pub fn diff(&self) -> RegistryDiff {
        diff(&self.before, &self.after)
    }
}

pub struct LiveRegistry {
    current: ArcSwap<Registry>,
}

impl LiveRegistry {
    pub fn new(registry: Registry) -> Self {
        Self {
            current: ArcSwap::from_pointee(registry),
        }
    }

    /// Load the initial snapshot from `source`.
    pub fn load(source: Source) -> Result<(Self, LoadReport)> {
        let (registry, report) = loader::load(&source)?;
        Ok((Self::new(registry), report))
    }

    /// The current snapshot. It stays valid across later reloads.
    pub fn snapshot(&self) -> Arc<Registry> {
        self.current.load_full()
    }

    /// Load a fresh snapshot from the current snapshot's source and swap it in.
    ///
    /// A failed load leaves the current snapshot live.
    pub fn reload(&self) -> Result<Reload> {
        let before = self.snapshot();
        let source = before.source().cloned().ok_or(Error::NoSource)?;
        let (registry, report) = loader::load(&source)?;
        let after = Arc::new(registry);
        self.current.store(Arc::clone(&after));
        tracing::debug!(%source, datasets = after.len(), "Swapped in reloaded registry");
        Ok(Reload {
            before,
            after,
            report,
        })
    }

    /// Swap in `registry`, returning the snapshot it replaced.
    pub fn replace(&self, registry: Registry) -> Arc<Registry> {
        self.current.swap(Arc::new(registry))
    }
}

impl std::fmt::Debug for LiveRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveRegistry")
            .field("datasets", &self.current.load().len())
            .finish()
    }
}
