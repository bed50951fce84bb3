//! Registry model: datasets, top-level settings and provenance

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

use crate::loader::{self, LoadReport};
use crate::value::{Attributes, Fields, Value};
use crate::{Error, Result};

/// XML attribute holding the dataset identifier
pub const DATASET_ID_ATTRIBUTE: &str = "datasetID";

/// XML attribute holding the dataset type discriminator
pub const TYPE_ATTRIBUTE: &str = "type";

/// One served data feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dataset {
    pub id: String,
    /// The `type` discriminator, e.g. `EDDTableFromErddap`. Empty when absent.
    pub kind: String,
    /// Remaining XML attributes of the `<dataset>` element, e.g. `active`
    pub attributes: Attributes,
    /// Child elements in document order
    pub fields: Fields,
}

impl Dataset {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            attributes: Attributes::new(),
            fields: Fields::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Look up an attribute or field by name in the flat attribute namespace.
    pub fn get(&self, name: &str) -> Option<Value> {
        if name == TYPE_ATTRIBUTE {
            return Some(Value::Text(self.kind.clone()));
        }
        if let Some(value) = self.attributes.get(name) {
            return Some(Value::scalar(value.clone()));
        }
        self.fields.get(name).cloned()
    }

    /// The flat attribute view compared by the diff engine:
    /// `type`, then XML attributes, then child elements.
    pub fn entries(&self) -> Fields {
        let mut entries = Fields::with_capacity(1 + self.attributes.len() + self.fields.len());
        entries.insert(TYPE_ATTRIBUTE.to_string(), Value::Text(self.kind.clone()));
        for (name, value) in &self.attributes {
            entries.insert(name.clone(), Value::scalar(value.clone()));
        }
        for (name, value) in &self.fields {
            entries.insert(name.clone(), value.clone());
        }
        entries
    }

    /// First name used both as an XML attribute and as a child element.
    pub fn conflicting_name(&self) -> Option<&str> {
        self.fields
            .keys()
            .find(|name| {
                name.as_str() == TYPE_ATTRIBUTE
                    || name.as_str() == DATASET_ID_ATTRIBUTE
                    || self.attributes.contains_key(name.as_str())
            })
            .map(String::as_str)
    }

    /// Fold a later definition of the same dataset into this one.
    ///
    /// Every attribute and field of `later` replaces the value under the same
    /// key; keys keep the position they were first seen at.
    pub(crate) fn merge_from(&mut self, later: Dataset) {
        if !later.kind.is_empty() {
            self.kind = later.kind;
        }
        for (name, value) in later.attributes {
            self.attributes.insert(name, value);
        }
        for (name, value) in later.fields {
            self.fields.insert(name, value);
        }
    }
}

/// Where a registry was loaded from, kept so it can be reloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// One monolithic datasets.xml
    File(PathBuf),
    /// Fragment files matched by `pattern` relative to `base`
    Fragments {
        base: PathBuf,
        pattern: String,
        recursive: bool,
    },
}

impl Source {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn fragments(base: impl Into<PathBuf>, pattern: impl Into<String>, recursive: bool) -> Self {
        Self::Fragments {
            base: base.into(),
            pattern: pattern.into(),
            recursive,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Fragments {
                base,
                pattern,
                recursive,
            } => {
                write!(f, "{}/{}", base.display(), pattern)?;
                if *recursive {
                    write!(f, " (recursive)")?;
                }
                Ok(())
            }
        }
    }
}

/// The full set of configured datasets plus top-level server settings.
///
/// Cloning produces a fully independent snapshot. Equality is structural:
/// datasets (in order) and settings, regardless of where they came from.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    datasets: IndexMap<String, Dataset>,
    settings: Fields,
    source: Option<Source>,
    files: Vec<PathBuf>,
}

impl Registry {
    /// Create an empty registry with no source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry, logging any non-fatal warnings.
    pub fn load(source: Source) -> Result<(Self, LoadReport)> {
        loader::load(&source)
    }

    /// Load one monolithic datasets.xml.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        loader::load(&Source::file(path.as_ref())).map(|(registry, _)| registry)
    }

    /// Load and merge a fragment set in sorted path order.
    pub fn load_fragments(
        base: impl AsRef<Path>,
        pattern: &str,
        recursive: bool,
    ) -> Result<(Self, LoadReport)> {
        loader::load(&Source::fragments(base.as_ref(), pattern, recursive))
    }

    /// Re-run the loader against the same source and replace the contents.
    ///
    /// On failure the registry is left untouched.
    pub fn reload(&mut self) -> Result<LoadReport> {
        let source = self.source.clone().ok_or(Error::NoSource)?;
        let (fresh, report) = loader::load(&source)?;
        *self = fresh;
        Ok(report)
    }

    pub(crate) fn with_provenance(mut self, source: Source, files: Vec<PathBuf>) -> Self {
        self.source = Some(source);
        self.files = files;
        self
    }

    /// Datasets in load order.
    pub fn datasets(&self) -> impl Iterator<Item = &Dataset> {
        self.datasets.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    pub fn dataset(&self, id: &str) -> Option<&Dataset> {
        self.datasets.get(id)
    }

    pub fn dataset_mut(&mut self, id: &str) -> Option<&mut Dataset> {
        self.datasets.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.datasets.contains_key(id)
    }

    /// Insert a dataset, replacing (in place) any dataset with the same id.
    pub fn insert(&mut self, dataset: Dataset) -> Option<Dataset> {
        self.datasets.insert(dataset.id.clone(), dataset)
    }

    /// Remove a dataset, keeping the order of the others.
    pub fn remove(&mut self, id: &str) -> Option<Dataset> {
        self.datasets.shift_remove(id)
    }

    pub fn settings(&self) -> &Fields {
        &self.settings
    }

    pub fn set_setting(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.settings.insert(name.into(), value.into());
    }

    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    /// Files read to build this registry, in merge order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

impl PartialEq for Registry {
    fn eq(&self, other: &Self) -> bool {
        self.settings == other.settings
            && self.datasets.len() == other.datasets.len()
            && self
                .datasets
                .values()
                .zip(other.datasets.values())
                .all(|(a, b)| a == b)
    }
}

impl Eq for Registry {}

impl FromIterator<Dataset> for Registry {
    fn from_iter<I: IntoIterator<Item = Dataset>>(iter: I) -> Self {
        let mut registry = Self::new();
        for dataset in iter {
            registry.insert(dataset);
        }
        registry
    }
}
