//! Document loader
//!
//! Builds a [`Registry`] from one monolithic datasets.xml or from a set of
//! fragment files merged in sorted path order.

use std::fmt;
use std::path::{Path, PathBuf};

use erddap_fs::{NormalizedPath, io};

use crate::model::{Registry, Source};
use crate::parser::{Document, parse_document};
use crate::{Error, Result};

/// A non-fatal condition found while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// No fragment file matched the pattern
    EmptySource { pattern: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySource { pattern } => write!(f, "no fragment files match {pattern}"),
        }
    }
}

/// What a load read, and anything the caller may want to act on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Files read, in merge order
    pub files: Vec<PathBuf>,
    pub warnings: Vec<Warning>,
}

impl LoadReport {
    pub fn is_empty_source(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, Warning::EmptySource { .. }))
    }
}

/// Load a registry from `source`.
pub fn load(source: &Source) -> Result<(Registry, LoadReport)> {
    let mut report = LoadReport::default();

    let files = match source {
        Source::File(path) => vec![path.clone()],
        Source::Fragments {
            base,
            pattern,
            recursive,
        } => {
            let files = resolve_fragments(base, pattern, *recursive)?;
            if files.is_empty() {
                let warning = Warning::EmptySource {
                    pattern: source.to_string(),
                };
                tracing::warn!(%source, "{warning}");
                report.warnings.push(warning);
            }
            files
        }
    };

    let mut registry = Registry::new();
    for path in &files {
        let document = load_document(path)?;
        tracing::debug!(
            path = %path.display(),
            datasets = document.datasets.len(),
            settings = document.settings.len(),
            "Merging document"
        );
        fold(&mut registry, path, document)?;
    }

    tracing::info!(
        %source,
        files = files.len(),
        datasets = registry.len(),
        "Loaded dataset registry"
    );

    report.files = files.clone();
    Ok((registry.with_provenance(source.clone(), files), report))
}

/// Read and parse one document. The file handle is closed before parsing.
pub fn load_document(path: &Path) -> Result<Document> {
    let text = io::read_text(&NormalizedPath::new(path))?;
    parse_document(path, &text)
}

/// Resolve a fragment pattern to a sorted, de-duplicated list of files.
///
/// A relative `pattern` is resolved against `base`. When `recursive` is set
/// and the pattern has no `**`, the file-name component is searched for in
/// every subdirectory; when it is not set, `**` behaves like `*`.
pub fn resolve_fragments(base: &Path, pattern: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    let pattern = effective_pattern(pattern, recursive);
    let full_pattern = if Path::new(&pattern).is_absolute() || base.as_os_str().is_empty() {
        pattern.clone()
    } else {
        let base = NormalizedPath::new(base);
        let escaped = glob::Pattern::escape(base.as_str());
        NormalizedPath::new(escaped).join(&pattern).as_str().to_string()
    };

    let entries = glob::glob(&full_pattern).map_err(|e| Error::Pattern {
        pattern: full_pattern.clone(),
        message: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            erddap_fs::Error::io(path, e.into_error())
        })?;
        if path.is_file() {
            files.push(path);
        }
    }

    files.sort_by_cached_key(|path| NormalizedPath::new(path));
    files.dedup();
    Ok(files)
}

fn effective_pattern(pattern: &str, recursive: bool) -> String {
    let pattern = pattern.replace('\\', "/");
    if !recursive {
        return pattern.replace("**", "*");
    }
    if pattern.contains("**") {
        return pattern;
    }
    match pattern.rsplit_once('/') {
        Some((dir, name)) => format!("{dir}/**/{name}"),
        None => format!("**/{pattern}"),
    }
}

fn fold(registry: &mut Registry, path: &Path, document: Document) -> Result<()> {
    for (name, value) in document.settings {
        registry.set_setting(name, value);
    }

    for dataset in document.datasets {
        match registry.dataset_mut(&dataset.id) {
            Some(existing) => {
                tracing::debug!(
                    dataset = %dataset.id,
                    path = %path.display(),
                    "Overriding dataset from later fragment"
                );
                existing.merge_from(dataset);
                if let Some(name) = existing.conflicting_name() {
                    return Err(Error::AttributeConflict {
                        id: existing.id.clone(),
                        name: name.to_string(),
                        path: path.to_path_buf(),
                    });
                }
            }
            None => {
                registry.insert(dataset);
            }
        }
    }
    Ok(())
}
