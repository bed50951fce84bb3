//! Command context
//!
//! Resolves the registry source from the global options, expands path
//! placeholders and collects secrets from the environment.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use erddap_registry::{LiveRegistry, LoadReport, Registry, Secrets, Source, secrets_from_vars};

use crate::cli::GlobalArgs;
use crate::error::{CliError, Result};

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]*)\}").expect("placeholder pattern is valid"));

#[derive(Debug, Clone)]
pub struct Context {
    pub global: GlobalArgs,
    /// Directory relative fragment patterns are resolved against
    pub cwd: PathBuf,
}

impl Context {
    pub fn new(global: GlobalArgs, cwd: impl Into<PathBuf>) -> Self {
        Self {
            global,
            cwd: cwd.into(),
        }
    }

    /// Expand `{datasets_xml}`, `{datasets_d}` and `{bigParentDirectory}`.
    pub fn expand(&self, template: &str) -> Result<String> {
        let mut unknown = None;
        let expanded = PLACEHOLDER_RE.replace_all(template, |caps: &Captures<'_>| {
            match &caps[1] {
                "datasets_xml" => self.global.datasets_xml.clone(),
                "datasets_d" => self.global.datasets_d.clone(),
                "bigParentDirectory" => self.global.big_parent_directory.clone(),
                other => {
                    unknown.get_or_insert_with(|| other.to_string());
                    String::new()
                }
            }
        });
        match unknown {
            Some(name) => Err(CliError::user(format!(
                "Unknown placeholder {{{name}}} in '{template}'"
            ))),
            None => Ok(expanded.into_owned()),
        }
    }

    pub fn expand_path(&self, template: &str) -> Result<PathBuf> {
        let expanded = PathBuf::from(self.expand(template)?);
        Ok(self.resolve(&expanded))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    pub fn datasets_xml(&self) -> PathBuf {
        self.resolve(Path::new(&self.global.datasets_xml))
    }

    /// The configured source: fragments when a pattern is set, otherwise
    /// datasets.xml if it exists.
    pub fn source(&self) -> Option<Source> {
        if !self.global.datasets_d.is_empty() {
            return Some(Source::fragments(
                &self.cwd,
                self.global.datasets_d.as_str(),
                self.global.recursive,
            ));
        }
        let datasets_xml = self.datasets_xml();
        if datasets_xml.is_file() {
            return Some(Source::file(datasets_xml));
        }
        tracing::error!(path = %datasets_xml.display(), "No datasets.xml found");
        None
    }

    fn require_source(&self) -> Result<Source> {
        self.source().ok_or_else(|| {
            CliError::user(format!(
                "No datasets source: --datasets-d is empty and {} does not exist",
                self.datasets_xml().display()
            ))
        })
    }

    pub fn load(&self) -> Result<(Registry, LoadReport)> {
        let source = self.require_source()?;
        tracing::info!(%source, "Load datasets");
        Ok(Registry::load(source)?)
    }

    pub fn load_live(&self) -> Result<(LiveRegistry, LoadReport)> {
        let source = self.require_source()?;
        tracing::info!(%source, "Load datasets");
        Ok(LiveRegistry::load(source)?)
    }

    /// `ERDDAP_SECRET_*` variables from the process environment.
    pub fn secrets(&self) -> Secrets {
        let secrets = secrets_from_vars(std::env::vars());
        tracing::info!(secrets = ?secrets.keys().collect::<Vec<_>>(), "Include secrets");
        secrets
    }
}
