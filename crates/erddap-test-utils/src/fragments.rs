//! datasets.xml document builders and fragment directories.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Wrap `body` in an `<erddapDatasets>` document.
pub fn document(body: &str) -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<erddapDatasets>\n{body}</erddapDatasets>\n")
}

/// One `<dataset>` element with simple `<name>value</name>` fields.
pub fn dataset(id: &str, kind: &str, fields: &[(&str, &str)]) -> String {
    let mut xml = format!("    <dataset type=\"{kind}\" datasetID=\"{id}\" active=\"true\">\n");
    for (name, value) in fields {
        xml.push_str(&format!("        <{name}>{value}</{name}>\n"));
    }
    xml.push_str("    </dataset>\n");
    xml
}

/// A temporary directory of fragment files.
///
/// ```rust,no_run
/// use erddap_test_utils::fragments::{FragmentDir, dataset};
///
/// let dir = FragmentDir::new()
///     .with_fragment("010-base.xml", &dataset("buoy1", "EDDTableFromErddap", &[]));
/// assert!(dir.path().join("010-base.xml").exists());
/// ```
pub struct FragmentDir {
    temp_dir: TempDir,
}

impl Default for FragmentDir {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentDir {
    /// Create an empty temporary directory.
    ///
    /// # Panics
    /// Panics if the directory cannot be created.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new()
                .unwrap_or_else(|e| panic!("FragmentDir::new: failed to create temp dir: {e}")),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write `body` wrapped in a root element to `relative`, creating parents.
    pub fn with_fragment(self, relative: &str, body: &str) -> Self {
        self.write(relative, &document(body));
        self
    }

    /// Write raw content to `relative`, creating parents.
    ///
    /// # Panics
    /// Panics if the file cannot be written.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap_or_else(|e| {
                panic!("FragmentDir::write: failed to create {}: {e}", parent.display())
            });
        }
        fs::write(&path, content)
            .unwrap_or_else(|e| panic!("FragmentDir::write: failed to write {}: {e}", path.display()));
        path
    }

    /// Read a file back as a string.
    pub fn read(&self, relative: &str) -> String {
        let path = self.path().join(relative);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("FragmentDir::read: failed to read {}: {e}", path.display()))
    }
}
