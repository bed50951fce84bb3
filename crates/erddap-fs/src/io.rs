//! Scoped reads, atomic writes and marker files

use std::fs::{self, OpenOptions};
use std::io::Write;

use fs2::FileExt;

use crate::{Error, NormalizedPath, Result, validate_file_name};

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename so readers see either the previous
/// content or the complete new content, never a partial file.
pub fn write_atomic(path: &NormalizedPath, content: &[u8]) -> Result<()> {
    let native_path = path.to_native();

    if let Some(parent) = native_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    // Temp file lives next to the target so the rename stays on one filesystem
    let temp_name = format!(
        ".{}.{}.tmp",
        native_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = native_path.with_file_name(&temp_name);

    let result = (|| {
        let mut temp_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| Error::io(&temp_path, e))?;

        temp_file.lock_exclusive().map_err(|_| Error::LockFailed {
            path: native_path.clone(),
        })?;

        temp_file
            .write_all(content)
            .map_err(|e| Error::io(&temp_path, e))?;
        temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;

        temp_file.unlock().map_err(|_| Error::LockFailed {
            path: native_path.clone(),
        })?;

        fs::rename(&temp_path, &native_path).map_err(|e| Error::io(&native_path, e))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

/// Read text content from a file.
///
/// Content that is not valid UTF-8 is decoded as ISO-8859-1, the encoding
/// older datasets.xml files declare.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native_path = path.to_native();
    let bytes = fs::read(&native_path).map_err(|e| Error::io(&native_path, e))?;
    Ok(decode_text(bytes))
}

fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            tracing::debug!("content is not UTF-8, decoding as ISO-8859-1");
            // Every ISO-8859-1 byte maps to the code point of the same value
            err.into_bytes().into_iter().map(char::from).collect()
        }
    }
}

/// Create (or truncate) an empty marker file, creating parent directories.
pub fn write_marker(path: &NormalizedPath) -> Result<()> {
    let native_path = path.to_native();
    if let Some(parent) = native_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(&native_path, b"").map_err(|e| Error::io(&native_path, e))
}

/// Write one empty marker file per name into `dir`.
///
/// Every name is validated before anything is written, so an invalid name
/// leaves the directory untouched.
pub fn write_markers<I, S>(dir: &NormalizedPath, names: I) -> Result<Vec<NormalizedPath>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let names: Vec<S> = names.into_iter().collect();
    for name in &names {
        validate_file_name(name.as_ref())?;
    }

    let mut written = Vec::with_capacity(names.len());
    for name in &names {
        let path = dir.join(name.as_ref());
        write_marker(&path)?;
        tracing::debug!(path = %path, "Wrote marker file");
        written.push(path);
    }
    Ok(written)
}
