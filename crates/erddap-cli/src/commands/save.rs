//! Save command implementation
//!
//! Renders the configured registry, with secrets merged in, to datasets.xml.

use std::path::Path;

use colored::Colorize;

use erddap_fs::checksum::{compute_checksum, compute_file_checksum};
use erddap_fs::{NormalizedPath, io};
use erddap_registry::{Registry, Secrets, merge_secrets, render};

use crate::context::Context;
use crate::error::Result;

/// Run the save command
pub fn run_save(ctx: &Context, output: &str) -> Result<()> {
    let output = ctx.expand_path(output)?;
    let (registry, _) = ctx.load()?;
    let secrets = ctx.secrets();

    if write_rendered(&registry, &secrets, &output)? {
        println!(
            "{} Wrote {} datasets to {}",
            "OK".green().bold(),
            registry.len(),
            output.display().to_string().yellow()
        );
    } else {
        println!(
            "{} {} is up to date",
            "OK".green().bold(),
            output.display().to_string().yellow()
        );
    }
    Ok(())
}

/// Merge `secrets` into a copy of `registry` and write the rendered document.
///
/// Returns `false` without touching the file when it already holds exactly
/// these bytes.
pub fn write_rendered(registry: &Registry, secrets: &Secrets, output: &Path) -> Result<bool> {
    let (rendered, report) = merge_secrets(registry, secrets);
    if !report.is_clean() {
        println!(
            "{} {} secret(s) matched no dataset attribute: {}",
            "warning".yellow().bold(),
            report.unmatched.len(),
            report.unmatched.join(", ")
        );
    }

    let bytes = render(&rendered)?;
    let path = NormalizedPath::new(output);
    if compute_file_checksum(&path)?.as_deref() == Some(compute_checksum(&bytes).as_str()) {
        tracing::info!(path = %path, "datasets.xml unchanged, skipping write");
        return Ok(false);
    }

    io::write_atomic(&path, &bytes)?;
    tracing::info!(path = %path, datasets = rendered.len(), "Wrote datasets.xml");
    Ok(true)
}
