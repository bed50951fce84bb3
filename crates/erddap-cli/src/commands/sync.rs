//! Sync command implementation
//!
//! Advances the datasets repository, reloads the registry and rewrites
//! datasets.xml plus hard flags for whatever changed.

use std::path::{Path, PathBuf};

use colored::Colorize;

use erddap_fs::{NormalizedPath, io};
use erddap_git::DatasetsRepo;
use erddap_registry::{DiffStatus, RegistryDiff};

use super::save::write_rendered;
use crate::context::Context;
use crate::error::Result;

/// Options of the sync command, placeholders already expanded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub local_repo_path: PathBuf,
    pub hard_flag: bool,
    pub hard_flag_dir: PathBuf,
}

/// Run the sync command
pub fn run_sync(ctx: &Context, options: &SyncOptions) -> Result<()> {
    let (live, _) = ctx.load_live()?;

    let repo = DatasetsRepo::open_or_clone(options.repo.as_deref(), &options.local_repo_path)?;
    if let Some(branch) = &options.branch {
        repo.checkout(branch)?;
    }

    tracing::info!("Compare active datasets with the repository head");
    let outcome = repo.pull()?;
    tracing::debug!(?outcome, "Pulled datasets repository");
    let reload = live.reload()?;
    let changes = reload.diff();

    if changes.has_changes() {
        let output = ctx.datasets_xml();
        write_rendered(&reload.after, &ctx.secrets(), &output)?;
        print_changes(&changes);
    } else {
        println!("{} No dataset changes", "OK".green().bold());
    }

    if options.hard_flag {
        let written = write_hard_flags(&options.hard_flag_dir, &changes)?;
        if !written.is_empty() {
            println!(
                "{} Wrote {} hard flag(s) to {}",
                "OK".green().bold(),
                written.len(),
                options.hard_flag_dir.display().to_string().yellow()
            );
        }
    }

    tracing::info!("ERDDAP datasets.xml has been updated");
    Ok(())
}

/// Write one empty hard flag per changed dataset into `dir`.
pub fn write_hard_flags(dir: &Path, changes: &RegistryDiff) -> Result<Vec<PathBuf>> {
    let ids = changes.changed_ids();
    for id in &ids {
        tracing::info!(dataset = %id, "Generate hard flag");
        tracing::debug!(dataset = %id, diff = ?changes.get(id), "Dataset diff");
    }
    let written = io::write_markers(&NormalizedPath::new(dir), &ids)?;
    Ok(written.iter().map(NormalizedPath::to_native).collect())
}

fn print_changes(changes: &RegistryDiff) {
    for (id, diff) in changes.changed() {
        let marker = match diff.status {
            DiffStatus::Added => "+".green(),
            DiffStatus::Removed => "-".red(),
            DiffStatus::Modified | DiffStatus::Unchanged => "~".yellow(),
        };
        println!("  {marker} {id}");
    }
}
