//! Local clone of the datasets repository

use std::fs;
use std::path::{Path, PathBuf};

use git2::build::CheckoutBuilder;
use git2::{BranchType, Reference, Repository};

use crate::{Error, Result};

/// Remote the datasets repository is cloned from
pub const DEFAULT_REMOTE: &str = "origin";

/// What a pull did to the checked-out branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    UpToDate,
    FastForwarded { from: String, to: String },
}

impl PullOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::FastForwarded { .. })
    }
}

/// A working copy of the datasets repository.
pub struct DatasetsRepo {
    repo: Repository,
    path: PathBuf,
}

impl DatasetsRepo {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let repo = Repository::open(&path)?;
        Ok(Self { repo, path })
    }

    /// Clone `url` into `path`. The remote is registered as `origin`.
    pub fn clone_from(url: &str, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        tracing::info!(url = %url, path = %path.display(), "Cloning datasets repository");
        let repo = Repository::clone(url, &path)?;
        Ok(Self { repo, path })
    }

    /// True if `path` does not exist or is an empty directory.
    pub fn needs_clone(path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(true);
        }
        let mut entries = fs::read_dir(path).map_err(|e| Error::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(entries.next().is_none())
    }

    /// Open the working copy at `path`, cloning `url` first when there is none.
    pub fn open_or_clone(url: Option<&str>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !Self::needs_clone(path)? {
            return Self::open(path);
        }
        match url {
            Some(url) => Self::clone_from(url, path),
            None => Err(Error::MissingRepoUrl {
                path: path.to_path_buf(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The checked-out branch, or `None` when HEAD is detached.
    pub fn current_branch(&self) -> Result<Option<String>> {
        let head = self.repo.head()?;
        if head.is_branch() {
            Ok(Some(head.shorthand().unwrap_or("HEAD").to_string()))
        } else {
            Ok(None)
        }
    }

    pub fn head_commit(&self) -> Result<String> {
        Ok(self.repo.head()?.peel_to_commit()?.id().to_string())
    }

    /// Check out `branch`, creating a local branch that tracks
    /// `origin/<branch>` when only the remote one exists.
    pub fn checkout(&self, branch: &str) -> Result<()> {
        if !Reference::is_valid_name(&format!("refs/heads/{branch}")) {
            return Err(Error::InvalidBranchName {
                name: branch.to_string(),
            });
        }

        if self.repo.find_branch(branch, BranchType::Local).is_err() {
            let remote_name = format!("{DEFAULT_REMOTE}/{branch}");
            let remote = self
                .repo
                .find_branch(&remote_name, BranchType::Remote)
                .map_err(|_| Error::BranchNotFound {
                    name: branch.to_string(),
                })?;
            let commit = remote.get().peel_to_commit()?;
            let mut local = self.repo.branch(branch, &commit, false)?;
            local.set_upstream(Some(&remote_name))?;
            tracing::debug!(branch = %branch, "Created local branch tracking {remote_name}");
        }

        // Check out the tree before moving HEAD so files only in the old
        // branch are removed
        let refname = format!("refs/heads/{branch}");
        let target = self.repo.revparse_single(&refname)?;
        self.repo
            .checkout_tree(&target, Some(CheckoutBuilder::default().force()))?;
        self.repo.set_head(&refname)?;
        tracing::info!(branch = %branch, path = %self.path.display(), "Checked out branch");
        Ok(())
    }

    /// Fetch the current branch from `origin` and fast-forward to it.
    pub fn pull(&self) -> Result<PullOutcome> {
        let branch = self.current_branch()?.ok_or_else(|| Error::DetachedHead {
            path: self.path.clone(),
        })?;

        let mut remote = self
            .repo
            .find_remote(DEFAULT_REMOTE)
            .map_err(|_| Error::RemoteNotFound {
                name: DEFAULT_REMOTE.to_string(),
            })?;

        remote
            .fetch(&[&branch], None, None)
            .map_err(|e| Error::PullFailed {
                message: format!("Fetch failed: {}", e.message()),
            })?;

        let fetch_head = self
            .repo
            .find_reference("FETCH_HEAD")
            .map_err(|e| Error::PullFailed {
                message: format!("Could not find FETCH_HEAD: {}", e.message()),
            })?;
        let fetch_commit = fetch_head.peel_to_commit().map_err(|e| Error::PullFailed {
            message: format!("Could not resolve FETCH_HEAD: {}", e.message()),
        })?;

        let head_commit = self.repo.head()?.peel_to_commit()?;
        let annotated = self.repo.find_annotated_commit(fetch_commit.id())?;
        let (analysis, _) = self.repo.merge_analysis(&[&annotated])?;

        if analysis.is_up_to_date() {
            tracing::info!(branch = %branch, "Datasets repository is up to date");
            return Ok(PullOutcome::UpToDate);
        }

        if analysis.is_fast_forward() {
            self.repo.checkout_tree(
                fetch_commit.as_object(),
                Some(CheckoutBuilder::default().force()),
            )?;
            let refname = format!("refs/heads/{branch}");
            let mut reference = self.repo.find_reference(&refname)?;
            reference.set_target(
                fetch_commit.id(),
                &format!("pull: fast-forward to {}", fetch_commit.id()),
            )?;

            let outcome = PullOutcome::FastForwarded {
                from: head_commit.id().to_string(),
                to: fetch_commit.id().to_string(),
            };
            tracing::info!(branch = %branch, ?outcome, "Fast-forwarded datasets repository");
            return Ok(outcome);
        }

        Err(Error::CannotFastForward {
            message: format!(
                "{} diverged from {DEFAULT_REMOTE} ({} vs {}); resolve manually",
                branch,
                head_commit.id(),
                fetch_commit.id()
            ),
        })
    }
}

impl std::fmt::Debug for DatasetsRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetsRepo")
            .field("path", &self.path)
            .finish()
    }
}
