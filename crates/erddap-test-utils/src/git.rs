//! Real git repositories for sync tests.
//!
//! Repositories are built with the `git` CLI so the fixtures do not depend on
//! the code under test.

use std::fs;
use std::path::Path;
use std::process::Command;

/// Run `git` in `path`, returning trimmed stdout.
///
/// # Panics
/// Panics if git cannot be started or exits unsuccessfully.
pub fn run_git(path: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(path)
        .output()
        .unwrap_or_else(|e| panic!("run_git: failed to run `git {args:?}`: {e}"));
    if !output.status.success() {
        panic!(
            "run_git: `git {args:?}` failed:\n{}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Initialise a repository on branch `main` with `files` committed.
///
/// `files` are `(relative path, content)` pairs; parents are created.
pub fn upstream_repo(path: &Path, files: &[(&str, &str)]) {
    fs::create_dir_all(path)
        .unwrap_or_else(|e| panic!("upstream_repo: failed to create {}: {e}", path.display()));
    run_git(path, &["init"]);
    run_git(path, &["config", "user.email", "test@test.com"]);
    run_git(path, &["config", "user.name", "Test User"]);
    run_git(path, &["config", "commit.gpgsign", "false"]);
    // init.defaultBranch differs between machines
    commit_files(path, files, "Initial datasets");
    run_git(path, &["branch", "-M", "main"]);
}

/// Write `files` into `path` and commit them.
pub fn commit_files(path: &Path, files: &[(&str, &str)], message: &str) {
    for (relative, content) in files {
        let file = path.join(relative);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).unwrap_or_else(|e| {
                panic!("commit_files: failed to create {}: {e}", parent.display())
            });
        }
        fs::write(&file, content)
            .unwrap_or_else(|e| panic!("commit_files: failed to write {}: {e}", file.display()));
    }
    run_git(path, &["add", "-A"]);
    run_git(path, &["commit", "--allow-empty", "-m", message]);
}

/// Create `branch` from the current HEAD with `files` committed on it, then
/// switch back to `main`.
pub fn branch_with_files(path: &Path, branch: &str, files: &[(&str, &str)]) {
    run_git(path, &["checkout", "-b", branch]);
    commit_files(path, files, &format!("Datasets for {branch}"));
    run_git(path, &["checkout", "main"]);
}

/// Current HEAD commit id.
pub fn head_commit(path: &Path) -> String {
    run_git(path, &["rev-parse", "HEAD"])
}
