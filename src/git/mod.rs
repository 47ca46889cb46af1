//! Git capability used by dispatch isolation.
//!
//! Thin shell-out layer over an external `git` binary: repo detection,
//! branch create/checkout/delete, commit, hard reset, merge and dirty-tree
//! detection, all scoped to a working directory. No git object model lives
//! here.

pub mod runner;

use anyhow::{bail, Result};
use std::path::Path;

use runner::{run_git, run_git_bool, run_git_checked};

/// Whether `repo_root` sits inside a git working tree.
pub fn is_repo(repo_root: &Path) -> bool {
    run_git_bool(&["rev-parse", "--is-inside-work-tree"], repo_root)
}

pub fn current_branch(repo_root: &Path) -> Result<String> {
    run_git_checked(&["rev-parse", "--abbrev-ref", "HEAD"], repo_root)
}

pub fn current_commit(repo_root: &Path) -> Result<String> {
    run_git_checked(&["rev-parse", "HEAD"], repo_root)
}

/// Detect staged or unstaged changes via `git status --porcelain`.
/// Untracked files are not counted: they survive branch switches and need no
/// backup commit.
pub fn is_dirty(repo_root: &Path) -> Result<bool> {
    let stdout = run_git_checked(&["status", "--porcelain"], repo_root)?;
    Ok(stdout
        .lines()
        .any(|line| !line.is_empty() && !line.starts_with("??")))
}

pub fn branch_exists(name: &str, repo_root: &Path) -> bool {
    let ref_path = format!("refs/heads/{name}");
    run_git_bool(&["rev-parse", "--verify", &ref_path], repo_root)
}

/// Create `name` without switching to it; branches from HEAD unless `base`
/// is given.
pub fn create_branch(name: &str, base: Option<&str>, repo_root: &Path) -> Result<()> {
    let mut args = vec!["branch", name];
    if let Some(base) = base {
        args.push(base);
    }
    run_git_checked(&args, repo_root)?;
    Ok(())
}

pub fn checkout(name: &str, repo_root: &Path) -> Result<()> {
    run_git_checked(&["checkout", name], repo_root)?;
    Ok(())
}

/// `git checkout -b`: create and switch, keeping the working tree as-is.
pub fn checkout_new(name: &str, repo_root: &Path) -> Result<()> {
    run_git_checked(&["checkout", "-b", name], repo_root)?;
    Ok(())
}

pub fn delete_branch(name: &str, force: bool, repo_root: &Path) -> Result<()> {
    let flag = if force { "-D" } else { "-d" };
    run_git_checked(&["branch", flag, name], repo_root)?;
    Ok(())
}

/// Stage everything and commit, returning the resulting commit hash. A clean
/// tree is not an error: the current HEAD hash is returned unchanged.
pub fn commit_all(message: &str, repo_root: &Path) -> Result<String> {
    run_git_checked(&["add", "-A"], repo_root)?;
    let staged = run_git_checked(&["status", "--porcelain"], repo_root)?;
    if staged.is_empty() {
        return current_commit(repo_root);
    }
    run_git_checked(&["commit", "-m", message], repo_root)?;
    current_commit(repo_root)
}

pub fn reset_hard(commit: &str, repo_root: &Path) -> Result<()> {
    run_git_checked(&["reset", "--hard", commit], repo_root)?;
    Ok(())
}

/// Merge `branch` into `into` with a merge commit. On conflict the merge is
/// aborted so the tree stays clean, and an error is returned.
pub fn merge(branch: &str, into: &str, repo_root: &Path) -> Result<()> {
    if !branch_exists(branch, repo_root) {
        bail!("branch '{branch}' does not exist");
    }
    checkout(into, repo_root)?;
    let message = format!("Merge {branch} into {into}");
    let output = run_git(&["merge", "--no-ff", "-m", &message, branch], repo_root)?;
    if output.status.success() {
        return Ok(());
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stdout.contains("CONFLICT") || stderr.contains("CONFLICT") {
        // Leave the repo in a clean state before surfacing the conflict.
        run_git(&["merge", "--abort"], repo_root).ok();
        bail!("merge of '{branch}' into '{into}' has conflicts");
    }
    bail!("git merge failed: {stderr}");
}
