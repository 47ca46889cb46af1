//! Git subprocess runner.
//!
//! All git access shells out through these helpers so invocation and error
//! reporting stay uniform across the capability layer.

use std::path::Path;
use std::process::{Command, Output};

use anyhow::{bail, Context, Result};

fn git_command(args: &[&str], repo_root: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(repo_root);
    cmd
}

/// Run git and hand back the raw [`Output`] for callers that inspect exit
/// status or stderr themselves.
pub fn run_git(args: &[&str], repo_root: &Path) -> Result<Output> {
    git_command(args, repo_root)
        .output()
        .with_context(|| format!("could not spawn `git {}`", args.join(" ")))
}

/// Run git, demand a zero exit, and return trimmed stdout. The error carries
/// the full command line and stderr.
pub fn run_git_checked(args: &[&str], repo_root: &Path) -> Result<String> {
    let output = run_git(args, repo_root)?;
    if !output.status.success() {
        bail!(
            "`git {}` exited with {}: {}",
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run git for its exit status alone; spawn failures read as false. Suited
/// to existence probes.
pub fn run_git_bool(args: &[&str], repo_root: &Path) -> bool {
    git_command(args, repo_root)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
