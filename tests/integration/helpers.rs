//! Shared test helpers.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use tanmi::engine::Engine;
use tanmi::models::Workspace;
use tanmi::store::MemoryStore;

/// Create a temporary git repository with an initial commit on `main`.
pub fn init_test_repo() -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let repo_root = temp_dir.path();

    Command::new("git")
        .args(["init"])
        .current_dir(repo_root)
        .output()
        .expect("Failed to init git repo");

    Command::new("git")
        .args(["config", "user.email", "test@test.com"])
        .current_dir(repo_root)
        .output()
        .expect("Failed to set git user.email");

    Command::new("git")
        .args(["config", "user.name", "Test User"])
        .current_dir(repo_root)
        .output()
        .expect("Failed to set git user.name");

    fs::write(repo_root.join("README.md"), "# Test Repository\n")
        .expect("Failed to write README.md");

    Command::new("git")
        .args(["add", "."])
        .current_dir(repo_root)
        .output()
        .expect("Failed to git add");

    Command::new("git")
        .args(["commit", "-m", "Initial commit"])
        .current_dir(repo_root)
        .output()
        .expect("Failed to git commit");

    Command::new("git")
        .args(["branch", "-M", "main"])
        .current_dir(repo_root)
        .output()
        .expect("Failed to rename branch to main");

    temp_dir
}

/// Write a file and commit it.
pub fn commit_file(repo_root: &Path, filename: &str, content: &str) {
    fs::write(repo_root.join(filename), content).expect("Failed to write file");
    Command::new("git")
        .args(["add", filename])
        .current_dir(repo_root)
        .output()
        .expect("Failed to git add");
    Command::new("git")
        .args(["commit", "-m", &format!("Add {filename}")])
        .current_dir(repo_root)
        .output()
        .expect("Failed to git commit");
}

pub fn git_stdout(args: &[&str], repo_root: &Path) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .output()
        .expect("git command");
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub fn current_branch(repo_root: &Path) -> String {
    git_stdout(&["rev-parse", "--abbrev-ref", "HEAD"], repo_root)
}

pub fn current_commit(repo_root: &Path) -> String {
    git_stdout(&["rev-parse", "HEAD"], repo_root)
}

pub fn branch_exists(name: &str, repo_root: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--verify", &format!("refs/heads/{name}")])
        .current_dir(repo_root)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn new_engine() -> Engine {
    init_tracing();
    Engine::new(Box::new(MemoryStore::new()))
}

/// Engine plus a workspace bound to `project_root`.
pub fn engine_with_workspace(project_root: PathBuf) -> (Engine, Workspace) {
    let engine = new_engine();
    let workspace = engine
        .init_workspace("test-ws", project_root, "finish the project", Vec::new())
        .expect("init workspace");
    (engine, workspace)
}
