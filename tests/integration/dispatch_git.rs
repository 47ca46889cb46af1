//! Git-mode dispatch against real repositories.

use std::fs;
use std::path::PathBuf;

use serial_test::serial;

use tanmi::dispatch::process_branch_name;
use tanmi::models::node::NodeType;
use tanmi::models::Action;

use super::helpers::{
    branch_exists, commit_file, current_branch, current_commit, engine_with_workspace,
    git_stdout, init_test_repo, new_engine,
};

#[test]
#[serial]
fn enable_parks_dirty_tree_on_backup_branch() {
    let repo = init_test_repo();
    let root = repo.path().to_path_buf();
    fs::write(root.join("README.md"), "# Dirty edit\n").unwrap();

    let (engine, ws) = engine_with_workspace(root.clone());
    let report = engine.enable_dispatch(&ws.id, true, None).unwrap();

    let backup = report.backup_branch.expect("dirty tree parked");
    assert!(branch_exists(&backup, &root));
    assert!(branch_exists(&process_branch_name(&ws.id), &root));

    // The edit survives on the backup branch.
    let parked = git_stdout(&["show", &format!("{backup}:README.md")], &root);
    assert_eq!(parked, "# Dirty edit");

    // Back on the original branch with the dirty edit gone.
    assert_eq!(current_branch(&root), "main");
    assert_eq!(
        fs::read_to_string(root.join("README.md")).unwrap(),
        "# Test Repository\n"
    );
}

#[test]
#[serial]
fn git_mode_is_exclusive_per_project_root() {
    let repo = init_test_repo();
    let root = repo.path().to_path_buf();

    let engine = new_engine();
    let first = engine
        .init_workspace("first", root.clone(), "goal", Vec::new())
        .unwrap();
    let second = engine
        .init_workspace("second", root.clone(), "goal", Vec::new())
        .unwrap();

    engine.enable_dispatch(&first.id, true, None).unwrap();
    let err = engine.enable_dispatch(&second.id, true, None).unwrap_err();
    assert_eq!(err.code(), "DISPATCH_CONFLICT");

    // No-git mode never contends for the branch pointer.
    engine.enable_dispatch(&second.id, false, None).unwrap();
}

#[test]
#[serial]
fn enable_without_repo_is_rejected() {
    let (engine, ws) = engine_with_workspace(PathBuf::from("/tmp/definitely-not-a-repo"));
    let err = engine.enable_dispatch(&ws.id, true, None).unwrap_err();
    assert_eq!(err.code(), "GIT_NOT_FOUND");
}

#[test]
#[serial]
fn failed_verification_resets_to_start_marker() {
    let repo = init_test_repo();
    let root = repo.path().to_path_buf();

    let (engine, ws) = engine_with_workspace(root.clone());
    let node = engine
        .create_node(&ws.id, &ws.root_node_id, NodeType::Execution, "task", "req", Vec::new())
        .unwrap();
    engine.enable_dispatch(&ws.id, true, None).unwrap();
    engine.transition(&ws.id, &node.id, Action::Start, None, None).unwrap();

    engine.prepare_dispatch(&ws.id, &node.id).unwrap();
    assert_eq!(current_branch(&root), process_branch_name(&ws.id));
    let marker = current_commit(&root);

    commit_file(&root, "scratch.txt", "work in progress\n");
    assert_ne!(current_commit(&root), marker);

    let report = engine
        .handle_test_result(&ws.id, &node.id, false, Some("tests red"))
        .unwrap();
    assert_eq!(report.reset_to.as_deref(), Some(marker.as_str()));
    assert_eq!(current_commit(&root), marker);
    assert!(!root.join("scratch.txt").exists());
}

#[test]
#[serial]
fn disable_with_merge_lands_dispatch_commits() {
    let repo = init_test_repo();
    let root = repo.path().to_path_buf();

    let (engine, ws) = engine_with_workspace(root.clone());
    let node = engine
        .create_node(&ws.id, &ws.root_node_id, NodeType::Execution, "task", "req", Vec::new())
        .unwrap();
    engine.enable_dispatch(&ws.id, true, None).unwrap();
    engine.transition(&ws.id, &node.id, Action::Start, None, None).unwrap();
    engine.prepare_dispatch(&ws.id, &node.id).unwrap();

    fs::write(root.join("feature.txt"), "done\n").unwrap();
    engine
        .complete_dispatch(&ws.id, &node.id, true, Some("feature built"))
        .unwrap();

    let report = engine.disable_dispatch(&ws.id, true).unwrap();
    assert!(report.merged);
    assert_eq!(current_branch(&root), "main");
    assert!(root.join("feature.txt").exists());
    assert!(!branch_exists(&process_branch_name(&ws.id), &root));
    assert!(engine.workspace(&ws.id).unwrap().dispatch.is_none());
}

#[test]
#[serial]
fn disable_without_merge_leaves_work_behind() {
    let repo = init_test_repo();
    let root = repo.path().to_path_buf();

    let (engine, ws) = engine_with_workspace(root.clone());
    let node = engine
        .create_node(&ws.id, &ws.root_node_id, NodeType::Execution, "task", "req", Vec::new())
        .unwrap();
    engine.enable_dispatch(&ws.id, true, None).unwrap();
    engine.transition(&ws.id, &node.id, Action::Start, None, None).unwrap();
    engine.prepare_dispatch(&ws.id, &node.id).unwrap();

    fs::write(root.join("feature.txt"), "done\n").unwrap();
    engine
        .complete_dispatch(&ws.id, &node.id, true, None)
        .unwrap();

    let report = engine.disable_dispatch(&ws.id, false).unwrap();
    assert!(!report.merged);
    assert_eq!(current_branch(&root), "main");
    assert!(!root.join("feature.txt").exists());
}

#[test]
#[serial]
fn verdict_on_resolved_node_commits_nothing() {
    let repo = init_test_repo();
    let root = repo.path().to_path_buf();

    let (engine, ws) = engine_with_workspace(root.clone());
    let node = engine
        .create_node(&ws.id, &ws.root_node_id, NodeType::Execution, "task", "req", Vec::new())
        .unwrap();
    engine.enable_dispatch(&ws.id, true, None).unwrap();
    engine.transition(&ws.id, &node.id, Action::Start, None, None).unwrap();
    engine.prepare_dispatch(&ws.id, &node.id).unwrap();
    let marker = current_commit(&root);

    // The node gets resolved by hand while the dispatch is still in flight.
    engine
        .transition(&ws.id, &node.id, Action::Complete, None, Some("done by hand"))
        .unwrap();

    fs::write(root.join("stray.txt"), "leftover\n").unwrap();
    let err = engine
        .complete_dispatch(&ws.id, &node.id, true, None)
        .unwrap_err();
    assert_eq!(err.code(), "NODE_NOT_DISPATCHABLE");
    assert_eq!(current_commit(&root), marker);
}

#[test]
#[serial]
fn disable_refuses_while_a_dispatch_executes() {
    let repo = init_test_repo();
    let root = repo.path().to_path_buf();

    let (engine, ws) = engine_with_workspace(root.clone());
    let node = engine
        .create_node(&ws.id, &ws.root_node_id, NodeType::Execution, "task", "req", Vec::new())
        .unwrap();
    engine.enable_dispatch(&ws.id, true, None).unwrap();
    engine.transition(&ws.id, &node.id, Action::Start, None, None).unwrap();
    engine.prepare_dispatch(&ws.id, &node.id).unwrap();

    let query = engine.query_disable_dispatch(&ws.id).unwrap();
    assert!(!query.can_disable);
    assert_eq!(query.executing, vec![node.id.clone()]);

    let err = engine.disable_dispatch(&ws.id, false).unwrap_err();
    assert_eq!(err.code(), "DISPATCH_IN_PROGRESS");

    engine
        .complete_dispatch(&ws.id, &node.id, true, Some("released"))
        .unwrap();
    engine.disable_dispatch(&ws.id, false).unwrap();
}
