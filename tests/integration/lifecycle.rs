//! End-to-end lifecycle tests: creation cascades, transitions, focus.

use std::path::PathBuf;

use tanmi::models::node::{ExecutionStatus, NodeStatus, NodeType, PlanningStatus};
use tanmi::models::Action;

use super::helpers::engine_with_workspace;

/// The full happy path: init, decompose, execute, roll up.
#[test]
fn workspace_resolves_bottom_up() {
    let (engine, ws) = engine_with_workspace(PathBuf::from("/tmp/not-a-repo"));
    let root = ws.root_node_id.clone();

    // First child promotes the pending root to monitoring.
    let phase = engine
        .create_node(&ws.id, &root, NodeType::Planning, "phase 1", "do the phase", Vec::new())
        .unwrap();
    assert_eq!(
        engine.node(&ws.id, &root).unwrap().status,
        NodeStatus::Planning(PlanningStatus::Monitoring)
    );

    let task = engine
        .create_node(&ws.id, &phase.id, NodeType::Execution, "task 1", "do the task", Vec::new())
        .unwrap();
    assert_eq!(
        engine.node(&ws.id, &phase.id).unwrap().status,
        NodeStatus::Planning(PlanningStatus::Monitoring)
    );

    // Starting the leaf focuses it.
    let outcome = engine
        .transition(&ws.id, &task.id, Action::Start, Some("kick off"), None)
        .unwrap();
    assert_eq!(outcome.current, NodeStatus::Execution(ExecutionStatus::Implementing));
    assert_eq!(engine.current_focus(&ws.id).unwrap(), task.id);

    // Completing without a conclusion is rejected before any mutation.
    let err = engine
        .transition(&ws.id, &task.id, Action::Complete, None, None)
        .unwrap_err();
    assert_eq!(err.code(), "CONCLUSION_REQUIRED");
    assert_eq!(
        engine.node(&ws.id, &task.id).unwrap().status,
        NodeStatus::Execution(ExecutionStatus::Implementing)
    );

    let outcome = engine
        .transition(&ws.id, &task.id, Action::Complete, None, Some("done"))
        .unwrap();
    assert!(outcome.hint.unwrap().contains("consider completing the parent"));

    // Parent still monitoring, now completable.
    assert_eq!(
        engine.node(&ws.id, &phase.id).unwrap().status,
        NodeStatus::Planning(PlanningStatus::Monitoring)
    );
    engine
        .transition(&ws.id, &phase.id, Action::Complete, None, Some("phase done"))
        .unwrap();

    engine
        .transition(&ws.id, &root, Action::Complete, None, Some("all done"))
        .unwrap();
    assert_eq!(
        engine.node(&ws.id, &root).unwrap().status,
        NodeStatus::Planning(PlanningStatus::Completed)
    );
}

#[test]
fn planning_complete_blocks_on_outstanding_children() {
    let (engine, ws) = engine_with_workspace(PathBuf::from("/tmp/not-a-repo"));
    let phase = engine
        .create_node(&ws.id, &ws.root_node_id, NodeType::Planning, "phase", "", Vec::new())
        .unwrap();
    let task = engine
        .create_node(&ws.id, &phase.id, NodeType::Execution, "task", "", Vec::new())
        .unwrap();
    engine
        .transition(&ws.id, &task.id, Action::Start, None, None)
        .unwrap();

    let err = engine
        .transition(&ws.id, &phase.id, Action::Complete, None, Some("done"))
        .unwrap_err();
    assert_eq!(err.code(), "INCOMPLETE_CHILDREN");
}

#[test]
fn reopen_reactivates_chain_and_refocuses() {
    let (engine, ws) = engine_with_workspace(PathBuf::from("/tmp/not-a-repo"));
    let phase = engine
        .create_node(&ws.id, &ws.root_node_id, NodeType::Planning, "phase", "", Vec::new())
        .unwrap();
    let task = engine
        .create_node(&ws.id, &phase.id, NodeType::Execution, "task", "", Vec::new())
        .unwrap();

    engine.transition(&ws.id, &task.id, Action::Start, None, None).unwrap();
    engine
        .transition(&ws.id, &task.id, Action::Complete, None, Some("done"))
        .unwrap();
    engine
        .transition(&ws.id, &phase.id, Action::Complete, None, Some("phase done"))
        .unwrap();
    engine.focus(&ws.id, &ws.root_node_id).unwrap();

    let outcome = engine
        .transition(&ws.id, &task.id, Action::Reopen, Some("regression found"), None)
        .unwrap();
    assert_eq!(outcome.cascaded, vec![phase.id.clone()]);
    assert_eq!(
        engine.node(&ws.id, &phase.id).unwrap().status,
        NodeStatus::Planning(PlanningStatus::Monitoring)
    );
    assert_eq!(engine.current_focus(&ws.id).unwrap(), task.id);
}

#[test]
fn invalid_transition_suggests_remediation() {
    let (engine, ws) = engine_with_workspace(PathBuf::from("/tmp/not-a-repo"));
    let task = engine
        .create_node(&ws.id, &ws.root_node_id, NodeType::Execution, "task", "", Vec::new())
        .unwrap();

    let err = engine
        .transition(&ws.id, &task.id, Action::Complete, None, Some("early"))
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_TRANSITION");
    assert!(err.to_string().contains("Start the node first"));
}

#[test]
fn workspace_lock_serializes_interleaved_mutations() {
    let (engine, ws) = engine_with_workspace(PathBuf::from("/tmp/not-a-repo"));
    let engine = std::sync::Arc::new(engine);

    let mut handles = Vec::new();
    for t in 0..4 {
        let engine = std::sync::Arc::clone(&engine);
        let ws_id = ws.id.clone();
        let root = ws.root_node_id.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..10 {
                let node = engine
                    .create_node(
                        &ws_id,
                        &root,
                        NodeType::Execution,
                        &format!("task {t}-{i}"),
                        "",
                        Vec::new(),
                    )
                    .unwrap();
                engine
                    .transition(&ws_id, &node.id, Action::Start, None, None)
                    .unwrap();
                engine
                    .transition(&ws_id, &node.id, Action::Complete, None, Some("done"))
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // No lost updates: every created node survived, every transition stuck.
    let rows = engine.workspace_tree(&ws.id).unwrap();
    assert_eq!(rows.len(), 41);
    assert!(rows
        .iter()
        .skip(1)
        .all(|r| r.status == NodeStatus::Execution(ExecutionStatus::Completed)));
}

#[test]
fn delete_resets_focus_into_deleted_subtree() {
    let (engine, ws) = engine_with_workspace(PathBuf::from("/tmp/not-a-repo"));
    let phase = engine
        .create_node(&ws.id, &ws.root_node_id, NodeType::Planning, "phase", "", Vec::new())
        .unwrap();
    let task = engine
        .create_node(&ws.id, &phase.id, NodeType::Execution, "task", "", Vec::new())
        .unwrap();
    engine.transition(&ws.id, &task.id, Action::Start, None, None).unwrap();
    assert_eq!(engine.current_focus(&ws.id).unwrap(), task.id);

    let removed = engine.delete_node(&ws.id, &phase.id).unwrap();
    assert_eq!(removed.len(), 2);
    assert_eq!(engine.current_focus(&ws.id).unwrap(), ws.root_node_id);
}
