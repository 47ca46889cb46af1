//! Context composition through the engine facade.

use std::path::PathBuf;

use tanmi::context::ContextOptions;
use tanmi::models::node::NodeType;
use tanmi::models::Action;

use super::helpers::engine_with_workspace;

#[test]
fn isolate_flag_cuts_inherited_lineage() {
    let (engine, ws) = engine_with_workspace(PathBuf::from("/tmp/not-a-repo"));
    let a = engine
        .create_node(&ws.id, &ws.root_node_id, NodeType::Planning, "a", "", Vec::new())
        .unwrap();
    let b = engine
        .create_node(&ws.id, &a.id, NodeType::Planning, "b", "", Vec::new())
        .unwrap();
    let c = engine
        .create_node(&ws.id, &b.id, NodeType::Execution, "c", "", Vec::new())
        .unwrap();
    engine.set_isolate(&ws.id, &b.id, true).unwrap();

    let view = engine
        .context(&ws.id, &c.id, ContextOptions::default())
        .unwrap();
    let ids: Vec<&str> = view.chain.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec![b.id.as_str(), c.id.as_str()]);

    // The isolate node itself inherits nothing from above.
    let view = engine
        .context(&ws.id, &b.id, ContextOptions::default())
        .unwrap();
    let ids: Vec<&str> = view.chain.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec![b.id.as_str()]);
}

#[test]
fn log_truncation_keeps_recent_tail() {
    let (engine, ws) = engine_with_workspace(PathBuf::from("/tmp/not-a-repo"));
    let node = engine
        .create_node(&ws.id, &ws.root_node_id, NodeType::Execution, "task", "", Vec::new())
        .unwrap();
    // Creation already logged one line; add e1..e10 on top.
    for i in 1..=10 {
        engine.append_note(&ws.id, &node.id, &format!("e{i}")).unwrap();
    }

    let view = engine
        .context(
            &ws.id,
            &node.id,
            ContextOptions {
                max_log_entries: 3,
                newest_first: false,
            },
        )
        .unwrap();
    let messages: Vec<&str> = view
        .chain
        .last()
        .unwrap()
        .log
        .iter()
        .map(|e| e.message.as_str())
        .collect();
    assert_eq!(messages, vec!["e8", "e9", "e10"]);
}

#[test]
fn memo_and_node_references_attach_to_context() {
    let (engine, ws) = engine_with_workspace(PathBuf::from("/tmp/not-a-repo"));
    let target = engine
        .create_node(&ws.id, &ws.root_node_id, NodeType::Execution, "target", "background", Vec::new())
        .unwrap();
    let focal = engine
        .create_node(&ws.id, &ws.root_node_id, NodeType::Execution, "focal", "", Vec::new())
        .unwrap();
    let memo = engine
        .create_memo("conventions", "project conventions", vec!["style".into()], "Use snake_case.")
        .unwrap();

    engine.add_reference(&ws.id, &focal.id, &target.id).unwrap();
    engine
        .add_reference(&ws.id, &focal.id, &format!("memo://{}", memo.id))
        .unwrap();

    let view = engine
        .context(&ws.id, &focal.id, ContextOptions::default())
        .unwrap();
    assert_eq!(view.references.len(), 1);
    assert_eq!(view.references[0].id, target.id);
    assert_eq!(view.references[0].requirement, "background");
    assert_eq!(view.memos.len(), 1);
    assert_eq!(view.memos[0].content, "Use snake_case.");

    // Deleting the memo leaves a dangling reference that composition skips.
    engine.delete_memo(&memo.id).unwrap();
    let view = engine
        .context(&ws.id, &focal.id, ContextOptions::default())
        .unwrap();
    assert!(view.memos.is_empty());
    assert_eq!(view.references.len(), 1);
}

#[test]
fn terminal_children_roll_up_conclusions() {
    let (engine, ws) = engine_with_workspace(PathBuf::from("/tmp/not-a-repo"));
    let phase = engine
        .create_node(&ws.id, &ws.root_node_id, NodeType::Planning, "phase", "", Vec::new())
        .unwrap();
    let done = engine
        .create_node(&ws.id, &phase.id, NodeType::Execution, "done task", "", Vec::new())
        .unwrap();
    let open = engine
        .create_node(&ws.id, &phase.id, NodeType::Execution, "open task", "", Vec::new())
        .unwrap();

    engine.transition(&ws.id, &done.id, Action::Start, None, None).unwrap();
    engine
        .transition(&ws.id, &done.id, Action::Complete, None, Some("it works"))
        .unwrap();

    let view = engine
        .context(&ws.id, &phase.id, ContextOptions::default())
        .unwrap();
    assert_eq!(view.child_conclusions.len(), 1);
    assert_eq!(view.child_conclusions[0].id, done.id);
    assert_eq!(view.child_conclusions[0].title, "done task");
    assert_eq!(view.child_conclusions[0].conclusion, "it works");
    assert!(view.child_conclusions.iter().all(|c| c.id != open.id));
}

#[test]
fn problem_note_surfaces_until_resolution() {
    let (engine, ws) = engine_with_workspace(PathBuf::from("/tmp/not-a-repo"));
    let node = engine
        .create_node(&ws.id, &ws.root_node_id, NodeType::Execution, "task", "", Vec::new())
        .unwrap();
    engine.transition(&ws.id, &node.id, Action::Start, None, None).unwrap();
    engine.set_problem(&ws.id, &node.id, "blocked on CI").unwrap();

    let view = engine.context(&ws.id, &node.id, ContextOptions::default()).unwrap();
    assert_eq!(
        view.chain.last().unwrap().problem.as_deref(),
        Some("blocked on CI")
    );

    engine
        .transition(&ws.id, &node.id, Action::Complete, None, Some("unblocked and done"))
        .unwrap();
    let view = engine.context(&ws.id, &node.id, ContextOptions::default()).unwrap();
    assert!(view.chain.last().unwrap().problem.is_none());
}
