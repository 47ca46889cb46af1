//! Tree mutations: create, move, delete.
//!
//! Invariants enforced here:
//! - every non-root node has exactly one parent, reachable to the root
//! - only planning nodes have children; execution nodes stay leaves
//! - deleting a node removes its whole subtree, scrubs dangling references
//!   and never leaves `current_focus` pointing into the deleted set

use tracing::debug;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::models::node::{NodeMeta, NodeRef, NodeStatus, NodeType, PlanningStatus};
use crate::models::Graph;

const MAX_TITLE_LEN: usize = 200;

fn validate_title(title: &str) -> Result<()> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidTitle("title must not be empty".into()));
    }
    if trimmed.len() > MAX_TITLE_LEN {
        return Err(EngineError::InvalidTitle(format!(
            "title exceeds {MAX_TITLE_LEN} characters"
        )));
    }
    if trimmed.contains('\n') {
        return Err(EngineError::InvalidTitle(
            "title must be a single line".into(),
        ));
    }
    Ok(())
}

/// Result of a node creation: the new node's id plus whether the parent was
/// promoted to `monitoring` as a side effect.
#[derive(Debug, Clone)]
pub struct CreatedNode {
    pub id: String,
    pub parent_promoted: bool,
}

/// Create a node under `parent_id`.
///
/// The parent must be a planning node in `pending`, `planning` or
/// `monitoring` status; terminal parents reject new children. If this is the
/// parent's first child while `pending`/`planning`, the parent is promoted to
/// `monitoring` eagerly, matching the cascade the first `start` would produce.
pub fn create_node(
    graph: &mut Graph,
    parent_id: &str,
    node_type: NodeType,
    title: &str,
) -> Result<CreatedNode> {
    validate_title(title)?;

    let parent = graph
        .nodes
        .get(parent_id)
        .ok_or_else(|| EngineError::ParentNotFound(parent_id.to_string()))?;

    if parent.node_type == NodeType::Execution {
        return Err(EngineError::ExecutionCannotHaveChildren(
            parent_id.to_string(),
        ));
    }
    let parent_status = match parent.status {
        NodeStatus::Planning(s) => s,
        NodeStatus::Execution(_) => unreachable!("planning parent checked above"),
    };
    if matches!(
        parent_status,
        PlanningStatus::Completed | PlanningStatus::Cancelled
    ) {
        return Err(EngineError::InvalidParentStatus {
            node: parent_id.to_string(),
            status: parent_status.to_string(),
        });
    }

    let first_child = parent.children.is_empty();
    let node = NodeMeta::new(
        Uuid::new_v4().to_string(),
        node_type,
        Some(parent_id.to_string()),
    );
    let id = node.id.clone();
    graph.nodes.insert(id.clone(), node);

    let parent = graph.node_mut(parent_id)?;
    parent.children.push(id.clone());
    parent.touch();

    let mut parent_promoted = false;
    if first_child
        && matches!(
            parent_status,
            PlanningStatus::Pending | PlanningStatus::Planning
        )
    {
        parent.status = NodeStatus::Planning(PlanningStatus::Monitoring);
        parent_promoted = true;
    }

    debug!(node = %id, parent = %parent_id, %node_type, parent_promoted, "node created");
    Ok(CreatedNode {
        id,
        parent_promoted,
    })
}

/// Reparent `node_id` under `new_parent_id`.
pub fn move_node(graph: &mut Graph, node_id: &str, new_parent_id: &str) -> Result<()> {
    let node = graph.node(node_id)?;
    let old_parent_id = match &node.parent_id {
        Some(p) => p.clone(),
        None => return Err(EngineError::CannotMoveRoot),
    };

    let new_parent = graph
        .nodes
        .get(new_parent_id)
        .ok_or_else(|| EngineError::ParentNotFound(new_parent_id.to_string()))?;
    if new_parent.node_type == NodeType::Execution {
        return Err(EngineError::ExecutionCannotHaveChildren(
            new_parent_id.to_string(),
        ));
    }
    // Cycle guard: the destination must not sit inside the moving subtree.
    if graph.is_in_subtree(node_id, new_parent_id) {
        return Err(EngineError::CycleDetected {
            node: node_id.to_string(),
            target: new_parent_id.to_string(),
        });
    }
    if old_parent_id == new_parent_id {
        return Ok(());
    }

    let old_parent = graph.node_mut(&old_parent_id)?;
    old_parent.children.retain(|c| c != node_id);
    old_parent.touch();

    let new_parent = graph.node_mut(new_parent_id)?;
    new_parent.children.push(node_id.to_string());
    new_parent.touch();

    let node = graph.node_mut(node_id)?;
    node.parent_id = Some(new_parent_id.to_string());
    node.touch();

    debug!(node = %node_id, from = %old_parent_id, to = %new_parent_id, "node moved");
    Ok(())
}

/// Delete `node_id` and its entire subtree.
///
/// Returns the removed ids so the caller can scrub per-node storage. Dangling
/// references to removed ids are stripped from every surviving node, and the
/// focus pointer falls back to the root if it pointed into the deleted set.
pub fn delete_node(graph: &mut Graph, node_id: &str) -> Result<Vec<String>> {
    let node = graph.node(node_id)?;
    let parent_id = match &node.parent_id {
        Some(p) => p.clone(),
        None => return Err(EngineError::CannotDeleteRoot),
    };

    let removed = graph.subtree_ids(node_id);
    for id in &removed {
        graph.nodes.remove(id);
    }

    let parent = graph.node_mut(&parent_id)?;
    parent.children.retain(|c| c != node_id);
    parent.touch();

    for node in graph.nodes.values_mut() {
        node.references.retain(|r| match r {
            NodeRef::Node(id) => !removed.contains(id),
            NodeRef::Memo(_) => true,
        });
    }

    if removed.contains(&graph.current_focus) {
        graph.current_focus = graph.workspace.root_node_id.clone();
    }

    debug!(node = %node_id, count = removed.len(), "subtree deleted");
    Ok(removed)
}
