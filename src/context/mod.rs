//! Context composition: the bounded slice of the tree an agent sees when it
//! resumes a node. Strictly read-only.
//!
//! The composed view carries the workspace header, the ancestor chain
//! (root-first, cut at the first isolate node, the focal node included in
//! that check), standalone entries for
//! cross-node references, best-effort memo attachments, rolled-up child
//! conclusions and a next-step hint.

use tracing::debug;

use crate::error::{EngineError, Result};
use crate::models::node::{ExecutionStatus, NodeRef, NodeStatus, NodeType};
use crate::models::{DocEntry, Graph, LogEntry, Memo, NodeDetail};
use crate::store::{NodeKey, Store};

#[derive(Debug, Clone, Copy)]
pub struct ContextOptions {
    /// Keep only the most recent N log entries per node; 0 keeps everything.
    pub max_log_entries: usize,
    /// Emit logs newest-first instead of chronological order.
    pub newest_first: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        ContextOptions {
            max_log_entries: 0,
            newest_first: false,
        }
    }
}

/// Workspace-level framing: goal, rules and active global docs. The goal and
/// global docs live on the root node's detail record.
#[derive(Debug, Clone)]
pub struct WorkspaceHeader {
    pub workspace_id: String,
    pub name: String,
    pub goal: String,
    pub rules: Vec<String>,
    pub docs: Vec<DocEntry>,
}

/// One node's contribution to a composed context.
#[derive(Debug, Clone)]
pub struct NodeContext {
    pub id: String,
    pub node_type: NodeType,
    pub status: NodeStatus,
    pub title: String,
    pub requirement: String,
    pub docs: Vec<DocEntry>,
    pub notes: Vec<String>,
    pub conclusion: Option<String>,
    pub problem: Option<String>,
    pub log: Vec<LogEntry>,
    pub isolate: bool,
}

#[derive(Debug, Clone)]
pub struct ChildConclusion {
    pub id: String,
    pub title: String,
    pub status: NodeStatus,
    pub conclusion: String,
}

#[derive(Debug, Clone)]
pub struct ContextView {
    pub header: WorkspaceHeader,
    /// Root-first ancestor chain ending at the focal node. Cut off (but
    /// inclusive) at the first isolate node; an isolate focal node stands
    /// alone.
    pub chain: Vec<NodeContext>,
    /// Standalone entries for node references on the focal node; single
    /// level, no nested chains.
    pub references: Vec<NodeContext>,
    /// Resolved memo attachments; unresolvable ids are skipped.
    pub memos: Vec<Memo>,
    /// Terminal direct children with a conclusion to roll up.
    pub child_conclusions: Vec<ChildConclusion>,
    pub hint: Option<String>,
}

/// Compose the context for `node_id`.
pub fn compose(
    graph: &Graph,
    store: &dyn Store,
    node_id: &str,
    options: ContextOptions,
) -> Result<ContextView> {
    let focal = graph.node(node_id)?;
    let workspace_id = graph.workspace.id.clone();

    let header = workspace_header(graph, store)?;

    let mut chain_ids = graph.ancestor_chain(node_id)?;
    chain_ids.reverse();
    let mut chain = Vec::with_capacity(chain_ids.len());
    for id in &chain_ids {
        chain.push(node_context(graph, store, id, options)?);
    }

    let mut references = Vec::new();
    let mut memos = Vec::new();
    for reference in &focal.references {
        match reference {
            NodeRef::Node(id) => {
                if graph.nodes.contains_key(id) {
                    references.push(node_context(graph, store, id, options)?);
                }
            }
            NodeRef::Memo(id) => {
                // Best-effort: stale memo references are dropped, not errors.
                match store.read_memo(id).map_err(EngineError::store)? {
                    Some(memo) => memos.push(memo),
                    None => debug!(memo = %id, "skipping unresolvable memo reference"),
                }
            }
        }
    }

    let mut child_conclusions = Vec::new();
    for child_id in &focal.children {
        let Some(child) = graph.nodes.get(child_id) else {
            continue;
        };
        if !child.status.is_terminal() {
            continue;
        }
        let Some(conclusion) = child.conclusion.as_ref().filter(|c| !c.is_empty()) else {
            continue;
        };
        let detail = read_detail(store, &workspace_id, child_id)?;
        child_conclusions.push(ChildConclusion {
            id: child_id.clone(),
            title: detail.title,
            status: child.status,
            conclusion: conclusion.clone(),
        });
    }

    let focal_context = chain.last().expect("chain includes the focal node");
    let hint = context_hint(focal_context);

    Ok(ContextView {
        header,
        chain,
        references,
        memos,
        child_conclusions,
        hint,
    })
}

fn workspace_header(graph: &Graph, store: &dyn Store) -> Result<WorkspaceHeader> {
    let root_detail = read_detail(store, &graph.workspace.id, graph.root_id())?;
    Ok(WorkspaceHeader {
        workspace_id: graph.workspace.id.clone(),
        name: graph.workspace.name.clone(),
        goal: root_detail.requirement.clone(),
        rules: graph.workspace.rules.clone(),
        docs: root_detail.docs.into_iter().filter(|d| d.is_active()).collect(),
    })
}

fn read_detail(store: &dyn Store, workspace_id: &str, node_id: &str) -> Result<NodeDetail> {
    let key = NodeKey::new(workspace_id, node_id);
    Ok(store
        .read_detail(&key)
        .map_err(EngineError::store)?
        .unwrap_or_default())
}

fn node_context(
    graph: &Graph,
    store: &dyn Store,
    node_id: &str,
    options: ContextOptions,
) -> Result<NodeContext> {
    let node = graph.node(node_id)?;
    let key = NodeKey::new(&graph.workspace.id, node_id);
    let detail = read_detail(store, &graph.workspace.id, node_id)?;
    let problem = store.read_problem(&key).map_err(EngineError::store)?;
    let log = store.read_log(&key).map_err(EngineError::store)?;
    let log = truncate_log(log, options.max_log_entries, options.newest_first);

    Ok(NodeContext {
        id: node.id.clone(),
        node_type: node.node_type,
        status: node.status,
        title: detail.title.clone(),
        requirement: detail.requirement.clone(),
        docs: detail.docs.into_iter().filter(|d| d.is_active()).collect(),
        notes: detail.notes,
        conclusion: node.conclusion.clone(),
        problem: problem.filter(|p| !p.trim().is_empty()),
        log,
        isolate: node.isolate,
    })
}

/// Tail-first truncation: recent activity matters more than early history, so
/// the oldest entries are discarded first.
fn truncate_log(mut entries: Vec<LogEntry>, max: usize, newest_first: bool) -> Vec<LogEntry> {
    if max > 0 && entries.len() > max {
        entries.drain(..entries.len() - max);
    }
    if newest_first {
        entries.reverse();
    }
    entries
}

/// Status-and-volume-driven suggestion for the focal node.
fn context_hint(focal: &NodeContext) -> Option<String> {
    match focal.status {
        NodeStatus::Execution(ExecutionStatus::Implementing) if focal.log.is_empty() => Some(
            "No findings recorded yet; log progress before submitting.".to_string(),
        ),
        NodeStatus::Execution(ExecutionStatus::Pending)
        | NodeStatus::Execution(ExecutionStatus::Implementing)
            if focal.docs.is_empty() =>
        {
            Some("This node has no active reference docs; it may be missing reference material.".to_string())
        }
        NodeStatus::Execution(ExecutionStatus::Validating) => {
            Some("Validation in progress; complete or fail the node with a conclusion.".to_string())
        }
        _ => None,
    }
}

/// Validate and swap the workspace focus pointer, returning the previous
/// value. A pure pointer update with no cascade side effects.
pub fn focus(graph: &mut Graph, node_id: &str) -> Result<String> {
    graph.node(node_id)?;
    let previous = std::mem::replace(&mut graph.current_focus, node_id.to_string());
    Ok(previous)
}
