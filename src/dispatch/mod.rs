//! Dispatch orchestration: handing an execution node to an external worker
//! agent under a rollback-capable isolation boundary.
//!
//! Two modes, selected per workspace at enable time:
//! - **git mode**: exclusive per project root; work happens on a dedicated
//!   process branch, dirty state is parked on a backup branch, and
//!   `start_marker` is a commit hash usable for hard rollback.
//! - **no-git mode**: never exclusive; markers are timestamps and rollback is
//!   a no-op beyond bookkeeping.
//!
//! The orchestrator never invokes the worker itself: `prepare` returns an
//! [`ActionRequired`] payload and the caller runs the agent.

pub mod prompt;

use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::git;
use crate::models::node::{
    DispatchStatus, ExecutionStatus, NodeDispatchState, NodeStatus, NodeType, PlanningStatus,
};
use crate::models::{Action, DispatchConfig, DispatchLimits, Graph, Workspace};
use crate::state::{self, TransitionOutcome};

pub use prompt::render_prompt;

pub const PROCESS_BRANCH_PREFIX: &str = "tanmi-process";
pub const BACKUP_BRANCH_PREFIX: &str = "tanmi-backup";

pub fn process_branch_name(workspace_id: &str) -> String {
    format!("{PROCESS_BRANCH_PREFIX}/{workspace_id}")
}

pub fn backup_branch_name(workspace_id: &str, n: usize) -> String {
    format!("{BACKUP_BRANCH_PREFIX}/{workspace_id}/{n}")
}

/// Result of enabling dispatch.
#[derive(Debug, Clone)]
pub struct EnableReport {
    pub use_git: bool,
    pub original_branch: Option<String>,
    pub process_branch: Option<String>,
    /// Set when uncommitted changes were parked on a backup branch.
    pub backup_branch: Option<String>,
}

/// Opaque hand-off payload returned to the orchestrating caller; executing
/// the worker agent is its responsibility, not ours.
#[derive(Debug, Clone, Serialize)]
pub struct ActionRequired {
    pub action: &'static str,
    pub message: String,
    pub data: HandOff,
}

#[derive(Debug, Clone, Serialize)]
pub struct HandOff {
    pub node_id: String,
    pub prompt: String,
    /// Advisory only; no timer in the engine enforces it.
    pub timeout_ms: u64,
}

/// Marker state captured by `prepare`; the engine wraps this into an
/// [`ActionRequired`] once the prompt is rendered.
#[derive(Debug, Clone)]
pub struct PreparedDispatch {
    pub start_marker: String,
    pub process_branch: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct CompleteReport {
    pub outcome: TransitionOutcome,
    pub end_marker: Option<String>,
    /// Set when this was the last unresolved child of a monitoring parent.
    pub reminder: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TestReport {
    pub passed: bool,
    /// Commit the working tree was hard-reset to, on a failed verification in
    /// git mode.
    pub reset_to: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DisableQuery {
    pub enabled: bool,
    pub use_git: bool,
    /// Nodes whose dispatch is still executing; non-empty blocks disable.
    pub executing: Vec<String>,
    pub can_disable: bool,
}

#[derive(Debug, Clone)]
pub struct DisableReport {
    pub merged: bool,
    pub deleted_branches: Vec<String>,
}

fn config(graph: &Graph) -> Result<&DispatchConfig> {
    graph
        .workspace
        .dispatch
        .as_ref()
        .filter(|c| c.enabled)
        .ok_or_else(|| EngineError::DispatchNotEnabled(graph.workspace.id.clone()))
}

fn same_project_root(a: &Path, b: &Path) -> bool {
    let canon = |p: &Path| p.canonicalize().unwrap_or_else(|_| p.to_path_buf());
    canon(a) == canon(b)
}

/// Enable dispatch for the workspace.
///
/// Git mode claims the project root exclusively across workspaces: `others`
/// is the full workspace list to check against. A dirty working tree is
/// committed onto a fresh backup branch before the process branch is created,
/// so nothing uncommitted is ever lost. Enabling twice is a no-op returning
/// the recorded configuration.
pub fn enable(
    graph: &mut Graph,
    others: &[Workspace],
    use_git: bool,
    limits: DispatchLimits,
) -> Result<EnableReport> {
    if let Some(existing) = &graph.workspace.dispatch {
        return Ok(EnableReport {
            use_git: existing.use_git,
            original_branch: existing.original_branch.clone(),
            process_branch: existing.process_branch.clone(),
            backup_branch: None,
        });
    }

    let workspace_id = graph.workspace.id.clone();
    let repo_root = graph.workspace.project_root.clone();

    let mut original_branch = None;
    let mut process_branch = None;
    let mut backup_branch = None;
    let mut backup_branches = Vec::new();

    if use_git {
        if !git::is_repo(&repo_root) {
            return Err(EngineError::GitNotFound(repo_root.display().to_string()));
        }
        // One git-mode workspace per project root; no-git workspaces never
        // contend because they leave the branch pointer alone.
        for other in others {
            if other.id != workspace_id
                && other.git_dispatch_active()
                && same_project_root(&other.project_root, &repo_root)
            {
                return Err(EngineError::DispatchConflict {
                    other: other.id.clone(),
                });
            }
        }

        let original = git::current_branch(&repo_root).map_err(EngineError::git)?;
        if git::is_dirty(&repo_root).map_err(EngineError::git)? {
            // Pick the first free suffix; stale backups from an interrupted
            // disable may still exist.
            let mut n = 0;
            while git::branch_exists(&backup_branch_name(&workspace_id, n), &repo_root) {
                n += 1;
            }
            let backup = backup_branch_name(&workspace_id, n);
            git::checkout_new(&backup, &repo_root).map_err(EngineError::git)?;
            git::commit_all("tanmi: backup uncommitted changes", &repo_root)
                .map_err(EngineError::git)?;
            git::checkout(&original, &repo_root).map_err(EngineError::git)?;
            debug!(branch = %backup, "dirty tree parked on backup branch");
            backup_branches.push(backup.clone());
            backup_branch = Some(backup);
        }

        let process = process_branch_name(&workspace_id);
        if !git::branch_exists(&process, &repo_root) {
            git::create_branch(&process, Some(&original), &repo_root).map_err(EngineError::git)?;
        }
        original_branch = Some(original);
        process_branch = Some(process);
    }

    graph.workspace.dispatch = Some(DispatchConfig {
        enabled: true,
        use_git,
        original_branch: original_branch.clone(),
        process_branch: process_branch.clone(),
        backup_branches,
        enabled_at: Utc::now(),
        limits,
    });
    graph.workspace.updated_at = Utc::now();

    debug!(workspace = %workspace_id, use_git, "dispatch enabled");
    Ok(EnableReport {
        use_git,
        original_branch,
        process_branch,
        backup_branch,
    })
}

/// Capture the rollback marker and mark the node as executing.
///
/// Requires dispatch enabled, an execution node, and `implementing` status.
/// In git mode the working tree is moved onto the process branch first so the
/// marker is a commit on that branch.
pub fn prepare(graph: &mut Graph, node_id: &str) -> Result<PreparedDispatch> {
    let cfg = config(graph)?;
    let use_git = cfg.use_git;
    let timeout_ms = cfg.limits.timeout_ms;
    let process_branch = cfg.process_branch.clone();
    let repo_root = graph.workspace.project_root.clone();

    let node = graph.node(node_id)?;
    if node.node_type != NodeType::Execution {
        return Err(EngineError::NodeNotDispatchable {
            node: node_id.to_string(),
            reason: "only execution nodes can be dispatched".to_string(),
        });
    }
    if node.status != NodeStatus::Execution(ExecutionStatus::Implementing) {
        return Err(EngineError::NodeNotDispatchable {
            node: node_id.to_string(),
            reason: format!(
                "node must be 'implementing' (currently '{}'); start it first",
                node.status
            ),
        });
    }

    let start_marker = if use_git {
        let process = process_branch
            .as_deref()
            .expect("git mode records a process branch");
        let current = git::current_branch(&repo_root).map_err(EngineError::git)?;
        if current != process {
            git::checkout(process, &repo_root).map_err(EngineError::git)?;
        }
        git::current_commit(&repo_root).map_err(EngineError::git)?
    } else {
        Utc::now().to_rfc3339()
    };

    let node = graph.node_mut(node_id)?;
    node.dispatch = Some(NodeDispatchState {
        start_marker: start_marker.clone(),
        end_marker: None,
        status: DispatchStatus::Executing,
    });
    node.touch();

    debug!(node = %node_id, marker = %start_marker, "dispatch prepared");
    Ok(PreparedDispatch {
        start_marker,
        process_branch,
        timeout_ms,
    })
}

/// Record the worker agent's own verdict.
///
/// Success commits the working tree (git mode) and completes the node;
/// failure marks it failed with no rollback (the agent reported failure
/// before anything was committed). The dispatch record is retained either way
/// as an audit trail.
pub fn complete(
    graph: &mut Graph,
    node_id: &str,
    success: bool,
    conclusion: Option<&str>,
) -> Result<CompleteReport> {
    let cfg = config(graph)?;
    let use_git = cfg.use_git;
    let repo_root = graph.workspace.project_root.clone();

    let node = graph.node(node_id)?;
    let in_flight = node
        .dispatch
        .as_ref()
        .map(|d| matches!(d.status, DispatchStatus::Executing | DispatchStatus::Testing))
        .unwrap_or(false);
    if !in_flight {
        return Err(EngineError::NodeNotDispatchable {
            node: node_id.to_string(),
            reason: "no dispatch in flight for this node".to_string(),
        });
    }

    let (action, fallback, dispatch_status) = if success {
        (Action::Complete, "dispatch completed", DispatchStatus::Passed)
    } else {
        (Action::Fail, "dispatch reported failure", DispatchStatus::Failed)
    };
    // The lifecycle transition must be applicable before anything is
    // committed; a node resolved out-of-band while its dispatch record was
    // still in flight must not pick up a stray commit here.
    if let NodeStatus::Execution(current) = node.status {
        if current.apply(action).is_none() {
            return Err(EngineError::NodeNotDispatchable {
                node: node_id.to_string(),
                reason: format!("node is '{}' and cannot accept a '{action}' verdict", node.status),
            });
        }
    }
    let conclusion = conclusion
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(fallback);

    let end_marker = if success {
        let marker = if use_git {
            git::commit_all(
                &format!("tanmi: complete dispatch for {node_id}"),
                &repo_root,
            )
            .map_err(EngineError::git)?
        } else {
            Utc::now().to_rfc3339()
        };
        Some(marker)
    } else {
        None
    };

    let outcome = state::transition(graph, node_id, action, Some(conclusion))?;

    let node = graph.node_mut(node_id)?;
    if let Some(dispatch) = node.dispatch.as_mut() {
        dispatch.status = dispatch_status;
        dispatch.end_marker = end_marker.clone();
    }

    let reminder = monitoring_parent_reminder(graph, node_id);
    debug!(node = %node_id, success, "dispatch completed");
    Ok(CompleteReport {
        outcome,
        end_marker,
        reminder,
    })
}

/// Apply a paired verification verdict.
///
/// On failure this is the system's only rollback: the working tree is
/// hard-reset to the node's `start_marker`, discarding every commit the
/// dispatch made. Node lifecycle status is left to the caller's next
/// transition; only the dispatch record changes here.
pub fn handle_test_result(
    graph: &mut Graph,
    node_id: &str,
    passed: bool,
) -> Result<TestReport> {
    let cfg = config(graph)?;
    let use_git = cfg.use_git;
    let repo_root = graph.workspace.project_root.clone();

    let node = graph.node(node_id)?;
    let start_marker = node
        .dispatch
        .as_ref()
        .map(|d| d.start_marker.clone())
        .ok_or_else(|| EngineError::NodeNotDispatchable {
            node: node_id.to_string(),
            reason: "node has never been dispatched".to_string(),
        })?;

    let mut reset_to = None;
    if passed {
        let node = graph.node_mut(node_id)?;
        let dispatch = node.dispatch.as_mut().expect("checked above");
        dispatch.status = DispatchStatus::Passed;
        if dispatch.end_marker.is_none() {
            dispatch.end_marker = if use_git {
                Some(git::current_commit(&repo_root).map_err(EngineError::git)?)
            } else {
                Some(Utc::now().to_rfc3339())
            };
        }
    } else {
        if use_git {
            git::reset_hard(&start_marker, &repo_root).map_err(EngineError::git)?;
            reset_to = Some(start_marker.clone());
            warn!(node = %node_id, marker = %start_marker, "verification failed; working tree reset");
        }
        let node = graph.node_mut(node_id)?;
        let dispatch = node.dispatch.as_mut().expect("checked above");
        dispatch.status = DispatchStatus::Failed;
        dispatch.end_marker = None;
    }
    graph.node_mut(node_id)?.touch();

    Ok(TestReport { passed, reset_to })
}

/// Report whether dispatch can be disabled right now.
pub fn query_disable(graph: &Graph) -> DisableQuery {
    let Some(cfg) = graph.workspace.dispatch.as_ref().filter(|c| c.enabled) else {
        return DisableQuery {
            enabled: false,
            use_git: false,
            executing: Vec::new(),
            can_disable: false,
        };
    };
    let executing = executing_nodes(graph);
    DisableQuery {
        enabled: true,
        use_git: cfg.use_git,
        can_disable: executing.is_empty(),
        executing,
    }
}

/// Tear down dispatch.
///
/// Rejected while any node is still executing. With `merge=true` the process
/// branch is merged into the original branch first; otherwise the original
/// branch is simply checked out and process-branch commits stay unmerged.
/// All workspace branches are then deleted best-effort and the config is
/// removed entirely.
pub fn disable(graph: &mut Graph, merge: bool) -> Result<DisableReport> {
    let cfg = config(graph)?.clone();

    let executing = executing_nodes(graph);
    if !executing.is_empty() {
        return Err(EngineError::DispatchInProgress(executing.join(", ")));
    }

    let repo_root = graph.workspace.project_root.clone();
    let mut merged = false;
    let mut deleted_branches = Vec::new();

    if cfg.use_git {
        let original = cfg
            .original_branch
            .as_deref()
            .expect("git mode records the original branch");
        let process = cfg
            .process_branch
            .as_deref()
            .expect("git mode records the process branch");

        if merge {
            git::merge(process, original, &repo_root).map_err(EngineError::git)?;
            merged = true;
        } else {
            git::checkout(original, &repo_root).map_err(EngineError::git)?;
        }

        // Cleanup is best-effort: a stale branch must never block disable.
        let mut doomed = vec![process.to_string()];
        doomed.extend(cfg.backup_branches.iter().cloned());
        for branch in doomed {
            match git::delete_branch(&branch, true, &repo_root) {
                Ok(()) => deleted_branches.push(branch),
                Err(err) => warn!(%branch, %err, "failed to delete dispatch branch"),
            }
        }
    }

    graph.workspace.dispatch = None;
    graph.workspace.updated_at = Utc::now();
    debug!(workspace = %graph.workspace.id, merged, "dispatch disabled");
    Ok(DisableReport {
        merged,
        deleted_branches,
    })
}

fn executing_nodes(graph: &Graph) -> Vec<String> {
    graph
        .nodes
        .values()
        .filter(|n| {
            n.dispatch
                .as_ref()
                .map(|d| d.status == DispatchStatus::Executing)
                .unwrap_or(false)
        })
        .map(|n| n.id.clone())
        .collect()
}

/// If the resolved node was the last unresolved child of a monitoring
/// planning parent, nudge the caller to wrap that parent up.
fn monitoring_parent_reminder(graph: &Graph, node_id: &str) -> Option<String> {
    let node = graph.nodes.get(node_id)?;
    let parent_id = node.parent_id.as_ref()?;
    let parent = graph.nodes.get(parent_id)?;
    if parent.status != NodeStatus::Planning(PlanningStatus::Monitoring) {
        return None;
    }
    let unresolved = parent
        .children
        .iter()
        .filter_map(|c| graph.nodes.get(c))
        .filter(|c| !c.status.is_terminal())
        .count();
    if unresolved == 0 {
        Some(format!(
            "All children of '{parent_id}' are resolved; consider completing it and disabling dispatch."
        ))
    } else {
        None
    }
}
