//! Node lifecycle transitions and the monitoring cascade.
//!
//! The per-type transition tables are pure functions on the status enums
//! (`ExecutionStatus::apply` / `PlanningStatus::apply`); this module wraps
//! them with the gates a transition must pass, applies the result to the
//! graph, and keeps planning ancestors truthful about descendant activity.

use tracing::debug;

use crate::error::{EngineError, Result};
use crate::models::node::{Action, NodeStatus, NodeType, PlanningStatus};
use crate::models::Graph;

/// Result of a successful transition, including everything the caller needs
/// to log and to guide the next step.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub node_id: String,
    pub previous: NodeStatus,
    pub current: NodeStatus,
    /// Planning ancestors promoted to `monitoring` by this transition.
    pub cascaded: Vec<String>,
    /// True when `current_focus` moved to the transitioned node.
    pub focus_changed: bool,
    /// Natural-language suggestion for the caller's next action.
    pub hint: Option<String>,
}

impl TransitionOutcome {
    /// One-line summary suitable for the node's activity log.
    pub fn summary(&self, action: Action, reason: Option<&str>) -> String {
        let mut line = format!("{}: {} -> {}", action, self.previous, self.current);
        if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
            line.push_str(&format!(" ({reason})"));
        }
        line
    }
}

/// Apply `action` to `node_id`, enforcing the transition gates:
/// conclusion on terminal actions, resolved children before a planning
/// complete, and table membership for everything else. No graph state is
/// touched until every gate has passed.
pub fn transition(
    graph: &mut Graph,
    node_id: &str,
    action: Action,
    conclusion: Option<&str>,
) -> Result<TransitionOutcome> {
    let node = graph.node(node_id)?;
    let previous = node.status;

    let next = match node.status {
        NodeStatus::Execution(status) => match status.apply(action) {
            Some(next) => NodeStatus::Execution(next),
            None => {
                return Err(invalid_transition(
                    NodeType::Execution,
                    &status.to_string(),
                    action,
                    &status.available_actions(),
                ))
            }
        },
        NodeStatus::Planning(status) => match status.apply(action) {
            Some(next) => NodeStatus::Planning(next),
            None => {
                return Err(invalid_transition(
                    NodeType::Planning,
                    &status.to_string(),
                    action,
                    &status.available_actions(),
                ))
            }
        },
    };

    let conclusion = conclusion.map(str::trim).filter(|c| !c.is_empty());
    if action.requires_conclusion() && conclusion.is_none() {
        return Err(EngineError::ConclusionRequired(action.to_string()));
    }

    if node.node_type == NodeType::Planning && action == Action::Complete {
        let pending = node
            .children
            .iter()
            .filter_map(|c| graph.nodes.get(c))
            .filter(|c| !c.status.is_resolved())
            .count();
        if pending > 0 {
            return Err(EngineError::IncompleteChildren {
                node: node_id.to_string(),
                pending,
            });
        }
    }

    // All gates passed; mutate.
    let activating = matches!(action, Action::Start | Action::Reopen);
    let cascaded = if activating {
        monitoring_cascade(graph, node_id, action)
    } else {
        Vec::new()
    };

    let node = graph.node_mut(node_id)?;
    node.status = next;
    match action {
        Action::Reopen | Action::Retry => node.conclusion = None,
        _ => {
            if let Some(conclusion) = conclusion {
                node.conclusion = Some(conclusion.to_string());
            }
        }
    }
    node.touch();

    for id in &cascaded {
        let ancestor = graph.node_mut(id)?;
        ancestor.status = NodeStatus::Planning(PlanningStatus::Monitoring);
        ancestor.touch();
    }

    let mut focus_changed = false;
    if activating && graph.current_focus != node_id {
        graph.current_focus = node_id.to_string();
        focus_changed = true;
    }

    let hint = next_step_hint(graph, node_id, action);
    debug!(node = %node_id, %action, from = %previous, to = %next, cascaded = cascaded.len(), "transition applied");

    Ok(TransitionOutcome {
        node_id: node_id.to_string(),
        previous,
        current: next,
        cascaded,
        focus_changed,
        hint,
    })
}

fn invalid_transition(
    node_type: NodeType,
    status: &str,
    action: Action,
    available: &[Action],
) -> EngineError {
    let suggestion = match (node_type, status, action) {
        (_, "pending", Action::Complete | Action::Fail | Action::Submit) => {
            "Start the node first, then resolve it once work is done.".to_string()
        }
        (NodeType::Execution, "failed", Action::Start) => {
            "Use 'retry' to take another attempt at a failed node.".to_string()
        }
        _ if available.is_empty() => "No actions are available from this status.".to_string(),
        _ => {
            let list = available
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            format!("Available actions from '{status}': {list}.")
        }
    };
    EngineError::InvalidTransition {
        status: status.to_string(),
        action: action.to_string(),
        suggestion,
    }
}

/// Walk the parent chain above `node_id` and collect ancestors to promote to
/// `monitoring`. The walk stops at the first ancestor that is already
/// monitoring or not eligible; eligibility is `pending`/`planning`, widened
/// to `completed`/`cancelled` under `reopen`. Pure: callers apply the result.
fn monitoring_cascade(graph: &Graph, node_id: &str, action: Action) -> Vec<String> {
    let mut promoted = Vec::new();
    let mut cursor = graph
        .nodes
        .get(node_id)
        .and_then(|n| n.parent_id.clone());

    while let Some(id) = cursor {
        let Some(ancestor) = graph.nodes.get(&id) else {
            break;
        };
        let NodeStatus::Planning(status) = ancestor.status else {
            break;
        };
        let eligible = match status {
            PlanningStatus::Pending | PlanningStatus::Planning => true,
            PlanningStatus::Completed | PlanningStatus::Cancelled => action == Action::Reopen,
            PlanningStatus::Monitoring => false,
        };
        if !eligible {
            break;
        }
        promoted.push(id.clone());
        cursor = ancestor.parent_id.clone();
    }
    promoted
}

/// Context-dependent guidance for the caller, computed after the mutation.
fn next_step_hint(graph: &Graph, node_id: &str, action: Action) -> Option<String> {
    let node = graph.nodes.get(node_id)?;
    match action {
        Action::Complete | Action::Cancel | Action::Fail => {
            let parent_id = node.parent_id.as_ref()?;
            let parent = graph.nodes.get(parent_id)?;
            let unresolved = parent
                .children
                .iter()
                .filter_map(|c| graph.nodes.get(c))
                .filter(|c| !c.status.is_terminal())
                .count();
            if unresolved == 0 {
                Some(format!(
                    "All children of '{parent_id}' are resolved; consider completing the parent."
                ))
            } else if action == Action::Fail {
                Some("Use 'retry' to take another attempt, or record the blocker first.".into())
            } else {
                None
            }
        }
        Action::Start => Some("Record findings in the node log as you work.".into()),
        Action::Submit => Some("Validate the result, then complete or fail the node.".into()),
        _ => None,
    }
}
