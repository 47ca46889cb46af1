//! Node metadata: the unit of work in a task graph.
//!
//! Nodes come in two kinds with independent lifecycles:
//! - `planning` nodes decompose work and may have children
//! - `execution` nodes do work and are always leaves
//!
//! Transition tables for both lifecycles live here as pure functions on the
//! status enums; orchestration (gates, cascades, hints) lives in
//! [`crate::state`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Planning,
    Execution,
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeType::Planning => write!(f, "planning"),
            NodeType::Execution => write!(f, "execution"),
        }
    }
}

/// Actions accepted by [`crate::state::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Start,
    Submit,
    Complete,
    Fail,
    Cancel,
    Retry,
    Reopen,
}

impl Action {
    /// Terminal actions must carry a non-empty conclusion.
    pub fn requires_conclusion(self) -> bool {
        matches!(self, Action::Complete | Action::Fail | Action::Cancel)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Action::Start => "start",
            Action::Submit => "submit",
            Action::Complete => "complete",
            Action::Fail => "fail",
            Action::Cancel => "cancel",
            Action::Retry => "retry",
            Action::Reopen => "reopen",
        };
        write!(f, "{label}")
    }
}

/// Lifecycle of an execution (leaf) node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Implementing,
    Validating,
    Completed,
    Failed,
}

impl ExecutionStatus {
    /// Transition table: `(status, action) -> next status`, `None` when the
    /// pair has no entry.
    pub fn apply(self, action: Action) -> Option<ExecutionStatus> {
        use Action::*;
        use ExecutionStatus::*;
        match (self, action) {
            (Pending, Start) => Some(Implementing),
            (Implementing, Submit) => Some(Validating),
            (Implementing, Complete) => Some(Completed),
            (Implementing, Fail) => Some(Failed),
            (Validating, Complete) => Some(Completed),
            (Validating, Fail) => Some(Failed),
            (Failed, Retry) => Some(Implementing),
            (Completed, Reopen) => Some(Implementing),
            _ => None,
        }
    }

    /// Actions with a table entry for this status, for error suggestions.
    pub fn available_actions(self) -> Vec<Action> {
        use Action::*;
        [Start, Submit, Complete, Fail, Cancel, Retry, Reopen]
            .into_iter()
            .filter(|a| self.apply(*a).is_some())
            .collect()
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Implementing => "implementing",
            ExecutionStatus::Validating => "validating",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        };
        write!(f, "{label}")
    }
}

/// Lifecycle of a planning (inner) node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanningStatus {
    Pending,
    Planning,
    Monitoring,
    Completed,
    Cancelled,
}

impl PlanningStatus {
    pub fn apply(self, action: Action) -> Option<PlanningStatus> {
        use Action::*;
        use PlanningStatus::*;
        match (self, action) {
            (Pending, Start) => Some(Planning),
            (Planning, Complete) => Some(Completed),
            (Planning, Cancel) => Some(Cancelled),
            (Monitoring, Complete) => Some(Completed),
            (Monitoring, Cancel) => Some(Cancelled),
            (Completed, Reopen) => Some(Planning),
            (Cancelled, Reopen) => Some(Planning),
            _ => None,
        }
    }

    pub fn available_actions(self) -> Vec<Action> {
        use Action::*;
        [Start, Submit, Complete, Fail, Cancel, Retry, Reopen]
            .into_iter()
            .filter(|a| self.apply(*a).is_some())
            .collect()
    }
}

impl std::fmt::Display for PlanningStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PlanningStatus::Pending => "pending",
            PlanningStatus::Planning => "planning",
            PlanningStatus::Monitoring => "monitoring",
            PlanningStatus::Completed => "completed",
            PlanningStatus::Cancelled => "cancelled",
        };
        write!(f, "{label}")
    }
}

/// Status tagged by node kind. The two lifecycles share label spellings
/// (`pending`, `completed`) so the serialized form keeps the kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum NodeStatus {
    Planning(PlanningStatus),
    Execution(ExecutionStatus),
}

impl NodeStatus {
    pub fn initial(node_type: NodeType) -> NodeStatus {
        match node_type {
            NodeType::Planning => NodeStatus::Planning(PlanningStatus::Pending),
            NodeType::Execution => NodeStatus::Execution(ExecutionStatus::Pending),
        }
    }

    /// Terminal means no further work is expected without a `reopen`/`retry`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeStatus::Planning(PlanningStatus::Completed)
                | NodeStatus::Planning(PlanningStatus::Cancelled)
                | NodeStatus::Execution(ExecutionStatus::Completed)
                | NodeStatus::Execution(ExecutionStatus::Failed)
        )
    }

    /// Resolved children never block a planning parent's completion.
    pub fn is_resolved(self) -> bool {
        matches!(
            self,
            NodeStatus::Planning(PlanningStatus::Completed)
                | NodeStatus::Planning(PlanningStatus::Cancelled)
                | NodeStatus::Execution(ExecutionStatus::Completed)
        )
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeStatus::Planning(s) => write!(f, "{s}"),
            NodeStatus::Execution(s) => write!(f, "{s}"),
        }
    }
}

/// A cross-reference held on a node: either another node by id, or a memo via
/// `memo://<id>`. Serialized as the plain string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeRef {
    Node(String),
    Memo(String),
}

impl NodeRef {
    pub const MEMO_SCHEME: &'static str = "memo://";

    pub fn parse(raw: &str) -> NodeRef {
        match raw.strip_prefix(Self::MEMO_SCHEME) {
            Some(id) => NodeRef::Memo(id.to_string()),
            None => NodeRef::Node(raw.to_string()),
        }
    }
}

impl From<String> for NodeRef {
    fn from(raw: String) -> Self {
        NodeRef::parse(&raw)
    }
}

impl From<NodeRef> for String {
    fn from(r: NodeRef) -> String {
        r.to_string()
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRef::Node(id) => write!(f, "{id}"),
            NodeRef::Memo(id) => write!(f, "{}{id}", Self::MEMO_SCHEME),
        }
    }
}

/// Outcome tracking for a dispatched execution node. Retained after the
/// dispatch resolves as a durable audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    Pending,
    Executing,
    Testing,
    Passed,
    Failed,
}

impl std::fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DispatchStatus::Pending => "pending",
            DispatchStatus::Executing => "executing",
            DispatchStatus::Testing => "testing",
            DispatchStatus::Passed => "passed",
            DispatchStatus::Failed => "failed",
        };
        write!(f, "{label}")
    }
}

/// Per-node dispatch record. `start_marker` is the rollback target: a commit
/// hash in git mode, an RFC3339 timestamp otherwise, captured before any
/// delegated work begins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDispatchState {
    pub start_marker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_marker: Option<String>,
    pub status: DispatchStatus,
}

/// Structural metadata for one node. Prose (title, requirement, docs, notes)
/// lives in the node's [`crate::models::NodeDetail`], fetched by identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMeta {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
    pub status: NodeStatus,
    #[serde(default)]
    pub isolate: bool,
    #[serde(default)]
    pub references: Vec<NodeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<NodeDispatchState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NodeMeta {
    pub fn new(id: String, node_type: NodeType, parent_id: Option<String>) -> NodeMeta {
        let now = Utc::now();
        NodeMeta {
            id,
            node_type,
            parent_id,
            children: Vec::new(),
            status: NodeStatus::initial(node_type),
            isolate: false,
            references: Vec::new(),
            conclusion: None,
            dispatch: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
