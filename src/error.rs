//! Typed engine errors.
//!
//! Every failure carries a stable kind (see [`EngineError::code`]) plus a
//! human-readable message. Callers are frequently autonomous agents, so
//! state-machine rejections also carry a remediation suggestion instead of a
//! bare code.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("parent node not found: {0}")]
    ParentNotFound(String),

    #[error("cannot '{action}' while '{status}'. {suggestion}")]
    InvalidTransition {
        status: String,
        action: String,
        suggestion: String,
    },

    #[error("a non-empty conclusion is required to '{0}' a node")]
    ConclusionRequired(String),

    #[error("cannot complete '{node}': {pending} child task(s) still unresolved")]
    IncompleteChildren { node: String, pending: usize },

    #[error("execution node '{0}' cannot have children")]
    ExecutionCannotHaveChildren(String),

    #[error("parent '{node}' is '{status}' and cannot accept new children")]
    InvalidParentStatus { node: String, status: String },

    #[error("invalid title: {0}")]
    InvalidTitle(String),

    #[error("the root node cannot be deleted")]
    CannotDeleteRoot,

    #[error("the root node cannot be moved")]
    CannotMoveRoot,

    #[error("cannot move '{node}' under '{target}': it is part of its own subtree")]
    CycleDetected { node: String, target: String },

    #[error("'{0}' is not inside a git repository")]
    GitNotFound(String),

    #[error("workspace '{other}' already runs git-mode dispatch on this project root")]
    DispatchConflict { other: String },

    #[error("dispatch is not enabled for workspace '{0}'")]
    DispatchNotEnabled(String),

    #[error("dispatch is still executing on node(s): {0}")]
    DispatchInProgress(String),

    #[error("node '{node}' cannot be dispatched: {reason}")]
    NodeNotDispatchable { node: String, reason: String },

    #[error("memo not found: {0}")]
    MemoNotFound(String),

    #[error("reference '{reference}' already exists on node '{node}'")]
    ReferenceExists { node: String, reference: String },

    #[error("reference '{reference}' not found on node '{node}'")]
    ReferenceNotFound { node: String, reference: String },

    #[error("storage error: {0}")]
    Store(#[source] anyhow::Error),

    #[error("git error: {0}")]
    Git(#[source] anyhow::Error),
}

impl EngineError {
    /// Stable machine-readable kind, suitable for wire surfaces (MCP/HTTP).
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::WorkspaceNotFound(_) => "WORKSPACE_NOT_FOUND",
            EngineError::NodeNotFound(_) => "NODE_NOT_FOUND",
            EngineError::ParentNotFound(_) => "PARENT_NOT_FOUND",
            EngineError::InvalidTransition { .. } => "INVALID_TRANSITION",
            EngineError::ConclusionRequired(_) => "CONCLUSION_REQUIRED",
            EngineError::IncompleteChildren { .. } => "INCOMPLETE_CHILDREN",
            EngineError::ExecutionCannotHaveChildren(_) => "EXECUTION_CANNOT_HAVE_CHILDREN",
            EngineError::InvalidParentStatus { .. } => "INVALID_PARENT_STATUS",
            EngineError::InvalidTitle(_) => "INVALID_TITLE",
            EngineError::CannotDeleteRoot => "CANNOT_DELETE_ROOT",
            EngineError::CannotMoveRoot => "CANNOT_MOVE_ROOT",
            EngineError::CycleDetected { .. } => "CYCLE_DETECTED",
            EngineError::GitNotFound(_) => "GIT_NOT_FOUND",
            EngineError::DispatchConflict { .. } => "DISPATCH_CONFLICT",
            EngineError::DispatchNotEnabled(_) => "DISPATCH_NOT_ENABLED",
            EngineError::DispatchInProgress(_) => "DISPATCH_IN_PROGRESS",
            EngineError::NodeNotDispatchable { .. } => "NODE_NOT_DISPATCHABLE",
            EngineError::MemoNotFound(_) => "MEMO_NOT_FOUND",
            EngineError::ReferenceExists { .. } => "REFERENCE_EXISTS",
            EngineError::ReferenceNotFound { .. } => "REFERENCE_NOT_FOUND",
            EngineError::Store(_) => "STORE_ERROR",
            EngineError::Git(_) => "GIT_ERROR",
        }
    }

    pub(crate) fn store(err: anyhow::Error) -> Self {
        EngineError::Store(err)
    }

    pub(crate) fn git(err: anyhow::Error) -> Self {
        EngineError::Git(err)
    }
}
