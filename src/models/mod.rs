pub mod detail;
pub mod graph;
pub mod memo;
pub mod node;
pub mod workspace;

pub use detail::{DocEntry, DocStatus, LogEntry, LogKind, NodeDetail};
pub use graph::Graph;
pub use memo::Memo;
pub use node::{
    Action, DispatchStatus, ExecutionStatus, NodeDispatchState, NodeMeta, NodeRef, NodeStatus,
    NodeType, PlanningStatus,
};
pub use workspace::{DispatchConfig, DispatchLimits, Workspace, WorkspaceStatus};
