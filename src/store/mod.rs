//! Persistence boundary.
//!
//! The engine persists through this trait with whole-object read/replace
//! calls; there is no partial-update primitive. Storage identity is opaque:
//! [`WorkspaceKey`] and [`NodeKey`] are resolved here and never leak into
//! state-machine or dispatch logic. The on-disk format belongs to the
//! embedding collaborator; [`MemoryStore`] ships for tests and for embedders
//! that bring their own durability.

mod memory;

pub use memory::MemoryStore;

use anyhow::Result;

use crate::models::{Graph, LogEntry, Memo, NodeDetail, Workspace};

/// Opaque storage identity for a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceKey(String);

impl WorkspaceKey {
    pub fn new(workspace_id: &str) -> Self {
        WorkspaceKey(workspace_id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Opaque storage identity for one node within a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    workspace: String,
    node: String,
}

impl NodeKey {
    pub fn new(workspace_id: &str, node_id: &str) -> Self {
        NodeKey {
            workspace: workspace_id.to_string(),
            node: node_id.to_string(),
        }
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    pub fn node(&self) -> &str {
        &self.node
    }
}

/// Atomic whole-object persistence for graphs, per-node records and memos.
///
/// Implementations are assumed crash-safe (write-then-rename or equivalent)
/// but offer no cross-call locking; the engine serializes access per
/// workspace.
pub trait Store: Send + Sync {
    fn list_workspaces(&self) -> Result<Vec<Workspace>>;

    fn read_graph(&self, key: &WorkspaceKey) -> Result<Option<Graph>>;
    fn write_graph(&self, key: &WorkspaceKey, graph: &Graph) -> Result<()>;

    fn read_detail(&self, key: &NodeKey) -> Result<Option<NodeDetail>>;
    fn write_detail(&self, key: &NodeKey, detail: &NodeDetail) -> Result<()>;

    fn append_log(&self, key: &NodeKey, entry: &LogEntry) -> Result<()>;
    fn read_log(&self, key: &NodeKey) -> Result<Vec<LogEntry>>;

    fn read_problem(&self, key: &NodeKey) -> Result<Option<String>>;
    fn write_problem(&self, key: &NodeKey, problem: Option<&str>) -> Result<()>;

    /// Remove every per-node record (detail, log, problem) for `key`.
    fn remove_node(&self, key: &NodeKey) -> Result<()>;

    fn read_memo(&self, id: &str) -> Result<Option<Memo>>;
    fn write_memo(&self, memo: &Memo) -> Result<()>;
    fn remove_memo(&self, id: &str) -> Result<()>;
    fn list_memos(&self) -> Result<Vec<Memo>>;
}
