//! Engine facade: ties the store, the git capability and the per-workspace
//! locks together and exposes the full orchestration API.
//!
//! Every mutation follows the same shape: acquire the workspace guard, read
//! the graph, validate and mutate in memory, write the graph back, then
//! append log lines. The guard is held for the whole read-modify-write
//! sequence; the persistence collaborator itself offers no cross-call
//! locking.

mod dispatch;
mod nodes;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use crate::context::{self, ContextOptions, ContextView};
use crate::error::{EngineError, Result};
use crate::models::node::NodeType;
use crate::models::{
    Action, Graph, LogEntry, LogKind, Memo, NodeDetail, NodeStatus, Workspace, WorkspaceStatus,
};
use crate::state::{self, TransitionOutcome};
use crate::store::{NodeKey, Store, WorkspaceKey};

pub struct Engine {
    store: Box<dyn Store>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// One row of the read-only workspace tree summary.
#[derive(Debug, Clone)]
pub struct TreeRow {
    pub id: String,
    pub node_type: NodeType,
    pub status: NodeStatus,
    pub title: String,
    pub depth: usize,
    pub focused: bool,
}

impl Engine {
    pub fn new(store: Box<dyn Store>) -> Engine {
        Engine {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Per-workspace guard serializing read-modify-write sequences within
    /// this process.
    fn guard(&self, workspace_id: &str) -> Arc<Mutex<()>> {
        let mut locks = relock(&self.locks);
        locks
            .entry(workspace_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub(crate) fn load(&self, workspace_id: &str) -> Result<Graph> {
        self.store
            .read_graph(&WorkspaceKey::new(workspace_id))
            .map_err(EngineError::store)?
            .ok_or_else(|| EngineError::WorkspaceNotFound(workspace_id.to_string()))
    }

    pub(crate) fn persist(&self, graph: &Graph) -> Result<()> {
        self.store
            .write_graph(&WorkspaceKey::new(&graph.workspace.id), graph)
            .map_err(EngineError::store)
    }

    pub(crate) fn log(
        &self,
        workspace_id: &str,
        node_id: &str,
        kind: LogKind,
        message: impl Into<String>,
    ) -> Result<()> {
        self.store
            .append_log(
                &NodeKey::new(workspace_id, node_id),
                &LogEntry::now(kind, message),
            )
            .map_err(EngineError::store)
    }

    pub(crate) fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    // ---- workspaces -----------------------------------------------------

    /// Create a workspace with its permanent planning root. `goal` becomes
    /// the root node's requirement and anchors every composed context header.
    pub fn init_workspace(
        &self,
        name: &str,
        project_root: PathBuf,
        goal: &str,
        rules: Vec<String>,
    ) -> Result<Workspace> {
        let mut graph = Graph::init(name, project_root);
        graph.workspace.rules = rules;
        let root_id = graph.root_id().to_string();

        self.store
            .write_detail(
                &NodeKey::new(&graph.workspace.id, &root_id),
                &NodeDetail::new(name, goal),
            )
            .map_err(EngineError::store)?;
        self.persist(&graph)?;
        info!(workspace = %graph.workspace.id, %name, "workspace initialized");
        Ok(graph.workspace)
    }

    pub fn workspace(&self, workspace_id: &str) -> Result<Workspace> {
        Ok(self.load(workspace_id)?.workspace)
    }

    pub fn workspaces(&self) -> Result<Vec<Workspace>> {
        self.store.list_workspaces().map_err(EngineError::store)
    }

    /// Archive a workspace. Any live dispatch is torn down first; branch
    /// cleanup failures are swallowed so a git glitch never blocks the
    /// archive.
    pub fn archive_workspace(&self, workspace_id: &str) -> Result<Workspace> {
        let guard = self.guard(workspace_id);
        let _held = relock(&guard);

        let mut graph = self.load(workspace_id)?;
        if graph.workspace.dispatch.is_some() {
            if let Err(err) = crate::dispatch::disable(&mut graph, false) {
                warn!(workspace = %workspace_id, %err, "dispatch teardown failed during archive");
                graph.workspace.dispatch = None;
            }
        }
        graph.workspace.status = WorkspaceStatus::Archived;
        graph.workspace.updated_at = chrono::Utc::now();
        self.persist(&graph)?;
        info!(workspace = %workspace_id, "workspace archived");
        Ok(graph.workspace)
    }

    /// Depth-first summary of the whole tree, children in creation order.
    pub fn workspace_tree(&self, workspace_id: &str) -> Result<Vec<TreeRow>> {
        let graph = self.load(workspace_id)?;
        let mut rows = Vec::with_capacity(graph.nodes.len());
        let mut stack = vec![(graph.root_id().to_string(), 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let node = graph.node(&id)?;
            let detail = self
                .store
                .read_detail(&NodeKey::new(workspace_id, &id))
                .map_err(EngineError::store)?
                .unwrap_or_default();
            rows.push(TreeRow {
                id: id.clone(),
                node_type: node.node_type,
                status: node.status,
                title: detail.title,
                depth,
                focused: graph.current_focus == id,
            });
            for child in node.children.iter().rev() {
                stack.push((child.clone(), depth + 1));
            }
        }
        Ok(rows)
    }

    // ---- lifecycle ------------------------------------------------------

    /// Apply a state-machine action to a node. See [`crate::state`] for the
    /// gates and cascade rules.
    pub fn transition(
        &self,
        workspace_id: &str,
        node_id: &str,
        action: Action,
        reason: Option<&str>,
        conclusion: Option<&str>,
    ) -> Result<TransitionOutcome> {
        let guard = self.guard(workspace_id);
        let _held = relock(&guard);

        let mut graph = self.load(workspace_id)?;
        let outcome = state::transition(&mut graph, node_id, action, conclusion)?;
        self.persist(&graph)?;

        self.log(
            workspace_id,
            node_id,
            LogKind::Transition,
            outcome.summary(action, reason),
        )?;
        // A resolved node's "current problem" note is no longer current.
        if matches!(action, Action::Complete | Action::Cancel) {
            self.store
                .write_problem(&NodeKey::new(workspace_id, node_id), None)
                .map_err(EngineError::store)?;
        }
        Ok(outcome)
    }

    // ---- focus and context ---------------------------------------------

    /// Swap the focus pointer; no other side effects.
    pub fn focus(&self, workspace_id: &str, node_id: &str) -> Result<String> {
        let guard = self.guard(workspace_id);
        let _held = relock(&guard);

        let mut graph = self.load(workspace_id)?;
        let previous = context::focus(&mut graph, node_id)?;
        self.persist(&graph)?;
        Ok(previous)
    }

    pub fn current_focus(&self, workspace_id: &str) -> Result<String> {
        Ok(self.load(workspace_id)?.current_focus)
    }

    /// Compose the context slice for a node. Read-only.
    pub fn context(
        &self,
        workspace_id: &str,
        node_id: &str,
        options: ContextOptions,
    ) -> Result<ContextView> {
        let graph = self.load(workspace_id)?;
        context::compose(&graph, self.store.as_ref(), node_id, options)
    }

    // ---- memos ----------------------------------------------------------

    pub fn create_memo(
        &self,
        title: &str,
        summary: &str,
        tags: Vec<String>,
        content: &str,
    ) -> Result<Memo> {
        let memo = Memo::new(title, summary, tags, content);
        self.store.write_memo(&memo).map_err(EngineError::store)?;
        Ok(memo)
    }

    pub fn update_memo(
        &self,
        memo_id: &str,
        title: Option<&str>,
        summary: Option<&str>,
        tags: Option<Vec<String>>,
        content: Option<&str>,
    ) -> Result<Memo> {
        let mut memo = self.memo(memo_id)?;
        if let Some(title) = title {
            memo.title = title.to_string();
        }
        if let Some(summary) = summary {
            memo.summary = summary.to_string();
        }
        if let Some(tags) = tags {
            memo.tags = tags;
        }
        if let Some(content) = content {
            memo.content = content.to_string();
        }
        memo.updated_at = chrono::Utc::now();
        self.store.write_memo(&memo).map_err(EngineError::store)?;
        Ok(memo)
    }

    /// Delete a memo, returning its last recorded state. Dangling
    /// `memo://` references on nodes are tolerated: context composition
    /// drops them silently.
    pub fn delete_memo(&self, memo_id: &str) -> Result<Memo> {
        let memo = self.memo(memo_id)?;
        self.store.remove_memo(memo_id).map_err(EngineError::store)?;
        Ok(memo)
    }

    pub fn memo(&self, memo_id: &str) -> Result<Memo> {
        self.store
            .read_memo(memo_id)
            .map_err(EngineError::store)?
            .ok_or_else(|| EngineError::MemoNotFound(memo_id.to_string()))
    }

    pub fn memos(&self) -> Result<Vec<Memo>> {
        self.store.list_memos().map_err(EngineError::store)
    }

    /// Memos carrying `tag`, in creation order.
    pub fn memos_tagged(&self, tag: &str) -> Result<Vec<Memo>> {
        Ok(self
            .memos()?
            .into_iter()
            .filter(|m| m.tags.iter().any(|t| t == tag))
            .collect())
    }
}

/// Lock helper that shrugs off poisoning: a panicked holder leaves the data
/// in whatever state it reached, which the next whole-object write replaces.
pub(crate) fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
