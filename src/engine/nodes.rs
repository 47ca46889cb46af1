//! Node-level engine operations: structure, detail, references.

use tracing::info;

use crate::error::{EngineError, Result};
use crate::graph;
use crate::models::node::{NodeMeta, NodeRef, NodeType};
use crate::models::{DocEntry, DocStatus, LogKind, NodeDetail};
use crate::store::NodeKey;

use super::{relock, Engine};

impl Engine {
    pub fn node(&self, workspace_id: &str, node_id: &str) -> Result<NodeMeta> {
        Ok(self.load(workspace_id)?.node(node_id)?.clone())
    }

    pub fn detail(&self, workspace_id: &str, node_id: &str) -> Result<NodeDetail> {
        self.load(workspace_id)?.node(node_id)?;
        Ok(self
            .store()
            .read_detail(&NodeKey::new(workspace_id, node_id))
            .map_err(EngineError::store)?
            .unwrap_or_default())
    }

    /// Create a node under `parent_id` with its prose detail.
    pub fn create_node(
        &self,
        workspace_id: &str,
        parent_id: &str,
        node_type: NodeType,
        title: &str,
        requirement: &str,
        docs: Vec<DocEntry>,
    ) -> Result<NodeMeta> {
        let guard = self.guard(workspace_id);
        let _held = relock(&guard);

        let mut graph = self.load(workspace_id)?;
        let created = graph::create_node(&mut graph, parent_id, node_type, title)?;

        let mut detail = NodeDetail::new(title.trim(), requirement);
        detail.docs = docs;
        self.store()
            .write_detail(&NodeKey::new(workspace_id, &created.id), &detail)
            .map_err(EngineError::store)?;
        self.persist(&graph)?;

        self.log(
            workspace_id,
            &created.id,
            LogKind::Note,
            format!("created under '{parent_id}'"),
        )?;
        info!(workspace = %workspace_id, node = %created.id, "node created");
        Ok(graph.node(&created.id)?.clone())
    }

    pub fn move_node(
        &self,
        workspace_id: &str,
        node_id: &str,
        new_parent_id: &str,
    ) -> Result<()> {
        let guard = self.guard(workspace_id);
        let _held = relock(&guard);

        let mut graph = self.load(workspace_id)?;
        graph::move_node(&mut graph, node_id, new_parent_id)?;
        self.persist(&graph)?;
        self.log(
            workspace_id,
            node_id,
            LogKind::Note,
            format!("moved under '{new_parent_id}'"),
        )
    }

    /// Delete a node and its subtree, scrubbing per-node storage for every
    /// removed id.
    pub fn delete_node(&self, workspace_id: &str, node_id: &str) -> Result<Vec<String>> {
        let guard = self.guard(workspace_id);
        let _held = relock(&guard);

        let mut graph = self.load(workspace_id)?;
        let removed = graph::delete_node(&mut graph, node_id)?;
        self.persist(&graph)?;
        for id in &removed {
            self.store()
                .remove_node(&NodeKey::new(workspace_id, id))
                .map_err(EngineError::store)?;
        }
        info!(workspace = %workspace_id, node = %node_id, count = removed.len(), "subtree deleted");
        Ok(removed)
    }

    // ---- detail ---------------------------------------------------------

    pub fn update_detail(
        &self,
        workspace_id: &str,
        node_id: &str,
        title: Option<&str>,
        requirement: Option<&str>,
    ) -> Result<NodeDetail> {
        let guard = self.guard(workspace_id);
        let _held = relock(&guard);

        let mut graph = self.load(workspace_id)?;
        graph.node(node_id)?;

        let key = NodeKey::new(workspace_id, node_id);
        let mut detail = self
            .store()
            .read_detail(&key)
            .map_err(EngineError::store)?
            .unwrap_or_default();
        if let Some(title) = title {
            detail.title = title.trim().to_string();
        }
        if let Some(requirement) = requirement {
            detail.requirement = requirement.to_string();
        }
        self.store()
            .write_detail(&key, &detail)
            .map_err(EngineError::store)?;

        graph.node_mut(node_id)?.touch();
        self.persist(&graph)?;
        Ok(detail)
    }

    pub fn add_doc(
        &self,
        workspace_id: &str,
        node_id: &str,
        title: &str,
        path: Option<String>,
        content: Option<String>,
    ) -> Result<DocEntry> {
        let guard = self.guard(workspace_id);
        let _held = relock(&guard);

        let graph = self.load(workspace_id)?;
        graph.node(node_id)?;

        let key = NodeKey::new(workspace_id, node_id);
        let mut detail = self
            .store()
            .read_detail(&key)
            .map_err(EngineError::store)?
            .unwrap_or_default();
        let doc = DocEntry::new(title, path, content);
        detail.docs.push(doc.clone());
        self.store()
            .write_detail(&key, &detail)
            .map_err(EngineError::store)?;
        Ok(doc)
    }

    /// Expire a doc: it stays on record but drops out of composed context.
    pub fn expire_doc(&self, workspace_id: &str, node_id: &str, doc_id: &str) -> Result<()> {
        let guard = self.guard(workspace_id);
        let _held = relock(&guard);

        let graph = self.load(workspace_id)?;
        graph.node(node_id)?;

        let key = NodeKey::new(workspace_id, node_id);
        let mut detail = self
            .store()
            .read_detail(&key)
            .map_err(EngineError::store)?
            .unwrap_or_default();
        let doc = detail
            .docs
            .iter_mut()
            .find(|d| d.id == doc_id)
            .ok_or_else(|| EngineError::ReferenceNotFound {
                node: node_id.to_string(),
                reference: doc_id.to_string(),
            })?;
        doc.status = DocStatus::Expired;
        self.store()
            .write_detail(&key, &detail)
            .map_err(EngineError::store)
    }

    pub fn append_note(&self, workspace_id: &str, node_id: &str, note: &str) -> Result<()> {
        let guard = self.guard(workspace_id);
        let _held = relock(&guard);

        let graph = self.load(workspace_id)?;
        graph.node(node_id)?;

        let key = NodeKey::new(workspace_id, node_id);
        let mut detail = self
            .store()
            .read_detail(&key)
            .map_err(EngineError::store)?
            .unwrap_or_default();
        detail.notes.push(note.to_string());
        self.store()
            .write_detail(&key, &detail)
            .map_err(EngineError::store)?;
        self.log(workspace_id, node_id, LogKind::Note, note)
    }

    pub fn set_problem(&self, workspace_id: &str, node_id: &str, problem: &str) -> Result<()> {
        self.load(workspace_id)?.node(node_id)?;
        self.store()
            .write_problem(&NodeKey::new(workspace_id, node_id), Some(problem))
            .map_err(EngineError::store)
    }

    pub fn clear_problem(&self, workspace_id: &str, node_id: &str) -> Result<()> {
        self.load(workspace_id)?.node(node_id)?;
        self.store()
            .write_problem(&NodeKey::new(workspace_id, node_id), None)
            .map_err(EngineError::store)
    }

    /// Mark or unmark a node as a context-inheritance boundary.
    pub fn set_isolate(&self, workspace_id: &str, node_id: &str, isolate: bool) -> Result<()> {
        let guard = self.guard(workspace_id);
        let _held = relock(&guard);

        let mut graph = self.load(workspace_id)?;
        let node = graph.node_mut(node_id)?;
        node.isolate = isolate;
        node.touch();
        self.persist(&graph)
    }

    // ---- references -----------------------------------------------------

    /// Attach a cross-reference (`<node-id>` or `memo://<id>`) to a node.
    /// The target must resolve at attach time; context assembly later drops
    /// references that have gone stale.
    pub fn add_reference(
        &self,
        workspace_id: &str,
        node_id: &str,
        reference: &str,
    ) -> Result<NodeRef> {
        let guard = self.guard(workspace_id);
        let _held = relock(&guard);

        let mut graph = self.load(workspace_id)?;
        graph.node(node_id)?;

        let parsed = NodeRef::parse(reference);
        match &parsed {
            NodeRef::Node(target) => {
                graph.node(target)?;
            }
            NodeRef::Memo(memo_id) => {
                self.store()
                    .read_memo(memo_id)
                    .map_err(EngineError::store)?
                    .ok_or_else(|| EngineError::MemoNotFound(memo_id.clone()))?;
            }
        }

        let node = graph.node_mut(node_id)?;
        if node.references.contains(&parsed) {
            return Err(EngineError::ReferenceExists {
                node: node_id.to_string(),
                reference: parsed.to_string(),
            });
        }
        node.references.push(parsed.clone());
        node.touch();
        self.persist(&graph)?;
        Ok(parsed)
    }

    pub fn remove_reference(
        &self,
        workspace_id: &str,
        node_id: &str,
        reference: &str,
    ) -> Result<()> {
        let guard = self.guard(workspace_id);
        let _held = relock(&guard);

        let mut graph = self.load(workspace_id)?;
        let parsed = NodeRef::parse(reference);
        let node = graph.node_mut(node_id)?;
        let before = node.references.len();
        node.references.retain(|r| r != &parsed);
        if node.references.len() == before {
            return Err(EngineError::ReferenceNotFound {
                node: node_id.to_string(),
                reference: parsed.to_string(),
            });
        }
        node.touch();
        self.persist(&graph)
    }
}
