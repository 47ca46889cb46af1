//! The in-memory task graph: one workspace, its node tree, and the global
//! focus pointer. Mutation goes through [`crate::graph`] and [`crate::state`];
//! this type only offers construction and lookups.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::models::node::{NodeMeta, NodeType};
use crate::models::workspace::{Workspace, WorkspaceStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    pub workspace: Workspace,
    /// All nodes keyed by id, root included.
    pub nodes: BTreeMap<String, NodeMeta>,
    /// Always points at an existing node; reset to the root when the focused
    /// subtree is deleted.
    pub current_focus: String,
}

impl Graph {
    /// Create a fresh workspace graph with its permanent planning root.
    pub fn init(name: impl Into<String>, project_root: PathBuf) -> Graph {
        let now = chrono::Utc::now();
        let root = NodeMeta::new(Uuid::new_v4().to_string(), NodeType::Planning, None);
        let root_id = root.id.clone();
        let workspace = Workspace {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            status: WorkspaceStatus::Active,
            root_node_id: root_id.clone(),
            project_root,
            rules: Vec::new(),
            dispatch: None,
            created_at: now,
            updated_at: now,
        };
        let mut nodes = BTreeMap::new();
        nodes.insert(root_id.clone(), root);
        Graph {
            workspace,
            nodes,
            current_focus: root_id,
        }
    }

    pub fn root_id(&self) -> &str {
        &self.workspace.root_node_id
    }

    pub fn node(&self, id: &str) -> Result<&NodeMeta> {
        self.nodes
            .get(id)
            .ok_or_else(|| EngineError::NodeNotFound(id.to_string()))
    }

    pub fn node_mut(&mut self, id: &str) -> Result<&mut NodeMeta> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| EngineError::NodeNotFound(id.to_string()))
    }

    /// Whether `candidate` sits inside the subtree rooted at `ancestor`
    /// (`candidate == ancestor` counts). Walks the parent chain upward, so a
    /// well-formed tree terminates at the root.
    pub fn is_in_subtree(&self, ancestor: &str, candidate: &str) -> bool {
        let mut cursor = Some(candidate.to_string());
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.nodes.get(&id).and_then(|n| n.parent_id.clone());
        }
        false
    }

    /// Depth-first collection of a subtree's ids, the given node first.
    pub fn subtree_ids(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                for child in node.children.iter().rev() {
                    stack.push(child.clone());
                }
            }
            out.push(current);
        }
        out
    }

    /// Ancestor chain from `id` up to the root, cut at the first isolate
    /// node (inclusive), returned focal-node-first. An isolate focal node is
    /// its own chain: nothing above it is inherited.
    pub fn ancestor_chain(&self, id: &str) -> Result<Vec<String>> {
        let mut chain = Vec::new();
        let mut cursor = Some(id.to_string());
        while let Some(current) = cursor {
            let node = self.node(&current)?;
            chain.push(current);
            if node.isolate {
                break;
            }
            cursor = node.parent_id.clone();
        }
        Ok(chain)
    }
}
