//! In-process store used by tests and by embedders that provide their own
//! durability layer around the engine.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;

use crate::models::{Graph, LogEntry, Memo, NodeDetail, Workspace};

use super::{NodeKey, Store, WorkspaceKey};

#[derive(Default)]
struct Inner {
    graphs: HashMap<String, Graph>,
    details: HashMap<(String, String), NodeDetail>,
    logs: HashMap<(String, String), Vec<LogEntry>>,
    problems: HashMap<(String, String), String>,
    memos: HashMap<String, Memo>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same poisoning policy as the engine's workspace locks: a panicked
    /// holder left whole-object records behind, which stay readable and get
    /// replaced by the next write.
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn node_key(key: &NodeKey) -> (String, String) {
    (key.workspace().to_string(), key.node().to_string())
}

impl Store for MemoryStore {
    fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        let inner = self.lock();
        Ok(inner.graphs.values().map(|g| g.workspace.clone()).collect())
    }

    fn read_graph(&self, key: &WorkspaceKey) -> Result<Option<Graph>> {
        let inner = self.lock();
        Ok(inner.graphs.get(key.as_str()).cloned())
    }

    fn write_graph(&self, key: &WorkspaceKey, graph: &Graph) -> Result<()> {
        let mut inner = self.lock();
        inner.graphs.insert(key.as_str().to_string(), graph.clone());
        Ok(())
    }

    fn read_detail(&self, key: &NodeKey) -> Result<Option<NodeDetail>> {
        let inner = self.lock();
        Ok(inner.details.get(&node_key(key)).cloned())
    }

    fn write_detail(&self, key: &NodeKey, detail: &NodeDetail) -> Result<()> {
        let mut inner = self.lock();
        inner.details.insert(node_key(key), detail.clone());
        Ok(())
    }

    fn append_log(&self, key: &NodeKey, entry: &LogEntry) -> Result<()> {
        let mut inner = self.lock();
        inner
            .logs
            .entry(node_key(key))
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    fn read_log(&self, key: &NodeKey) -> Result<Vec<LogEntry>> {
        let inner = self.lock();
        Ok(inner.logs.get(&node_key(key)).cloned().unwrap_or_default())
    }

    fn read_problem(&self, key: &NodeKey) -> Result<Option<String>> {
        let inner = self.lock();
        Ok(inner.problems.get(&node_key(key)).cloned())
    }

    fn write_problem(&self, key: &NodeKey, problem: Option<&str>) -> Result<()> {
        let mut inner = self.lock();
        match problem {
            Some(text) => {
                inner.problems.insert(node_key(key), text.to_string());
            }
            None => {
                inner.problems.remove(&node_key(key));
            }
        }
        Ok(())
    }

    fn remove_node(&self, key: &NodeKey) -> Result<()> {
        let mut inner = self.lock();
        let k = node_key(key);
        inner.details.remove(&k);
        inner.logs.remove(&k);
        inner.problems.remove(&k);
        Ok(())
    }

    fn read_memo(&self, id: &str) -> Result<Option<Memo>> {
        let inner = self.lock();
        Ok(inner.memos.get(id).cloned())
    }

    fn write_memo(&self, memo: &Memo) -> Result<()> {
        let mut inner = self.lock();
        inner.memos.insert(memo.id.clone(), memo.clone());
        Ok(())
    }

    fn remove_memo(&self, id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.memos.remove(id);
        Ok(())
    }

    fn list_memos(&self) -> Result<Vec<Memo>> {
        let inner = self.lock();
        let mut memos: Vec<Memo> = inner.memos.values().cloned().collect();
        memos.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(memos)
    }
}
