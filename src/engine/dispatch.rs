//! Engine wrappers around the dispatch orchestrator: locking, prompt
//! rendering, persistence and logging on top of [`crate::dispatch`].

use tracing::info;

use crate::dispatch::{
    self, ActionRequired, CompleteReport, DisableQuery, DisableReport, EnableReport, HandOff,
    TestReport,
};
use crate::error::{EngineError, Result};
use crate::models::{DispatchLimits, LogKind};
use crate::store::NodeKey;

use super::{relock, Engine};

impl Engine {
    /// Enable dispatch for a workspace; `use_git` selects branch isolation.
    pub fn enable_dispatch(
        &self,
        workspace_id: &str,
        use_git: bool,
        limits: Option<DispatchLimits>,
    ) -> Result<EnableReport> {
        let guard = self.guard(workspace_id);
        let _held = relock(&guard);

        let mut graph = self.load(workspace_id)?;
        let others = self.workspaces()?;
        let report = dispatch::enable(
            &mut graph,
            &others,
            use_git,
            limits.unwrap_or_default(),
        )?;
        self.persist(&graph)?;

        let root = graph.root_id().to_string();
        let mode = if use_git { "git" } else { "no-git" };
        self.log(
            workspace_id,
            &root,
            LogKind::Dispatch,
            format!("dispatch enabled ({mode} mode)"),
        )?;
        Ok(report)
    }

    /// Capture the rollback marker and build the hand-off payload. The
    /// caller runs the worker agent; the engine only describes the work.
    pub fn prepare_dispatch(&self, workspace_id: &str, node_id: &str) -> Result<ActionRequired> {
        let guard = self.guard(workspace_id);
        let _held = relock(&guard);

        let mut graph = self.load(workspace_id)?;
        let prepared = dispatch::prepare(&mut graph, node_id)?;
        self.persist(&graph)?;

        let key = NodeKey::new(workspace_id, node_id);
        let detail = self
            .store()
            .read_detail(&key)
            .map_err(EngineError::store)?
            .unwrap_or_default();
        let problem = self.store().read_problem(&key).map_err(EngineError::store)?;
        let prompt = dispatch::render_prompt(
            graph.node(node_id)?,
            &detail,
            problem.as_deref(),
        );

        self.log(
            workspace_id,
            node_id,
            LogKind::Dispatch,
            format!("dispatch prepared at marker {}", prepared.start_marker),
        )?;
        info!(workspace = %workspace_id, node = %node_id, "dispatch hand-off ready");

        Ok(ActionRequired {
            action: "execute_node",
            message: format!(
                "Hand node '{}' to an executor agent; report back with complete_dispatch.",
                detail.title
            ),
            data: HandOff {
                node_id: node_id.to_string(),
                prompt,
                timeout_ms: prepared.timeout_ms,
            },
        })
    }

    /// Record the worker's verdict and resolve the node.
    pub fn complete_dispatch(
        &self,
        workspace_id: &str,
        node_id: &str,
        success: bool,
        conclusion: Option<&str>,
    ) -> Result<CompleteReport> {
        let guard = self.guard(workspace_id);
        let _held = relock(&guard);

        let mut graph = self.load(workspace_id)?;
        let report = dispatch::complete(&mut graph, node_id, success, conclusion)?;
        self.persist(&graph)?;

        let verdict = if success { "passed" } else { "failed" };
        self.log(
            workspace_id,
            node_id,
            LogKind::Dispatch,
            format!("dispatch {verdict}"),
        )?;
        if success {
            // The node is resolved; its "current problem" note is stale.
            self.store()
                .write_problem(&NodeKey::new(workspace_id, node_id), None)
                .map_err(EngineError::store)?;
        }
        Ok(report)
    }

    /// Apply a paired verification verdict; failure hard-resets the working
    /// tree to the node's start marker.
    pub fn handle_test_result(
        &self,
        workspace_id: &str,
        node_id: &str,
        passed: bool,
        conclusion: Option<&str>,
    ) -> Result<TestReport> {
        let guard = self.guard(workspace_id);
        let _held = relock(&guard);

        let mut graph = self.load(workspace_id)?;
        let report = dispatch::handle_test_result(&mut graph, node_id, passed)?;
        self.persist(&graph)?;

        let mut message = match (&report.reset_to, passed) {
            (_, true) => "verification passed".to_string(),
            (Some(marker), false) => format!("verification failed; reset to {marker}"),
            (None, false) => "verification failed; nothing to reset".to_string(),
        };
        if let Some(conclusion) = conclusion.filter(|c| !c.trim().is_empty()) {
            message.push_str(&format!(" ({conclusion})"));
        }
        let kind = if passed { LogKind::Dispatch } else { LogKind::Reset };
        self.log(workspace_id, node_id, kind, message)?;
        Ok(report)
    }

    pub fn query_disable_dispatch(&self, workspace_id: &str) -> Result<DisableQuery> {
        let graph = self.load(workspace_id)?;
        Ok(dispatch::query_disable(&graph))
    }

    /// Tear dispatch down, optionally merging the process branch back.
    pub fn disable_dispatch(&self, workspace_id: &str, merge: bool) -> Result<DisableReport> {
        let guard = self.guard(workspace_id);
        let _held = relock(&guard);

        let mut graph = self.load(workspace_id)?;
        let report = dispatch::disable(&mut graph, merge)?;
        self.persist(&graph)?;

        let root = graph.root_id().to_string();
        let how = if report.merged { "merged" } else { "left unmerged" };
        self.log(
            workspace_id,
            &root,
            LogKind::Dispatch,
            format!("dispatch disabled; process branch {how}"),
        )?;
        Ok(report)
    }
}
