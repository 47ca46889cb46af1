//! Workspace: the top-level container for one task tree, bound to a project
//! directory.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceStatus {
    Active,
    Archived,
    Error,
}

/// Advisory limits handed to the dispatching caller. Nothing in the engine
/// enforces the timeout; it travels with the hand-off payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchLimits {
    pub timeout_ms: u64,
    pub max_retries: u32,
}

impl Default for DispatchLimits {
    fn default() -> Self {
        DispatchLimits {
            timeout_ms: 600_000,
            max_retries: 3,
        }
    }
}

/// Present only while dispatch is enabled; removed entirely on disable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub enabled: bool,
    pub use_git: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_branch: Option<String>,
    #[serde(default)]
    pub backup_branches: Vec<String>,
    pub enabled_at: DateTime<Utc>,
    pub limits: DispatchLimits,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub status: WorkspaceStatus,
    pub root_node_id: String,
    /// Project directory this workspace operates on; git-mode dispatch
    /// exclusivity is scoped to this path.
    pub project_root: PathBuf,
    /// Workspace-level rules surfaced in every composed context header.
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<DispatchConfig>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workspace {
    /// True when this workspace holds an active git-mode dispatch config.
    pub fn git_dispatch_active(&self) -> bool {
        self.status == WorkspaceStatus::Active
            && self
                .dispatch
                .as_ref()
                .map(|d| d.enabled && d.use_git)
                .unwrap_or(false)
    }
}
