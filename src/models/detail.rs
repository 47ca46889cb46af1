//! Per-node prose detail and the append-only activity log.
//!
//! Detail is stored by the persistence collaborator under an opaque node key
//! and treated by the graph as an attachment; missing fields degrade to
//! defaults instead of failing a read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocStatus {
    Active,
    Expired,
}

/// A reference document attached to a node. Expiring a doc removes it from
/// composed context without deleting the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocEntry {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub status: DocStatus,
    pub added_at: DateTime<Utc>,
}

impl DocEntry {
    pub fn new(title: impl Into<String>, path: Option<String>, content: Option<String>) -> Self {
        DocEntry {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            path,
            content,
            status: DocStatus::Active,
            added_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == DocStatus::Active
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeDetail {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub requirement: String,
    #[serde(default)]
    pub docs: Vec<DocEntry>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl NodeDetail {
    pub fn new(title: impl Into<String>, requirement: impl Into<String>) -> Self {
        NodeDetail {
            title: title.into(),
            requirement: requirement.into(),
            docs: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn active_docs(&self) -> impl Iterator<Item = &DocEntry> {
        self.docs.iter().filter(|d| d.is_active())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Transition,
    Dispatch,
    Note,
    Reset,
}

/// One structured line in a node's append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub kind: LogKind,
    pub message: String,
}

impl LogEntry {
    pub fn now(kind: LogKind, message: impl Into<String>) -> Self {
        LogEntry {
            at: Utc::now(),
            kind,
            message: message.into(),
        }
    }
}
