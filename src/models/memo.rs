//! Memos: standalone long-form notes addressable from any node via
//! `memo://<id>` references. A memo has no tree position of its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Memo {
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        tags: Vec<String>,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Memo {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            summary: summary.into(),
            tags,
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
