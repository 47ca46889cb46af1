//! Integration tests for the task-graph orchestration engine.
//!
//! These verify end-to-end behavior across the engine facade: lifecycle
//! cascades, context composition, and git-isolated dispatch with rollback.

pub mod context;
pub mod dispatch_git;
pub mod helpers;
pub mod lifecycle;
