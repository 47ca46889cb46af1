//! tanmi: task-graph orchestration engine for AI coding agents.
//!
//! A workspace holds one persistent tree of planning and execution nodes.
//! The engine validates lifecycle transitions, keeps ancestors truthful via
//! the monitoring cascade, hands execution nodes to external worker agents
//! under git-branch isolation with hard rollback, and composes the bounded
//! context slice an agent needs when resuming any node.
//!
//! Wire surfaces (CLI/MCP/HTTP) and durable storage formats are external
//! collaborators; they embed [`engine::Engine`] over an implementation of
//! [`store::Store`].

pub mod context;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod git;
pub mod graph;
pub mod models;
pub mod state;
pub mod store;

pub use engine::Engine;
pub use error::{EngineError, Result};
