//! Hand-off prompt rendering for dispatched execution nodes.
//!
//! The engine never runs the worker agent itself; it renders a self-contained
//! instruction document and returns it to the caller inside the
//! [`super::ActionRequired`] payload.

use crate::models::{NodeDetail, NodeMeta};

pub fn render_prompt(node: &NodeMeta, detail: &NodeDetail, problem: Option<&str>) -> String {
    let mut content = String::new();

    content.push_str(&format!("# Task: {}\n\n", detail.title));
    content.push_str(&format!("Node: {} ({})\n\n", node.id, node.node_type));

    content.push_str("## Requirement\n\n");
    if detail.requirement.is_empty() {
        content.push_str("(no requirement recorded)\n\n");
    } else {
        content.push_str(&detail.requirement);
        content.push_str("\n\n");
    }

    let docs: Vec<_> = detail.active_docs().collect();
    if !docs.is_empty() {
        content.push_str("## Reference Material\n\n");
        for doc in docs {
            match &doc.path {
                Some(path) => content.push_str(&format!("- **{}**: {}\n", doc.title, path)),
                None => content.push_str(&format!("- **{}**\n", doc.title)),
            }
            if let Some(body) = &doc.content {
                content.push_str(&format!("  {}\n", body.trim()));
            }
        }
        content.push('\n');
    }

    if !detail.notes.is_empty() {
        content.push_str("## Notes\n\n");
        for note in &detail.notes {
            content.push_str(&format!("- {note}\n"));
        }
        content.push('\n');
    }

    if let Some(problem) = problem.filter(|p| !p.trim().is_empty()) {
        content.push_str("## Current Problem\n\n");
        content.push_str(problem.trim());
        content.push_str("\n\n");
    }

    content.push_str("## Reporting\n\n");
    content.push_str("Report success or failure with a one-paragraph conclusion describing what was done and why.\n");

    content
}
