//! Parser module
//!
//! Extracts typed actions from free-form model output:
//! - `parse_actions`: every `<action>` in document order
//! - `parse_artifacts`: closed `<boltArtifact>` groups with their actions
//! - `StreamingParser`: incremental form for text that arrives in chunks
//!
//! Parsing never fails. Text that does not match the grammar is treated as
//! prose and skipped. The stateless functions expect complete text: markup
//! still open at the end of the input is dropped.

mod markup;
mod streaming;

pub use streaming::{ParseEvent, PendingTag, StreamingParser};

use crate::types::{Action, Artifact};

/// Parse every action in `text`, inside or outside artifacts, in document order.
pub fn parse_actions(text: &str) -> Vec<Action> {
    StreamingParser::new()
        .push(text)
        .into_iter()
        .filter_map(|event| match event {
            ParseEvent::ActionClosed { action, .. } => Some(action),
            _ => None,
        })
        .collect()
}

/// Parse every closed artifact in `text`, in the order their open markers appear.
pub fn parse_artifacts(text: &str) -> Vec<Artifact> {
    StreamingParser::new()
        .push(text)
        .into_iter()
        .filter_map(|event| match event {
            ParseEvent::ArtifactClosed { artifact } => Some(artifact),
            _ => None,
        })
        .collect()
}
