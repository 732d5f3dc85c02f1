//! Virtual workspace
//!
//! [`Workspace`] is the capability surface the executor drives: write a file,
//! run a command, read back the file mapping. [`FileManager`] implements it
//! in memory with a simulated shell; a real sandbox plugs in by implementing
//! the same trait.

mod manager;

pub use manager::FileManager;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Capability errors raised by a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileError {
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("command is empty")]
    EmptyCommand,

    #[error("command failed with exit code {exit_code}: {output}")]
    CommandFailed { exit_code: i32, output: String },

    #[error("workspace error: {0}")]
    Internal(String),
}

/// Result of a (possibly simulated) command execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub command: String,
    pub output: String,
    pub exit_code: i32,
}

/// One path/content pair, the transport form of the file mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub content: String,
}

/// Immutable copy of the file mapping in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FileSnapshot(IndexMap<String, String>);

impl FileSnapshot {
    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Convert into an explicit list for transport.
    pub fn into_entries(self) -> Vec<FileEntry> {
        self.0
            .into_iter()
            .map(|(path, content)| FileEntry { path, content })
            .collect()
    }
}

impl From<IndexMap<String, String>> for FileSnapshot {
    fn from(value: IndexMap<String, String>) -> Self {
        Self(value)
    }
}

/// Capability surface driven by the action executor.
///
/// Every call is a suspension point, even for in-memory implementations.
#[async_trait]
pub trait Workspace: Send {
    /// Upsert `content` at `path`; the last write for a path wins.
    async fn create_file(&mut self, path: &str, content: &str) -> Result<(), FileError>;

    /// Run a command line and return its output.
    async fn execute_shell_command(&mut self, command: &str) -> Result<CommandOutput, FileError>;

    /// Snapshot of the current file mapping.
    fn files(&self) -> FileSnapshot;
}
