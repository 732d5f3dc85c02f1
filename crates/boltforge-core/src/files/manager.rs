//! In-memory workspace with a simulated shell

use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;

use super::{CommandOutput, FileError, FileSnapshot, Workspace};

/// Virtual path -> content mapping plus a command log.
#[derive(Debug, Clone, Default)]
pub struct FileManager {
    files: IndexMap<String, String>,
    commands: Vec<String>,
    simulated_latency: Duration,
}

impl FileManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `latency` on every capability call instead of just yielding.
    pub fn with_simulated_latency(mut self, latency: Duration) -> Self {
        self.simulated_latency = latency;
        self
    }

    /// Upsert a file. Rewriting an existing path keeps its original position.
    pub async fn create_file(&mut self, path: &str, content: &str) -> Result<(), FileError> {
        validate_path(path)?;
        self.simulate_latency().await;
        let replaced = self
            .files
            .insert(path.to_string(), content.to_string())
            .is_some();
        tracing::debug!(path = %path, bytes = content.len(), replaced, "file written");
        Ok(())
    }

    /// Record `command` and return a synthetic result that echoes it verbatim.
    /// Nothing is executed. Only the empty string is rejected; the history
    /// keeps the trimmed form.
    pub async fn execute_shell_command(&mut self, command: &str) -> Result<CommandOutput, FileError> {
        if command.is_empty() {
            return Err(FileError::EmptyCommand);
        }
        self.simulate_latency().await;
        self.commands.push(command.trim().to_string());
        tracing::debug!(command = %command.trim(), "shell command simulated");
        Ok(CommandOutput {
            command: command.to_string(),
            output: format!("$ {}\n[simulated] command recorded, no process spawned", command),
            exit_code: 0,
        })
    }

    pub fn get_files(&self) -> FileSnapshot {
        FileSnapshot::from(self.files.clone())
    }

    /// Commands simulated so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.commands.clone()
    }

    async fn simulate_latency(&self) {
        if self.simulated_latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.simulated_latency).await;
        }
    }
}

fn validate_path(path: &str) -> Result<(), FileError> {
    let reason = if path.trim().is_empty() {
        "path is empty"
    } else if path.starts_with('/') || path.starts_with('\\') {
        "absolute paths are not allowed"
    } else if path.contains('\0') {
        "path contains a NUL byte"
    } else {
        return Ok(());
    };
    Err(FileError::InvalidPath {
        path: path.to_string(),
        reason,
    })
}

#[async_trait]
impl Workspace for FileManager {
    async fn create_file(&mut self, path: &str, content: &str) -> Result<(), FileError> {
        FileManager::create_file(self, path, content).await
    }

    async fn execute_shell_command(&mut self, command: &str) -> Result<CommandOutput, FileError> {
        FileManager::execute_shell_command(self, command).await
    }

    fn files(&self) -> FileSnapshot {
        self.get_files()
    }
}
