//! Action and artifact definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single instruction extracted from model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Write `content` to `file_path` in the workspace.
    File {
        #[serde(rename = "filePath")]
        file_path: String,
        content: String,
    },
    /// Run `content` as a command line.
    Shell { content: String },
}

impl Action {
    /// Create a file action
    pub fn file(file_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self::File {
            file_path: file_path.into(),
            content: content.into(),
        }
    }

    /// Create a shell action
    pub fn shell(command: impl Into<String>) -> Self {
        Self::Shell {
            content: command.into(),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::File { .. } => ActionKind::File,
            Self::Shell { .. } => ActionKind::Shell,
        }
    }

    /// File body or command line.
    pub fn content(&self) -> &str {
        match self {
            Self::File { content, .. } | Self::Shell { content } => content,
        }
    }

    /// Target path for file actions.
    pub fn file_path(&self) -> Option<&str> {
        match self {
            Self::File { file_path, .. } => Some(file_path),
            Self::Shell { .. } => None,
        }
    }
}

/// Discriminant of [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    File,
    Shell,
}

impl ActionKind {
    /// Parse the value of a `type` attribute.
    pub fn from_type_attr(raw: &str) -> Option<Self> {
        match raw {
            "file" => Some(Self::File),
            "shell" => Some(Self::Shell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Shell => "shell",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named group of actions delimited by an artifact marker pair.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Artifact {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            actions: Vec::new(),
        }
    }

    /// Add actions
    pub fn with_actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = actions;
        self
    }
}
