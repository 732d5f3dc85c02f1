//! # Boltforge Core
//!
//! Turns model output into an applied workspace.
//!
//! This crate contains:
//! - Action / Artifact / Step definitions
//! - A state-machine parser for `<action>` and `<boltArtifact>` markup,
//!   usable on complete text or incrementally on a stream
//! - A progress tracker with a forward-only step state machine
//! - An in-memory workspace with a simulated shell
//! - A sequential action executor and the engine facade that ties them together
//!
//! This crate does NOT care about:
//! - Where the text came from
//! - How progress is displayed
//! - Running real processes

pub mod engine;
pub mod executor;
pub mod files;
pub mod parser;
pub mod progress;
pub mod types;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::engine::{Engine, EngineOptions, EngineReport, ParseMode};
    pub use crate::executor::{step_title, ActionExecutor, ExecutorError, FailurePolicy};
    pub use crate::files::{
        CommandOutput, FileEntry, FileError, FileManager, FileSnapshot, Workspace,
    };
    pub use crate::parser::{
        parse_actions, parse_artifacts, ParseEvent, PendingTag, StreamingParser,
    };
    pub use crate::progress::{
        ChannelProgressReporter, CollectingProgressReporter, ProgressError, ProgressEvent,
        ProgressPhase, ProgressReporter, ProgressSummary, ProgressTracker,
    };
    pub use crate::types::{Action, ActionKind, Artifact, Step, StepId, StepStatus};
}

// Re-export key types at crate root
pub use engine::{Engine, EngineOptions, EngineReport, ParseMode};
pub use executor::{ActionExecutor, FailurePolicy};
pub use files::{FileManager, Workspace};
pub use parser::{parse_actions, parse_artifacts, StreamingParser};
pub use progress::{ProgressReporter, ProgressTracker};
pub use types::{Action, Artifact, Step, StepId, StepStatus};
