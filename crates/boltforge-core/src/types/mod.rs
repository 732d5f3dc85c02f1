//! Core type definitions
//!
//! - Action: one parsed instruction (write a file / run a command)
//! - Artifact: a titled group of actions
//! - Step: progress record for one action's execution attempt

mod action;
mod step;

pub use action::{Action, ActionKind, Artifact};
pub use step::{Step, StepId, StepStatus};
